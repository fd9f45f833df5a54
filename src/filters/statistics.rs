//! Per-column histograms of a table.
//!
//! A histogram with `N` bins has `N + 3` slots:
//! `[below range, bin 0, .., bin N-1, above range, NaN]`. Bins are half open except
//! the last one, which also takes the range maximum.

use crate::array::{DataArray, ScalarType};
use crate::data::{DataKind, Table};
use crate::object::{Object, Observable};
use crate::pipeline::{Algorithm, ExecutionContext, Information};
use crate::utils::impl_observable;
use crate::{Error, Result};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnHistogram {
    pub name: String,
    pub range: [f64; 2],
    pub counts: Vec<u64>,
}

impl ColumnHistogram {
    pub fn new(name: impl Into<String>, range: [f64; 2], bins: usize) -> Self {
        Self {
            name: name.into(),
            range,
            counts: vec![0; bins + 3],
        }
    }

    pub fn number_of_bins(&self) -> usize {
        self.counts.len() - 3
    }

    pub fn slot(&self, value: f64) -> usize {
        let n = self.number_of_bins();
        let [min, max] = self.range;
        if value.is_nan() {
            n + 2
        } else if value < min {
            0
        } else if value > max {
            n + 1
        } else if max == min {
            1
        } else {
            1 + (((value - min) / (max - min) * n as f64) as usize).min(n - 1)
        }
    }

    pub fn add(&mut self, value: f64) {
        let slot = self.slot(value);
        self.counts[slot] += 1;
    }

    pub fn bins(&self) -> &[u64] {
        let n = self.number_of_bins();
        &self.counts[1..=n]
    }

    pub fn below_range(&self) -> u64 {
        self.counts[0]
    }

    pub fn above_range(&self) -> u64 {
        self.counts[self.counts.len() - 2]
    }

    pub fn nan_count(&self) -> u64 {
        self.counts[self.counts.len() - 1]
    }

    pub fn samples(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Histograms learned from one table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistogramModel {
    pub columns: Vec<ColumnHistogram>,
    pub sample_count: u64,
}

impl HistogramModel {
    pub fn column(&self, name: &str) -> Option<&ColumnHistogram> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Element-wise sum of models learned over the same columns, ranges and bins.
    pub fn aggregate(models: &[&HistogramModel]) -> Result<HistogramModel> {
        let Some((first, rest)) = models.split_first() else {
            return Ok(HistogramModel::default());
        };
        let mut total = (*first).clone();
        for model in rest {
            if model.columns.len() != total.columns.len() {
                return Err(Error::invalid_argument("models cover different columns"));
            }
            for (sum, column) in total.columns.iter_mut().zip(&model.columns) {
                if sum.name != column.name || sum.range != column.range || sum.counts.len() != column.counts.len() {
                    return Err(Error::invalid_argument(format!(
                        "column `{}` was learned with different parameters",
                        column.name
                    )));
                }
                for (a, b) in sum.counts.iter_mut().zip(&column.counts) {
                    *a += b;
                }
            }
            total.sample_count += model.sample_count;
        }
        Ok(total)
    }

    /// One `IdType` column of `N + 3` counts per learned column.
    pub fn to_table(&self) -> Result<Table> {
        let mut table = Table::new();
        for column in &self.columns {
            let counts: Vec<i64> = column.counts.iter().map(|&c| c as i64).collect();
            let mut array = DataArray::scalars(column.name.clone(), counts);
            array.set_scalar_type_tag(ScalarType::IdType)?;
            table.add_column(array)?;
        }
        Ok(table)
    }
}

/// Learns a [`HistogramModel`] from a table.
#[derive(Debug)]
pub struct VisualStatistics {
    object: Object,
    ranges: Vec<(String, [f64; 2])>,
    bins: usize,
    model: Option<HistogramModel>,
}

impl_observable!(VisualStatistics);

impl Default for VisualStatistics {
    fn default() -> Self {
        Self {
            object: Object::new(),
            ranges: Vec::new(),
            bins: 10,
            model: None,
        }
    }
}

impl VisualStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Histogram `name` over `[min, max]`. Columns without a range are not learned,
    /// unless no range is set at all, in which case every column uses its data range.
    pub fn set_column_range(&mut self, name: &str, min: f64, max: f64) -> Result<()> {
        if !(min <= max) {
            let message = format!("invalid range [{min}, {max}] for column `{name}`");
            self.object.error(&message);
            return Err(Error::invalid_argument(message));
        }
        match self.ranges.iter_mut().find(|(n, _)| n == name) {
            Some((_, range)) => *range = [min, max],
            None => self.ranges.push((name.to_string(), [min, max])),
        }
        self.modified();
        Ok(())
    }

    pub fn column_range(&self, name: &str) -> Option<[f64; 2]> {
        self.ranges.iter().find(|(n, _)| n == name).map(|(_, r)| *r)
    }

    pub fn set_number_of_bins(&mut self, bins: usize) -> Result<()> {
        if bins == 0 {
            return Err(Error::invalid_argument("a histogram needs at least one bin"));
        }
        self.bins = bins;
        self.modified();
        Ok(())
    }

    pub fn number_of_bins(&self) -> usize {
        self.bins
    }

    /// last learned model
    pub fn model(&self) -> Option<&HistogramModel> {
        self.model.as_ref()
    }

    pub fn learn(&mut self, table: &Table) -> Result<HistogramModel> {
        let ranges: Vec<(String, [f64; 2])> = if self.ranges.is_empty() {
            table
                .column_names()
                .into_iter()
                .filter_map(|name| {
                    let range = table.column(name)?.range(0)?;
                    Some((name.to_string(), range))
                })
                .collect()
        } else {
            self.ranges.clone()
        };

        let mut model = HistogramModel {
            columns: Vec::with_capacity(ranges.len()),
            sample_count: table.number_of_rows() as u64,
        };
        for (name, range) in ranges {
            let column = table.column(&name).ok_or_else(|| {
                Error::invalid_argument(format!("table has no column `{name}`"))
            })?;
            let mut histogram = ColumnHistogram::new(name, range, self.bins);
            for row in 0..column.number_of_tuples() {
                histogram.add(column.try_component(row, 0)?);
            }
            model.columns.push(histogram);
        }
        tracing::debug!(columns = model.columns.len(), rows = model.sample_count, "histograms learned");
        self.model = Some(model.clone());
        Ok(model)
    }
}

impl Algorithm for VisualStatistics {
    fn name(&self) -> &'static str {
        "VisualStatistics"
    }

    fn input_kind(&self, _port: usize) -> DataKind {
        DataKind::Table
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::Table);
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let table = ctx
            .input(0)?
            .as_table()
            .ok_or_else(|| Error::pipeline("expected a table"))?;
        let model = self.learn(table)?;
        ctx.set_output(0, model.to_table()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn table(values: Vec<f64>) -> Table {
        let mut table = Table::new();
        table.add_column(DataArray::scalars("c", values)).unwrap();
        table
    }

    #[test]
    fn slots_and_sentinels() {
        let mut stats = VisualStatistics::new();
        stats.set_column_range("c", 0.0, 10.0).unwrap();
        stats.set_number_of_bins(5).unwrap();
        let model = stats
            .learn(&table(vec![-1.0, 0.0, 1.9, 2.0, 10.0, 10.5, f64::NAN]))
            .unwrap();
        let c = model.column("c").unwrap();
        assert_eq!(c.counts, vec![1, 2, 1, 0, 0, 1, 1, 1]);
        assert_eq!(c.bins(), &[2, 1, 0, 0, 1]);
        assert_eq!((c.below_range(), c.above_range(), c.nan_count()), (1, 1, 1));
        assert_eq!(c.samples(), 7);
    }

    #[test]
    fn aggregation_matches_partition() {
        let mut rng = StdRng::seed_from_u64(3);
        let values: Vec<f64> = (0..500).map(|_| rng.gen_range(-2.0..12.0)).collect();
        let mut stats = VisualStatistics::new();
        stats.set_column_range("c", 0.0, 10.0).unwrap();
        stats.set_number_of_bins(5).unwrap();

        let whole = stats.learn(&table(values.clone())).unwrap();
        let a = stats.learn(&table(values[..137].to_vec())).unwrap();
        let b = stats.learn(&table(values[137..].to_vec())).unwrap();
        let sum = HistogramModel::aggregate(&[&a, &b]).unwrap();
        assert_eq!(sum, whole);
        assert_eq!(sum.sample_count, 500);
        assert_eq!(whole.column("c").unwrap().samples(), 500);
    }

    #[test]
    fn model_as_table() {
        let mut stats = VisualStatistics::new();
        stats.set_number_of_bins(4).unwrap();
        let model = stats.learn(&table(vec![0.0, 1.0, 2.0, 3.0, 4.0])).unwrap();
        assert_eq!(model.column("c").unwrap().range, [0.0, 4.0]);
        let out = model.to_table().unwrap();
        assert_eq!(out.number_of_rows(), 7);
        assert_eq!(out.column("c").unwrap().scalar_type(), ScalarType::IdType);
        assert_eq!(out.value(4, "c").unwrap(), 2.0);
    }

    #[test]
    fn bad_range_reports_error() {
        let mut stats = VisualStatistics::new();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        stats.object().observers().add(crate::object::EventId::ErrorEvent, 0.0, move |event| {
            sink.lock().unwrap().push(event.message().unwrap_or_default().to_string());
        });
        assert!(stats.set_column_range("c", 2.0, 1.0).is_err());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
