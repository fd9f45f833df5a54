use super::FieldData;
use crate::array::DataArray;
use crate::{Error, Result};

use std::sync::Arc;

/// Named columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: FieldData,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a column. Its row count must match the existing columns.
    pub fn add_column(&mut self, column: impl Into<Arc<DataArray>>) -> Result<usize> {
        let column = column.into();
        if column.name().is_none() {
            return Err(Error::invalid_argument("table columns need a name"));
        }
        let replacing = column
            .name()
            .map(|n| self.columns.index_of(n).is_some())
            .unwrap_or(false);
        let other_columns = self.columns.number_of_arrays() - usize::from(replacing);
        if other_columns > 0 && column.number_of_tuples() != self.number_of_rows() {
            return Err(Error::invalid_argument(format!(
                "column `{}` has {} rows, the table has {}",
                column.name().unwrap_or_default(),
                column.number_of_tuples(),
                self.number_of_rows()
            )));
        }
        Ok(self.columns.add_array(column))
    }

    pub fn number_of_rows(&self) -> usize {
        self.columns.number_of_tuples()
    }

    pub fn number_of_columns(&self) -> usize {
        self.columns.number_of_arrays()
    }

    pub fn column(&self, name: &str) -> Option<&DataArray> {
        self.columns.get(name)
    }

    pub fn column_by_index(&self, index: usize) -> Option<&DataArray> {
        self.columns.get_by_index(index)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.names()
    }

    pub fn columns(&self) -> &FieldData {
        &self.columns
    }

    /// first component of a cell
    pub fn value(&self, row: usize, column: &str) -> Result<f64> {
        let col = self
            .column(column)
            .ok_or_else(|| Error::invalid_argument(format!("no column named `{column}`")))?;
        col.try_component(row, 0)
    }

    /// A table holding the given rows.
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        let mut columns = FieldData::new();
        for column in self.columns.iter() {
            columns.add_array(column.extract_tuples(rows));
        }
        Table { columns }
    }
}
