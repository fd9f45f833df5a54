//! Scalar to color mapping.

use super::property::to_byte;
use crate::array::DataArray;
use crate::object::{Object, Observable};
use crate::utils::impl_observable;
use crate::{Error, Result};

/// How an array with several components is reduced to one scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorMode {
    #[default]
    Magnitude,
    Component(usize),
}

/// Maps scalars onto a table of RGBA colors.
///
/// The table is either generated from HSV ramps (rebuilt when a ramp changes) or
/// given explicitly with [`set_table_value`](LookupTable::set_table_value).
#[derive(Debug, Clone)]
pub struct LookupTable {
    object: Object,
    table_range: [f64; 2],
    hue_range: [f64; 2],
    saturation_range: [f64; 2],
    value_range: [f64; 2],
    alpha_range: [f64; 2],
    number_of_colors: usize,
    nan_color: [f64; 4],
    table: Vec<[f64; 4]>,
    build_time: u64,
    explicit: bool,
}

impl_observable!(LookupTable);

impl Default for LookupTable {
    fn default() -> Self {
        Self {
            object: Object::new(),
            table_range: [0.0, 1.0],
            hue_range: [0.0, 0.66667],
            saturation_range: [1.0, 1.0],
            value_range: [1.0, 1.0],
            alpha_range: [1.0, 1.0],
            number_of_colors: 256,
            nan_color: [0.5, 0.0, 0.0, 1.0],
            table: Vec::new(),
            build_time: 0,
            explicit: false,
        }
    }
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> [f64; 3] {
    let h = (h.rem_euclid(1.0)) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let (p, q, t) = (v * (1.0 - s), v * (1.0 - s * f), v * (1.0 - s * (1.0 - f)));
    match sector as i32 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

fn ramp(range: [f64; 2], t: f64) -> f64 {
    range[0] + (range[1] - range[0]) * t
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_range(&self) -> [f64; 2] {
        self.table_range
    }

    /// Fails, and fires `ErrorEvent`, when `min > max`.
    pub fn set_table_range(&mut self, min: f64, max: f64) -> Result<()> {
        if min > max || min.is_nan() || max.is_nan() {
            let message = format!("bad table range: [{min}, {max}]");
            self.object.error(&message);
            return Err(Error::invalid_argument(message));
        }
        if self.table_range != [min, max] {
            self.table_range = [min, max];
            self.modified();
        }
        Ok(())
    }

    pub fn set_hue_range(&mut self, min: f64, max: f64) {
        self.hue_range = [min, max];
        self.explicit = false;
        self.modified();
    }

    pub fn set_saturation_range(&mut self, min: f64, max: f64) {
        self.saturation_range = [min, max];
        self.explicit = false;
        self.modified();
    }

    pub fn set_value_range(&mut self, min: f64, max: f64) {
        self.value_range = [min, max];
        self.explicit = false;
        self.modified();
    }

    pub fn set_alpha_range(&mut self, min: f64, max: f64) {
        self.alpha_range = [min, max];
        self.explicit = false;
        self.modified();
    }

    pub fn number_of_colors(&self) -> usize {
        self.number_of_colors
    }

    pub fn set_number_of_colors(&mut self, n: usize) -> Result<()> {
        if n == 0 {
            return Err(Error::invalid_argument("a lookup table needs at least one color"));
        }
        self.number_of_colors = n;
        self.table.resize(n, [0.0, 0.0, 0.0, 1.0]);
        self.modified();
        Ok(())
    }

    pub fn set_nan_color(&mut self, rgba: [f64; 4]) {
        self.nan_color = rgba;
        self.modified();
    }

    /// Set one table entry; the table stops being generated from the ramps.
    pub fn set_table_value(&mut self, index: usize, rgba: [f64; 4]) -> Result<()> {
        self.build();
        let n = self.table.len();
        let slot = self
            .table
            .get_mut(index)
            .ok_or_else(|| Error::out_of_bounds(format!("table value {index} of {n}")))?;
        *slot = rgba;
        self.explicit = true;
        self.modified();
        self.build_time = self.mtime();
        Ok(())
    }

    pub fn table_value(&mut self, index: usize) -> Option<[f64; 4]> {
        self.build();
        self.table.get(index).copied()
    }

    /// Regenerate the table from the ramps if it is older than the last change.
    pub fn build(&mut self) {
        if self.explicit || (self.build_time >= self.mtime() && self.table.len() == self.number_of_colors) {
            return;
        }
        let n = self.number_of_colors;
        self.table = (0..n)
            .map(|i| {
                let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
                let [r, g, b] = hsv_to_rgb(
                    ramp(self.hue_range, t),
                    ramp(self.saturation_range, t),
                    ramp(self.value_range, t),
                );
                [r, g, b, ramp(self.alpha_range, t)]
            })
            .collect();
        self.build_time = self.mtime();
    }

    /// index of the table entry used for `value`
    pub fn index(&self, value: f64) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        let [min, max] = self.table_range;
        let n = self.number_of_colors;
        let t = if max > min { ((value - min) / (max - min)).clamp(0.0, 1.0) } else { 0.0 };
        Some(((t * n as f64) as usize).min(n - 1))
    }

    pub fn map_value(&mut self, value: f64) -> [u8; 4] {
        self.build();
        let rgba = match self.index(value) {
            Some(i) => self.table[i],
            None => self.nan_color,
        };
        rgba.map(to_byte)
    }

    /// RGBA bytes for every tuple of `array`.
    pub fn map_scalars(&mut self, array: &DataArray, mode: VectorMode) -> Vec<[u8; 4]> {
        let components = array.number_of_components();
        (0..array.number_of_tuples())
            .map(|t| {
                let value = match mode {
                    VectorMode::Component(c) => array.component(t, c.min(components - 1)),
                    VectorMode::Magnitude if components == 1 => array.component(t, 0),
                    VectorMode::Magnitude => array.tuple(t).iter().map(|v| v * v).sum::<f64>().sqrt(),
                };
                self.map_value(value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::EventId;
    use std::sync::{Arc, Mutex};

    #[test]
    fn bad_range_fires_error_event() {
        let mut lut = LookupTable::new();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);
        lut.add_observer(EventId::ErrorEvent, 0.0, move |event| {
            sink.lock().unwrap().push(event.message().unwrap_or_default().to_string());
        });
        assert!(lut.set_table_range(1.0, 0.0).is_err());
        assert_eq!(lut.table_range(), [0.0, 1.0]);
        let messages = messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("bad table range"));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn bad_range_is_logged_once() {
        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let mut lut = LookupTable::new();
        tracing::subscriber::with_default(subscriber, || {
            assert!(lut.set_table_range(2.0, -1.0).is_err());
        });
        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text.matches("bad table range").count(), 1, "{text}");
    }

    #[test]
    fn ramp_ends_and_rebuild() {
        let mut lut = LookupTable::new();
        lut.set_table_range(0.0, 10.0).unwrap();
        // hue 0 is red, hue 2/3 is blue
        assert_eq!(lut.map_value(0.0), [255, 0, 0, 255]);
        assert_eq!(lut.map_value(10.0), [0, 0, 255, 255]);
        assert_eq!(lut.map_value(-5.0), lut.map_value(0.0));
        assert_eq!(lut.map_value(f64::NAN), [128, 0, 0, 255]);

        lut.set_hue_range(0.0, 0.0);
        lut.set_value_range(0.0, 1.0);
        assert_eq!(lut.map_value(0.0), [0, 0, 0, 255]);
        assert_eq!(lut.map_value(10.0), [255, 0, 0, 255]);
    }

    #[test]
    fn explicit_table_and_vectors() {
        let mut lut = LookupTable::new();
        lut.set_number_of_colors(2).unwrap();
        lut.set_table_value(0, [0.0, 1.0, 0.0, 1.0]).unwrap();
        lut.set_table_value(1, [0.0, 0.0, 1.0, 0.5]).unwrap();
        assert!(lut.set_table_value(2, [0.0; 4]).is_err());
        let vectors = DataArray::from_tuples("v", vec![[0.0f64, 0.0, 0.0], [0.6, 0.8, 0.0]]);
        let colors = lut.map_scalars(&vectors, VectorMode::Magnitude);
        assert_eq!(colors, vec![[0, 255, 0, 255], [0, 0, 255, 128]]);
        let colors = lut.map_scalars(&vectors, VectorMode::Component(0));
        assert_eq!(colors[1], [0, 0, 255, 128]);
    }
}
