use super::{compute_range, ArrayAccess, DataArray, ScalarType};
use crate::{Error, Result};

use std::sync::Arc;

/// Where the values of an [`ImplicitArray`] come from.
#[derive(Debug, Clone)]
pub enum ImplicitBackend {
    /// every value equals `value`
    Constant { value: f64 },
    /// value `i` is `slope * i + intercept` (flat index)
    Affine { slope: f64, intercept: f64 },
    /// tuple `t` is tuple `indices[t]` of `source`
    Indexed {
        indices: Arc<Vec<usize>>,
        source: Arc<DataArray>,
    },
    /// the tuples of every array, one after the other
    Composite { arrays: Vec<Arc<DataArray>> },
}

/// A read-only array whose values are computed on access.
#[derive(Debug, Clone)]
pub struct ImplicitArray {
    name: String,
    components: usize,
    tuples: usize,
    backend: ImplicitBackend,
    // first tuple of each composite part
    offsets: Vec<usize>,
}

impl ImplicitArray {
    pub fn constant(name: impl Into<String>, value: f64, components: usize, tuples: usize) -> Self {
        Self {
            name: name.into(),
            components: components.max(1),
            tuples,
            backend: ImplicitBackend::Constant { value },
            offsets: Vec::new(),
        }
    }

    pub fn affine(name: impl Into<String>, slope: f64, intercept: f64, components: usize, tuples: usize) -> Self {
        Self {
            name: name.into(),
            components: components.max(1),
            tuples,
            backend: ImplicitBackend::Affine { slope, intercept },
            offsets: Vec::new(),
        }
    }

    pub fn indexed(name: impl Into<String>, indices: Arc<Vec<usize>>, source: Arc<DataArray>) -> Result<Self> {
        if let Some(bad) = indices.iter().find(|i| **i >= source.number_of_tuples()) {
            return Err(Error::out_of_bounds(format!(
                "index {bad} outside of a source array with {} tuples",
                source.number_of_tuples()
            )));
        }
        Ok(Self {
            name: name.into(),
            components: source.number_of_components(),
            tuples: indices.len(),
            backend: ImplicitBackend::Indexed { indices, source },
            offsets: Vec::new(),
        })
    }

    pub fn composite(name: impl Into<String>, arrays: Vec<Arc<DataArray>>) -> Result<Self> {
        let components = arrays.first().map(|a| a.number_of_components()).unwrap_or(1);
        if arrays.iter().any(|a| a.number_of_components() != components) {
            return Err(Error::invalid_argument(
                "composite arrays must share the component count",
            ));
        }
        let mut offsets = Vec::with_capacity(arrays.len());
        let mut tuples = 0;
        for array in &arrays {
            offsets.push(tuples);
            tuples += array.number_of_tuples();
        }
        Ok(Self {
            name: name.into(),
            components,
            tuples,
            backend: ImplicitBackend::Composite { arrays },
            offsets,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &ImplicitBackend {
        &self.backend
    }

    /// Copy every value into a stored array.
    pub fn materialize(&self) -> DataArray {
        let scalar_type = match &self.backend {
            ImplicitBackend::Indexed { source, .. } => source.scalar_type(),
            ImplicitBackend::Composite { arrays } => arrays
                .first()
                .map(|a| a.scalar_type())
                .unwrap_or(ScalarType::Double),
            _ => ScalarType::Double,
        };
        let mut out = DataArray::with_name(scalar_type, self.components, self.name.clone());
        out.reserve(self.tuples);
        for t in 0..self.tuples {
            out.push_tuple(&self.tuple_f64(t));
        }
        out
    }
}

impl ArrayAccess for ImplicitArray {
    fn number_of_tuples(&self) -> usize {
        self.tuples
    }

    fn number_of_components(&self) -> usize {
        self.components
    }

    fn component(&self, tuple: usize, component: usize) -> f64 {
        match &self.backend {
            ImplicitBackend::Constant { value } => *value,
            ImplicitBackend::Affine { slope, intercept } => {
                slope * (tuple * self.components + component) as f64 + intercept
            }
            ImplicitBackend::Indexed { indices, source } => source.component(indices[tuple], component),
            ImplicitBackend::Composite { arrays } => {
                // last part starting at or before `tuple`
                let part = self.offsets.partition_point(|o| *o <= tuple) - 1;
                arrays[part].component(tuple - self.offsets[part], component)
            }
        }
    }

    fn range(&self, component: i32) -> Option<[f64; 2]> {
        if self.tuples == 0 {
            return None;
        }
        match &self.backend {
            ImplicitBackend::Constant { value } if component >= 0 => {
                if (component as usize) < self.components && !value.is_nan() {
                    Some([*value, *value])
                } else {
                    None
                }
            }
            ImplicitBackend::Affine { .. } if component >= 0 => {
                let c = component as usize;
                if c >= self.components {
                    return None;
                }
                // monotone in the tuple index, the extremes are at the ends
                let first = self.component(0, c);
                let last = self.component(self.tuples - 1, c);
                Some([first.min(last), first.max(last)])
            }
            ImplicitBackend::Composite { arrays } => {
                let mut out: Option<[f64; 2]> = None;
                for array in arrays {
                    if let Some([lo, hi]) = array.range(component) {
                        out = Some(match out {
                            Some([a, b]) => [a.min(lo), b.max(hi)],
                            None => [lo, hi],
                        });
                    }
                }
                out
            }
            _ => compute_range(self, component),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_and_affine() {
        let constant = ImplicitArray::constant("c", 2.5, 2, 1_000_000);
        assert_eq!(constant.value(1_999_999), 2.5);
        assert_eq!(constant.range(1), Some([2.5, 2.5]));

        let affine = ImplicitArray::affine("a", -2.0, 10.0, 1, 6);
        assert_eq!(affine.value(3), 4.0);
        assert_eq!(affine.range(0), Some([0.0, 10.0]));
        assert_eq!(affine.materialize().values_as_f64(), vec![10.0, 8.0, 6.0, 4.0, 2.0, 0.0]);
    }

    #[test]
    fn indexed_and_composite() {
        let source = Arc::new(DataArray::scalars("s", vec![10i32, 20, 30]));
        let indexed = ImplicitArray::indexed("i", Arc::new(vec![2, 2, 0]), Arc::clone(&source)).unwrap();
        assert_eq!(indexed.tuple_f64(0), vec![30.0]);
        assert_eq!(indexed.range(0), Some([10.0, 30.0]));
        assert_eq!(indexed.materialize().scalar_type(), ScalarType::Int);
        assert!(ImplicitArray::indexed("bad", Arc::new(vec![3]), Arc::clone(&source)).is_err());

        let other = Arc::new(DataArray::scalars("t", vec![-1i32, 5]));
        let composite = ImplicitArray::composite("c", vec![source, other]).unwrap();
        assert_eq!(composite.number_of_tuples(), 5);
        assert_eq!(composite.value(3), -1.0);
        assert_eq!(composite.value(2), 30.0);
        assert_eq!(composite.range(0), Some([-1.0, 30.0]));
    }
}
