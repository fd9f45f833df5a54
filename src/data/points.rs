use crate::array::{DataArray, ScalarType};
use crate::math::{self, Bounds, Vec3};
use crate::{Error, Result};

use std::sync::Arc;

/// Point coordinates: a shared three component array.
#[derive(Debug, Clone, PartialEq)]
pub struct Points {
    data: Arc<DataArray>,
}

impl Default for Points {
    fn default() -> Self {
        Self::new()
    }
}

impl Points {
    /// Empty double precision points.
    pub fn new() -> Self {
        Self::with_type(ScalarType::Double)
    }

    pub fn with_type(scalar_type: ScalarType) -> Self {
        Self {
            data: Arc::new(DataArray::with_name(scalar_type, 3, "Points")),
        }
    }

    pub fn from_array(data: impl Into<Arc<DataArray>>) -> Result<Self> {
        let data = data.into();
        if data.number_of_components() != 3 {
            return Err(Error::invalid_argument(format!(
                "points need 3 components, got {}",
                data.number_of_components()
            )));
        }
        Ok(Self { data })
    }

    pub fn from_vec(points: Vec<Vec3>) -> Self {
        Self {
            data: Arc::new(DataArray::from_tuples("Points", points)),
        }
    }

    pub fn len(&self) -> usize {
        self.data.number_of_tuples()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Vec3 {
        self.data.tuple3(i)
    }

    pub fn set(&mut self, i: usize, p: Vec3) -> Result<()> {
        Arc::make_mut(&mut self.data).set_tuple(i, &p)
    }

    pub fn push(&mut self, p: Vec3) -> usize {
        Arc::make_mut(&mut self.data).push_tuple(&p)
    }

    pub fn reserve(&mut self, n: usize) {
        Arc::make_mut(&mut self.data).reserve(n);
    }

    pub fn data(&self) -> &DataArray {
        &self.data
    }

    pub fn shared_data(&self) -> Arc<DataArray> {
        Arc::clone(&self.data)
    }

    pub fn iter(&self) -> impl Iterator<Item = Vec3> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    pub fn to_vec(&self) -> Vec<Vec3> {
        self.iter().collect()
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = math::empty_bounds();
        for p in self.iter() {
            math::grow_bounds(&mut bounds, p);
        }
        bounds
    }

    pub fn append(&mut self, other: &Points) {
        let data = Arc::make_mut(&mut self.data);
        data.reserve(data.number_of_tuples() + other.len());
        for p in other.iter() {
            data.push_tuple(&p);
        }
    }
}

impl FromIterator<Vec3> for Points {
    fn from_iter<I: IntoIterator<Item = Vec3>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}
