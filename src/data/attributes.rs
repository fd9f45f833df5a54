use crate::array::{DataArray, Scalar};
use crate::{Error, Result};

use std::fmt;
use std::sync::Arc;

/// An ordered collection of named arrays.
///
/// Arrays are held behind `Arc` so datasets and filter outputs can share them;
/// [`FieldData::array_mut`] copies on write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldData {
    arrays: Vec<Arc<DataArray>>,
}

impl FieldData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an array, replacing an existing array of the same name. Returns its index.
    pub fn add_array(&mut self, array: impl Into<Arc<DataArray>>) -> usize {
        let array = array.into();
        if let Some(name) = array.name() {
            if let Some(index) = self.index_of(name) {
                self.arrays[index] = array;
                return index;
            }
        }
        self.arrays.push(array);
        self.arrays.len() - 1
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.arrays.iter().position(|a| a.name() == Some(name))
    }

    pub fn get(&self, name: &str) -> Option<&DataArray> {
        self.index_of(name).map(|i| self.arrays[i].as_ref())
    }

    pub fn get_shared(&self, name: &str) -> Option<Arc<DataArray>> {
        self.index_of(name).map(|i| Arc::clone(&self.arrays[i]))
    }

    pub fn get_by_index(&self, index: usize) -> Option<&DataArray> {
        self.arrays.get(index).map(|a| a.as_ref())
    }

    /// Mutable access; the array is copied first if it is shared.
    pub fn array_mut(&mut self, name: &str) -> Option<&mut DataArray> {
        let index = self.index_of(name)?;
        Some(Arc::make_mut(&mut self.arrays[index]))
    }

    pub fn array_mut_by_index(&mut self, index: usize) -> Option<&mut DataArray> {
        self.arrays.get_mut(index).map(Arc::make_mut)
    }

    pub fn remove_array(&mut self, name: &str) -> Option<Arc<DataArray>> {
        let index = self.index_of(name)?;
        Some(self.arrays.remove(index))
    }

    pub fn number_of_arrays(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataArray> {
        self.arrays.iter().map(|a| a.as_ref())
    }

    pub fn shared_iter(&self) -> impl Iterator<Item = &Arc<DataArray>> {
        self.arrays.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.arrays.iter().filter_map(|a| a.name()).collect()
    }

    /// tuple count of the first array
    pub fn number_of_tuples(&self) -> usize {
        self.arrays.first().map(|a| a.number_of_tuples()).unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.arrays.clear();
    }

    /// Values of array `name` converted to `T`. The array must have `components`
    /// components.
    pub fn values<T: Scalar>(&self, name: &str, components: usize) -> Result<Vec<T>> {
        let array = self
            .get(name)
            .ok_or_else(|| Error::invalid_argument(format!("no array named `{name}`")))?;
        if array.number_of_components() != components {
            return Err(Error::invalid_argument(format!(
                "`{name}` has {} components, expected {components}",
                array.number_of_components()
            )));
        }
        Ok(match array.as_slice::<T>() {
            Some(values) => values.to_vec(),
            None => array.values_as_f64().into_iter().map(T::from_f64).collect(),
        })
    }
}

/// Conversion of a struct into one array per field, usually derived with
/// `#[derive(ToFieldData)]`.
pub trait ToFieldData {
    fn to_field_data(&self) -> Result<FieldData>;
}

/// Inverse of [`ToFieldData`], usually derived with `#[derive(FromFieldData)]`.
pub trait FromFieldData: Sized {
    fn from_field_data(fields: &FieldData) -> Result<Self>;
}

/// Special meaning an array can carry inside point or cell data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeRole {
    Scalars,
    Vectors,
    Normals,
    TCoords,
    Tensors,
    GlobalIds,
}

impl AttributeRole {
    pub const ALL: [AttributeRole; 6] = [
        Self::Scalars,
        Self::Vectors,
        Self::Normals,
        Self::TCoords,
        Self::Tensors,
        Self::GlobalIds,
    ];

    fn slot(&self) -> usize {
        match self {
            Self::Scalars => 0,
            Self::Vectors => 1,
            Self::Normals => 2,
            Self::TCoords => 3,
            Self::Tensors => 4,
            Self::GlobalIds => 5,
        }
    }

    /// Reject arrays whose component count cannot carry this role.
    pub fn validate(&self, array: &DataArray) -> Result<()> {
        let nc = array.number_of_components();
        let ok = match self {
            Self::Scalars => nc >= 1,
            Self::Vectors | Self::Normals => nc == 3,
            Self::TCoords => (1..=3).contains(&nc),
            Self::Tensors => nc == 9 || nc == 6,
            Self::GlobalIds => nc == 1,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::invalid_argument(format!(
                "an array with {nc} components cannot be used as {self}"
            )))
        }
    }
}

impl fmt::Display for AttributeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scalars => "Scalars",
            Self::Vectors => "Vectors",
            Self::Normals => "Normals",
            Self::TCoords => "TCoords",
            Self::Tensors => "Tensors",
            Self::GlobalIds => "GlobalIds",
        };
        f.write_str(s)
    }
}

/// Point or cell data: field data plus at most one designated array per role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSetAttributes {
    fields: FieldData,
    roles: [Option<String>; 6],
}

impl std::ops::Deref for DataSetAttributes {
    type Target = FieldData;

    fn deref(&self) -> &FieldData {
        &self.fields
    }
}

impl std::ops::DerefMut for DataSetAttributes {
    fn deref_mut(&mut self) -> &mut FieldData {
        &mut self.fields
    }
}

impl DataSetAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `array` and designate it for `role`.
    pub fn set_attribute(&mut self, role: AttributeRole, array: impl Into<Arc<DataArray>>) -> Result<usize> {
        let array = array.into();
        role.validate(&array)?;
        let name = array
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| role.to_string());
        let array = if array.name().is_none() {
            let mut named = (*array).clone();
            named.set_name(name.clone());
            Arc::new(named)
        } else {
            array
        };
        let index = self.fields.add_array(array);
        self.roles[role.slot()] = Some(name);
        Ok(index)
    }

    /// Designate an existing array for `role`.
    pub fn set_active(&mut self, role: AttributeRole, name: &str) -> Result<()> {
        let array = self
            .fields
            .get(name)
            .ok_or_else(|| Error::invalid_argument(format!("no array named `{name}`")))?;
        role.validate(array)?;
        self.roles[role.slot()] = Some(name.to_string());
        Ok(())
    }

    pub fn active_name(&self, role: AttributeRole) -> Option<&str> {
        self.roles[role.slot()].as_deref()
    }

    pub fn attribute(&self, role: AttributeRole) -> Option<&DataArray> {
        self.active_name(role).and_then(|n| self.fields.get(n))
    }

    pub fn role_of(&self, name: &str) -> Option<AttributeRole> {
        AttributeRole::ALL
            .into_iter()
            .find(|r| self.active_name(*r) == Some(name))
    }

    pub fn set_scalars(&mut self, array: impl Into<Arc<DataArray>>) -> Result<usize> {
        self.set_attribute(AttributeRole::Scalars, array)
    }

    pub fn scalars(&self) -> Option<&DataArray> {
        self.attribute(AttributeRole::Scalars)
    }

    pub fn set_vectors(&mut self, array: impl Into<Arc<DataArray>>) -> Result<usize> {
        self.set_attribute(AttributeRole::Vectors, array)
    }

    pub fn vectors(&self) -> Option<&DataArray> {
        self.attribute(AttributeRole::Vectors)
    }

    pub fn set_normals(&mut self, array: impl Into<Arc<DataArray>>) -> Result<usize> {
        self.set_attribute(AttributeRole::Normals, array)
    }

    pub fn normals(&self) -> Option<&DataArray> {
        self.attribute(AttributeRole::Normals)
    }

    pub fn tcoords(&self) -> Option<&DataArray> {
        self.attribute(AttributeRole::TCoords)
    }

    pub fn global_ids(&self) -> Option<&DataArray> {
        self.attribute(AttributeRole::GlobalIds)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<DataArray>> {
        for role in self.roles.iter_mut() {
            if role.as_deref() == Some(name) {
                *role = None;
            }
        }
        self.fields.remove_array(name)
    }

    pub fn fields(&self) -> &FieldData {
        &self.fields
    }

    /// Empty arrays of the same names, types and roles, ready for `append_*`.
    pub fn new_like(&self) -> Self {
        let mut fields = FieldData::new();
        for array in self.fields.iter() {
            fields.arrays.push(Arc::new(array.new_instance()));
        }
        Self {
            fields,
            roles: self.roles.clone(),
        }
    }

    /// Append tuple `id` of every array of `source`; `self` must come from
    /// `source.new_like()`.
    pub fn append_from(&mut self, source: &DataSetAttributes, id: usize) {
        for (dst, src) in self.fields.arrays.iter_mut().zip(source.fields.arrays.iter()) {
            Arc::make_mut(dst).insert_next_tuple_from(src, id);
        }
    }

    /// Append the interpolation of several tuples of `source`.
    pub fn append_interpolated(&mut self, source: &DataSetAttributes, ids: &[usize], weights: &[f64]) {
        for (dst, src) in self.fields.arrays.iter_mut().zip(source.fields.arrays.iter()) {
            Arc::make_mut(dst).insert_next_interpolated(src, ids, weights);
        }
    }

    /// New attributes holding only the given tuples.
    pub fn extract(&self, ids: &[usize]) -> Self {
        let mut fields = FieldData::new();
        for array in self.fields.iter() {
            fields.arrays.push(Arc::new(array.extract_tuples(ids)));
        }
        Self {
            fields,
            roles: self.roles.clone(),
        }
    }

    /// Keep only the arrays present in both and append `other`'s tuples after ours.
    pub fn append_all(&mut self, other: &DataSetAttributes) {
        let mut kept = Vec::new();
        for array in self.fields.arrays.drain(..) {
            let name = array.name().map(str::to_string);
            let matching = name.as_deref().and_then(|n| other.fields.get(n));
            if let Some(src) = matching {
                if src.number_of_components() == array.number_of_components() {
                    let mut array = array;
                    let dst = Arc::make_mut(&mut array);
                    for t in 0..src.number_of_tuples() {
                        dst.insert_next_tuple_from(src, t);
                    }
                    kept.push(array);
                }
            }
        }
        self.fields.arrays = kept;
        for role in self.roles.iter_mut() {
            if let Some(name) = role.as_deref() {
                if self.fields.index_of(name).is_none() {
                    *role = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ScalarType;

    #[test]
    fn roles_are_validated() {
        let mut pd = DataSetAttributes::new();
        let bad = DataArray::from_tuples("v", vec![[1.0f64, 2.0]]);
        assert!(pd.set_vectors(bad).is_err());

        let good = DataArray::from_tuples("v", vec![[1.0f64, 2.0, 3.0]]);
        pd.set_vectors(good).unwrap();
        assert_eq!(pd.vectors().map(|a| a.tuple(0)), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(pd.role_of("v"), Some(AttributeRole::Vectors));

        pd.remove("v");
        assert!(pd.vectors().is_none());
    }

    #[test]
    fn one_array_per_role() {
        let mut pd = DataSetAttributes::new();
        pd.set_scalars(DataArray::scalars("a", vec![1.0f32])).unwrap();
        pd.set_scalars(DataArray::scalars("b", vec![2.0f32])).unwrap();
        assert_eq!(pd.number_of_arrays(), 2);
        assert_eq!(pd.scalars().and_then(|a| a.name()), Some("b"));
    }

    #[test]
    fn interpolation_and_extraction() {
        let mut pd = DataSetAttributes::new();
        pd.set_scalars(DataArray::scalars("s", vec![0.0f64, 10.0, 20.0])).unwrap();
        pd.add_array(DataArray::scalars("id", vec![0i32, 1, 2]));

        let mut out = pd.new_like();
        out.append_interpolated(&pd, &[0, 1], &[0.25, 0.75]);
        out.append_from(&pd, 2);
        assert_eq!(out.scalars().unwrap().values_as_f64(), vec![7.5, 20.0]);
        assert_eq!(out.get("id").unwrap().scalar_type(), ScalarType::Int);
        assert_eq!(out.get("id").unwrap().values_as_f64(), vec![1.0, 2.0]);

        let picked = pd.extract(&[2, 0]);
        assert_eq!(picked.get("s").unwrap().values_as_f64(), vec![20.0, 0.0]);
    }
}
