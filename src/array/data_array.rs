use super::{compute_range, with_buffer, ArrayAccess, Buffer, Scalar, ScalarType};
use crate::object::{EventId, Object, Observable};
use crate::{Error, Result};

use std::sync::Arc;

/// A named, typed, multi-component array of tuples.
///
/// Capacity is tracked in tuples. The buffer always holds `capacity * components`
/// values; only the first `tuples * components` are meaningful. Any operation that
/// reallocates or replaces the storage fires `BufferChangedEvent` on the array.
#[derive(Debug)]
pub struct DataArray {
    object: Object,
    name: Option<String>,
    scalar_type: ScalarType,
    components: usize,
    tuples: usize,
    capacity: usize,
    buffer: Buffer,
}

impl Observable for DataArray {
    fn object(&self) -> &Object {
        &self.object
    }

    fn object_mut(&mut self) -> &mut Object {
        &mut self.object
    }
}

impl Clone for DataArray {
    /// A clone shares the storage (copy-on-write) but is a new object without observers.
    fn clone(&self) -> Self {
        Self {
            object: self.object.clone(),
            name: self.name.clone(),
            scalar_type: self.scalar_type,
            components: self.components,
            tuples: self.tuples,
            capacity: self.capacity,
            buffer: self.buffer.clone(),
        }
    }
}

impl PartialEq for DataArray {
    /// Arrays are equal when names, shapes, storage types and live values match.
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name
            || self.components != other.components
            || self.tuples != other.tuples
            || self.buffer.storage() != other.buffer.storage()
        {
            return false;
        }
        let n = self.number_of_values();
        (0..n).all(|i| {
            if let (Some(a), Some(b)) = (self.buffer.get_i128(i), other.buffer.get_i128(i)) {
                return a == b;
            }
            let a = self.buffer.get_f64(i);
            let b = other.buffer.get_f64(i);
            a == b || (a.is_nan() && b.is_nan())
        })
    }
}

impl DataArray {
    /// An empty, unnamed array.
    pub fn new(scalar_type: ScalarType, components: usize) -> Self {
        Self {
            object: Object::new(),
            name: None,
            scalar_type,
            components: components.max(1),
            tuples: 0,
            capacity: 0,
            buffer: Buffer::empty(scalar_type),
        }
    }

    pub fn with_name(scalar_type: ScalarType, components: usize, name: impl Into<String>) -> Self {
        let mut array = Self::new(scalar_type, components);
        array.name = Some(name.into());
        array
    }

    /// Take ownership of a flat vector of values.
    pub fn from_vec<T: Scalar>(name: impl Into<String>, components: usize, values: Vec<T>) -> Result<Self> {
        if components == 0 || values.len() % components != 0 {
            return Err(Error::invalid_argument(format!(
                "{} values cannot be split into tuples of {} components",
                values.len(),
                components
            )));
        }
        let tuples = values.len() / components;
        Ok(Self {
            object: Object::new(),
            name: Some(name.into()),
            scalar_type: T::NATIVE,
            components,
            tuples,
            capacity: tuples,
            buffer: T::wrap(Arc::new(values)),
        })
    }

    /// Single component array.
    pub fn scalars<T: Scalar>(name: impl Into<String>, values: Vec<T>) -> Self {
        let tuples = values.len();
        Self {
            object: Object::new(),
            name: Some(name.into()),
            scalar_type: T::NATIVE,
            components: 1,
            tuples,
            capacity: tuples,
            buffer: T::wrap(Arc::new(values)),
        }
    }

    /// One tuple per element of `tuples`.
    pub fn from_tuples<T: Scalar, const N: usize>(name: impl Into<String>, tuples: Vec<[T; N]>) -> Self {
        let count = tuples.len();
        let values: Vec<T> = tuples.into_iter().flatten().collect();
        Self {
            object: Object::new(),
            name: Some(name.into()),
            scalar_type: T::NATIVE,
            components: N.max(1),
            tuples: count,
            capacity: count,
            buffer: T::wrap(Arc::new(values)),
        }
    }

    /// View over a buffer owned elsewhere. No values are copied until the array is
    /// written to.
    pub fn from_shared<T: Scalar>(name: impl Into<String>, components: usize, values: Arc<Vec<T>>) -> Result<Self> {
        let mut array = Self::new(T::NATIVE, components.max(1));
        array.name = Some(name.into());
        array.set_buffer(values)?;
        Ok(array)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
        self.object.modified();
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    /// Change the type tag without touching the values. The storage type must match.
    pub fn set_scalar_type_tag(&mut self, scalar_type: ScalarType) -> Result<()> {
        if scalar_type.storage() != self.buffer.storage() {
            return Err(Error::invalid_argument(format!(
                "type {scalar_type} is not stored as {:?}",
                self.buffer.storage()
            )));
        }
        self.scalar_type = scalar_type;
        Ok(())
    }

    pub fn number_of_components(&self) -> usize {
        self.components
    }

    /// Change the component count of an empty array.
    pub fn set_number_of_components(&mut self, components: usize) -> Result<()> {
        if self.tuples != 0 {
            return Err(Error::invalid_argument(
                "cannot change the component count of a non-empty array",
            ));
        }
        self.components = components.max(1);
        self.capacity = self.buffer.len() / self.components;
        Ok(())
    }

    pub fn number_of_tuples(&self) -> usize {
        self.tuples
    }

    pub fn number_of_values(&self) -> usize {
        self.tuples * self.components
    }

    pub fn is_empty(&self) -> bool {
        self.tuples == 0
    }

    /// allocated size in tuples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// whether `self` and `other` view the same allocation
    pub fn shares_buffer_with(&self, other: &DataArray) -> bool {
        self.buffer.ptr_eq(&other.buffer)
    }

    /// Typed view of the live values.
    pub fn as_slice<T: Scalar>(&self) -> Option<&[T]> {
        T::view(&self.buffer).map(|v| &v[..self.number_of_values()])
    }

    /// Handle to the shared storage, e.g. to hand it to another array without a copy.
    pub fn shared_buffer<T: Scalar>(&self) -> Option<Arc<Vec<T>>> {
        T::view(&self.buffer).cloned()
    }

    /// Panics when `(tuple, component)` is outside the array; [`Self::try_component`]
    /// is the checked form.
    pub fn component(&self, tuple: usize, component: usize) -> f64 {
        self.buffer.get_f64(tuple * self.components + component)
    }

    pub fn try_component(&self, tuple: usize, component: usize) -> Result<f64> {
        if tuple >= self.tuples || component >= self.components {
            return Err(Error::out_of_bounds(format!(
                "({tuple}, {component}) outside of {}x{} array {}",
                self.tuples,
                self.components,
                self.name().unwrap_or("<unnamed>")
            )));
        }
        Ok(self.component(tuple, component))
    }

    /// flat value access, panics past the end
    pub fn value(&self, index: usize) -> f64 {
        self.buffer.get_f64(index)
    }

    /// exact value of an integer array, `None` for floating point arrays
    pub fn integer_value(&self, index: usize) -> Option<i128> {
        self.buffer.get_i128(index)
    }

    pub fn tuple(&self, tuple: usize) -> Vec<f64> {
        (0..self.components).map(|c| self.component(tuple, c)).collect()
    }

    /// First three components of a tuple, missing components are zero.
    pub fn tuple3(&self, tuple: usize) -> [f64; 3] {
        let mut out = [0.0; 3];
        for (c, slot) in out.iter_mut().enumerate().take(self.components) {
            *slot = self.component(tuple, c);
        }
        out
    }

    /// every live value converted to `f64`
    pub fn values_as_f64(&self) -> Vec<f64> {
        (0..self.number_of_values()).map(|i| self.buffer.get_f64(i)).collect()
    }

    pub fn range(&self, component: i32) -> Option<[f64; 2]> {
        compute_range(self, component)
    }

    fn buffer_changed(&mut self) {
        tracing::trace!(
            array = self.name().unwrap_or("<unnamed>"),
            capacity = self.capacity,
            "buffer changed"
        );
        self.object.modified();
        self.object.invoke(EventId::BufferChangedEvent, None);
    }

    /// Copy shared storage before a write.
    fn make_unique(&mut self) {
        if self.buffer.is_shared() {
            with_buffer!(&mut self.buffer, v => {
                *v = Arc::new((**v).clone());
            });
            self.buffer_changed();
        }
    }

    /// Reallocate to exactly `capacity` tuples, keeping the leading values.
    fn reallocate(&mut self, capacity: usize) {
        let len = capacity * self.components;
        with_buffer!(&mut self.buffer, v => {
            let mut fresh = Vec::with_capacity(len);
            let keep = v.len().min(len);
            fresh.extend_from_slice(&v[..keep]);
            fresh.resize(len, Default::default());
            *v = Arc::new(fresh);
        });
        self.capacity = capacity;
        self.buffer_changed();
    }

    fn store(&mut self, index: usize, value: f64) {
        let value = if self.scalar_type == ScalarType::Bit {
            if value != 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            value
        };
        with_buffer!(&mut self.buffer, v => {
            if let Some(values) = Arc::get_mut(v) {
                values[index] = Scalar::from_f64(value);
            }
        });
    }

    /// Set a value inside the current tuple count.
    pub fn set_component(&mut self, tuple: usize, component: usize, value: f64) -> Result<()> {
        if tuple >= self.tuples || component >= self.components {
            return Err(Error::out_of_bounds(format!(
                "cannot set ({tuple}, {component}) of a {}x{} array",
                self.tuples, self.components
            )));
        }
        self.make_unique();
        self.store(tuple * self.components + component, value);
        Ok(())
    }

    pub fn set_value(&mut self, index: usize, value: f64) -> Result<()> {
        let nc = self.components;
        self.set_component(index / nc, index % nc, value)
    }

    /// Store an integer, truncating it to the storage width (two's complement).
    pub fn set_integer_value_wrapping(&mut self, index: usize, value: i128) -> Result<()> {
        if index >= self.number_of_values() {
            return Err(Error::out_of_bounds(format!("value {index} of {}", self.number_of_values())));
        }
        self.make_unique();
        with_buffer!(&mut self.buffer, v => {
            if let Some(values) = Arc::get_mut(v) {
                values[index] = Scalar::from_i128_wrapping(value);
            }
        });
        Ok(())
    }

    pub fn set_tuple(&mut self, tuple: usize, values: &[f64]) -> Result<()> {
        if tuple >= self.tuples {
            return Err(Error::out_of_bounds(format!("tuple {tuple} of {}", self.tuples)));
        }
        self.check_tuple_len(values)?;
        self.make_unique();
        let base = tuple * self.components;
        for (c, value) in values.iter().enumerate() {
            self.store(base + c, *value);
        }
        Ok(())
    }

    fn check_tuple_len(&self, values: &[f64]) -> Result<()> {
        if values.len() != self.components {
            return Err(Error::invalid_argument(format!(
                "tuple of {} values given to an array of {} components",
                values.len(),
                self.components
            )));
        }
        Ok(())
    }

    fn ensure_capacity(&mut self, needed: usize) {
        if needed > self.capacity {
            let grown = (self.capacity * 2).max(needed);
            self.reallocate(grown);
        } else {
            self.make_unique();
        }
    }

    /// Set a tuple, growing the array if `tuple` is past the end.
    pub fn insert_tuple(&mut self, tuple: usize, values: &[f64]) -> Result<()> {
        self.check_tuple_len(values)?;
        self.ensure_capacity(tuple + 1);
        self.tuples = self.tuples.max(tuple + 1);
        let base = tuple * self.components;
        for (c, value) in values.iter().enumerate() {
            self.store(base + c, *value);
        }
        Ok(())
    }

    /// Append a tuple and return its index.
    pub fn insert_next_tuple(&mut self, values: &[f64]) -> Result<usize> {
        self.check_tuple_len(values)?;
        Ok(self.push_tuple(values))
    }

    /// Append a tuple whose length is already known to match.
    pub(crate) fn push_tuple(&mut self, values: &[f64]) -> usize {
        let tuple = self.tuples;
        self.ensure_capacity(tuple + 1);
        self.tuples += 1;
        let base = tuple * self.components;
        for (c, value) in values.iter().enumerate() {
            self.store(base + c, *value);
        }
        tuple
    }

    /// Append one value to a single component array.
    pub fn insert_next_value(&mut self, value: f64) -> usize {
        if self.components == 1 {
            return self.push_tuple(&[value]);
        }
        let mut tuple = vec![0.0; self.components];
        if let Some(first) = tuple.first_mut() {
            *first = value;
        }
        self.push_tuple(&tuple)
    }

    /// Set the tuple count. Storage is only reallocated when growing past capacity.
    pub fn set_number_of_tuples(&mut self, tuples: usize) {
        if tuples > self.capacity {
            self.reallocate(tuples);
        }
        self.tuples = tuples;
    }

    /// Reallocate to exactly `tuples` of capacity, truncating the data if needed.
    pub fn resize(&mut self, tuples: usize) {
        if tuples != self.capacity {
            self.reallocate(tuples);
        }
        self.tuples = self.tuples.min(tuples);
    }

    /// Forget the values but keep the allocation.
    pub fn reset(&mut self) {
        self.tuples = 0;
    }

    /// Release the storage.
    pub fn initialize(&mut self) {
        self.tuples = 0;
        if self.capacity != 0 {
            self.reallocate(0);
        }
    }

    /// Shrink the allocation to the tuple count.
    pub fn squeeze(&mut self) {
        if self.capacity != self.tuples {
            self.reallocate(self.tuples);
        }
    }

    /// Replace the storage with a shared buffer (zero-copy view). The component count
    /// is kept, the tuple count becomes `len / components`.
    pub fn set_buffer<T: Scalar>(&mut self, values: Arc<Vec<T>>) -> Result<()> {
        if values.len() % self.components != 0 {
            return Err(Error::invalid_argument(format!(
                "buffer of {} values is not a multiple of {} components",
                values.len(),
                self.components
            )));
        }
        if self.scalar_type.storage() != T::NATIVE.storage() {
            self.scalar_type = T::NATIVE;
        }
        self.tuples = values.len() / self.components;
        self.capacity = self.tuples;
        self.buffer = T::wrap(values);
        self.buffer_changed();
        Ok(())
    }

    /// Replace the storage, taking ownership of `values`.
    pub fn set_array<T: Scalar>(&mut self, values: Vec<T>) -> Result<()> {
        self.set_buffer(Arc::new(values))
    }

    /// Share the storage of `other`. Name and observers are kept.
    pub fn shallow_copy(&mut self, other: &DataArray) {
        self.scalar_type = other.scalar_type;
        self.components = other.components;
        self.tuples = other.tuples;
        self.capacity = other.capacity;
        self.buffer = other.buffer.clone();
        self.buffer_changed();
    }

    /// An independent copy: new object, new storage trimmed to the tuple count.
    pub fn deep_copy(&self) -> DataArray {
        let len = self.number_of_values();
        let buffer = with_buffer!(&self.buffer, v => Scalar::wrap(Arc::new(v[..len].to_vec())));
        Self {
            object: Object::new(),
            name: self.name.clone(),
            scalar_type: self.scalar_type,
            components: self.components,
            tuples: self.tuples,
            capacity: self.tuples,
            buffer,
        }
    }

    /// An empty array of the same type, name and component count.
    pub fn new_instance(&self) -> DataArray {
        let mut array = DataArray::new(self.scalar_type, self.components);
        array.name = self.name.clone();
        array
    }

    /// Append tuple `source_tuple` of `source`.
    pub fn insert_next_tuple_from(&mut self, source: &DataArray, source_tuple: usize) -> usize {
        if source.buffer.storage() == self.buffer.storage() && source.scalar_type.is_integer() {
            let base = source_tuple * source.components;
            let row: Vec<i128> = (0..self.components)
                .map(|c| source.integer_value(base + c).unwrap_or(0))
                .collect();
            let tuple = self.tuples;
            self.ensure_capacity(tuple + 1);
            self.tuples += 1;
            let dst = tuple * self.components;
            with_buffer!(&mut self.buffer, v => {
                if let Some(values) = Arc::get_mut(v) {
                    for (c, x) in row.iter().enumerate() {
                        values[dst + c] = Scalar::from_i128_wrapping(*x);
                    }
                }
            });
            tuple
        } else {
            let mut row = source.tuple(source_tuple);
            row.resize(self.components, 0.0);
            self.push_tuple(&row)
        }
    }

    /// Append the weighted sum of several source tuples.
    pub fn insert_next_interpolated(&mut self, source: &DataArray, ids: &[usize], weights: &[f64]) -> usize {
        let mut row = vec![0.0; self.components];
        for (id, w) in ids.iter().zip(weights) {
            for (c, slot) in row.iter_mut().enumerate() {
                *slot += w * source.component(*id, c);
            }
        }
        if self.scalar_type.is_integer() {
            for x in row.iter_mut() {
                *x = x.round();
            }
        }
        self.push_tuple(&row)
    }

    /// Gather the given tuples into a new array of the same type.
    pub fn extract_tuples(&self, ids: &[usize]) -> DataArray {
        let mut out = self.new_instance();
        out.reserve(ids.len());
        for id in ids {
            out.insert_next_tuple_from(self, *id);
        }
        out
    }

    /// Make room for `tuples` without changing the tuple count.
    pub fn reserve(&mut self, tuples: usize) {
        if tuples > self.capacity {
            self.reallocate(tuples);
        }
    }
}

impl ArrayAccess for DataArray {
    fn number_of_tuples(&self) -> usize {
        self.tuples
    }

    fn number_of_components(&self) -> usize {
        self.components
    }

    fn component(&self, tuple: usize, component: usize) -> f64 {
        DataArray::component(self, tuple, component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(array: &DataArray) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        array.add_observer(EventId::BufferChangedEvent, 0.0, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn buffer_changed_on_resize_only() {
        let mut array = DataArray::new(ScalarType::Float, 1);
        array.set_number_of_tuples(10);
        let count = counter(&array);

        array.set_number_of_tuples(10);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        array.resize(1000);
        assert!(count.load(Ordering::SeqCst) > 0);
        assert_eq!(array.capacity(), 1000);
        assert_eq!(array.number_of_tuples(), 10);
    }

    #[test]
    fn mismatched_tuples_are_rejected() {
        let mut array = DataArray::new(ScalarType::Float, 3);
        assert!(array.insert_next_tuple(&[1.0, 2.0]).is_err());
        assert_eq!(array.number_of_tuples(), 0);
        assert_eq!(array.insert_next_tuple(&[1.0, 2.0, 3.0]).unwrap(), 0);
        assert!(array.try_component(0, 3).is_err());
        assert!(array.try_component(1, 0).is_err());
    }

    #[test]
    fn geometric_growth() {
        let mut array = DataArray::new(ScalarType::Int, 2);
        let count = counter(&array);
        for i in 0..9 {
            array.insert_next_tuple(&[i as f64, -(i as f64)]).unwrap();
        }
        // 1, 2, 4, 8, 16
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(array.capacity(), 16);
        assert_eq!(array.tuple(8), vec![8.0, -8.0]);
        assert_eq!(array.as_slice::<i32>().map(|s| s.len()), Some(18));
    }

    #[test]
    fn zero_copy_view_and_copy_on_write() {
        let external = Arc::new(vec![1.0f64, 2.0, 3.0, 4.0]);
        let mut array = DataArray::new(ScalarType::Double, 2);
        let count = counter(&array);
        array.set_buffer(Arc::clone(&external)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(array.number_of_tuples(), 2);
        assert!(Arc::ptr_eq(&array.shared_buffer::<f64>().unwrap(), &external));

        array.set_component(1, 1, 40.0).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(external[3], 4.0);
        assert_eq!(array.component(1, 1), 40.0);
    }

    #[test]
    fn shallow_copy_shares_and_fires() {
        let source = DataArray::from_tuples("p", vec![[1u8, 2], [3, 4]]);
        let mut target = DataArray::with_name(ScalarType::Double, 1, "q");
        let count = counter(&target);
        target.shallow_copy(&source);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(target.shares_buffer_with(&source));
        assert_eq!(target.name(), Some("q"));
        assert_eq!(target.scalar_type(), ScalarType::UnsignedChar);

        let deep = source.deep_copy();
        assert!(!deep.shares_buffer_with(&source));
        assert_eq!(deep, source);
    }

    #[test]
    fn bad_shapes_are_rejected() {
        assert!(DataArray::from_vec("x", 3, vec![1.0f32; 4]).is_err());
        let mut array = DataArray::new(ScalarType::Double, 3);
        assert!(array.insert_tuple(0, &[1.0]).is_err());
        assert!(array.set_component(0, 0, 1.0).is_err());
        assert!(matches!(array.try_component(5, 0), Err(Error::OutOfBounds(_))));
    }

    #[test]
    fn bit_arrays_store_zero_or_one() {
        let mut array = DataArray::new(ScalarType::Bit, 1);
        array.insert_next_value(5.0);
        array.insert_next_value(0.0);
        assert_eq!(array.values_as_f64(), vec![1.0, 0.0]);
    }

    #[test]
    fn squeeze_and_initialize() {
        let mut array = DataArray::new(ScalarType::Short, 1);
        for i in 0..5 {
            array.insert_next_value(i as f64);
        }
        assert_eq!(array.capacity(), 8);
        array.squeeze();
        assert_eq!(array.capacity(), 5);
        array.reset();
        assert_eq!(array.capacity(), 5);
        array.initialize();
        assert_eq!(array.capacity(), 0);
    }
}
