//! # Data arrays
//!
//! Typed, multi-component, resizable arrays whose storage reallocations are observable
//! through `BufferChangedEvent`, plus virtual (implicit) arrays that compute their
//! values from a compact backend.
//!
//! ```
//! use vtk_pipeline::array::{DataArray, ArrayAccess};
//!
//! let mut a = DataArray::from_tuples("velocity", vec![[3.0f64, 4.0, 0.0], [0.0, 0.0, 1.0]]);
//! a.insert_next_tuple(&[1.0, 1.0, 1.0])?;
//! assert!(a.insert_next_tuple(&[1.0]).is_err());
//! assert_eq!(a.number_of_tuples(), 3);
//! assert_eq!(a.range(-2), Some([0.0, 5.0]));
//! # Ok::<(), vtk_pipeline::Error>(())
//! ```

mod data_array;
mod implicit;
mod range;
mod scalar;

pub use data_array::DataArray;
pub use implicit::{ImplicitArray, ImplicitBackend};
pub use range::compute_range;
pub use scalar::{Scalar, ScalarType, Storage};

use std::sync::Arc;

/// Typed storage behind a [`DataArray`].
///
/// The vectors are reference counted so a buffer can be shared between arrays
/// (shallow copies, zero-copy views); writes go through copy-on-write.
#[derive(Debug, Clone)]
pub enum Buffer {
    I8(Arc<Vec<i8>>),
    U8(Arc<Vec<u8>>),
    I16(Arc<Vec<i16>>),
    U16(Arc<Vec<u16>>),
    I32(Arc<Vec<i32>>),
    U32(Arc<Vec<u32>>),
    I64(Arc<Vec<i64>>),
    U64(Arc<Vec<u64>>),
    F32(Arc<Vec<f32>>),
    F64(Arc<Vec<f64>>),
}

/// Run `$body` with `$v` bound to the typed vector inside a [`Buffer`].
macro_rules! with_buffer {
    ($buffer:expr, $v:ident => $body:expr) => {
        match $buffer {
            $crate::array::Buffer::I8($v) => $body,
            $crate::array::Buffer::U8($v) => $body,
            $crate::array::Buffer::I16($v) => $body,
            $crate::array::Buffer::U16($v) => $body,
            $crate::array::Buffer::I32($v) => $body,
            $crate::array::Buffer::U32($v) => $body,
            $crate::array::Buffer::I64($v) => $body,
            $crate::array::Buffer::U64($v) => $body,
            $crate::array::Buffer::F32($v) => $body,
            $crate::array::Buffer::F64($v) => $body,
        }
    };
}
pub(crate) use with_buffer;

impl Buffer {
    /// an empty buffer for the storage type of `ty`
    pub fn empty(ty: ScalarType) -> Self {
        Self::zeroed(ty.storage(), 0)
    }

    pub fn zeroed(storage: Storage, len: usize) -> Self {
        match storage {
            Storage::I8 => Self::I8(Arc::new(vec![0; len])),
            Storage::U8 => Self::U8(Arc::new(vec![0; len])),
            Storage::I16 => Self::I16(Arc::new(vec![0; len])),
            Storage::U16 => Self::U16(Arc::new(vec![0; len])),
            Storage::I32 => Self::I32(Arc::new(vec![0; len])),
            Storage::U32 => Self::U32(Arc::new(vec![0; len])),
            Storage::I64 => Self::I64(Arc::new(vec![0; len])),
            Storage::U64 => Self::U64(Arc::new(vec![0; len])),
            Storage::F32 => Self::F32(Arc::new(vec![0.0; len])),
            Storage::F64 => Self::F64(Arc::new(vec![0.0; len])),
        }
    }

    pub fn storage(&self) -> Storage {
        match self {
            Self::I8(_) => Storage::I8,
            Self::U8(_) => Storage::U8,
            Self::I16(_) => Storage::I16,
            Self::U16(_) => Storage::U16,
            Self::I32(_) => Storage::I32,
            Self::U32(_) => Storage::U32,
            Self::I64(_) => Storage::I64,
            Self::U64(_) => Storage::U64,
            Self::F32(_) => Storage::F32,
            Self::F64(_) => Storage::F64,
        }
    }

    pub fn len(&self) -> usize {
        with_buffer!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// whether both buffers point at the same allocation
    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        match (self, other) {
            (Self::I8(a), Self::I8(b)) => Arc::ptr_eq(a, b),
            (Self::U8(a), Self::U8(b)) => Arc::ptr_eq(a, b),
            (Self::I16(a), Self::I16(b)) => Arc::ptr_eq(a, b),
            (Self::U16(a), Self::U16(b)) => Arc::ptr_eq(a, b),
            (Self::I32(a), Self::I32(b)) => Arc::ptr_eq(a, b),
            (Self::U32(a), Self::U32(b)) => Arc::ptr_eq(a, b),
            (Self::I64(a), Self::I64(b)) => Arc::ptr_eq(a, b),
            (Self::U64(a), Self::U64(b)) => Arc::ptr_eq(a, b),
            (Self::F32(a), Self::F32(b)) => Arc::ptr_eq(a, b),
            (Self::F64(a), Self::F64(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// true when another handle to the allocation exists
    pub(crate) fn is_shared(&self) -> bool {
        with_buffer!(self, v => Arc::strong_count(v) > 1 || Arc::weak_count(v) > 0)
    }

    pub(crate) fn get_f64(&self, index: usize) -> f64 {
        with_buffer!(self, v => v[index].as_f64())
    }

    pub(crate) fn get_i128(&self, index: usize) -> Option<i128> {
        with_buffer!(self, v => v[index].as_i128())
    }
}

/// Read access shared by stored and implicit arrays.
pub trait ArrayAccess {
    fn number_of_tuples(&self) -> usize;
    fn number_of_components(&self) -> usize;

    /// value of component `component` of tuple `tuple` converted to `f64`
    fn component(&self, tuple: usize, component: usize) -> f64;

    fn number_of_values(&self) -> usize {
        self.number_of_tuples() * self.number_of_components()
    }

    /// Flat value access, `index = tuple * components + component`.
    fn value(&self, index: usize) -> f64 {
        let nc = self.number_of_components().max(1);
        self.component(index / nc, index % nc)
    }

    /// `[min, max]` of a component; `-1` is the L1 norm and `-2` the L2 norm of the
    /// tuples. `None` when there is nothing to measure.
    fn range(&self, component: i32) -> Option<[f64; 2]> {
        compute_range(self, component)
    }

    /// every tuple copied into a row of `components` values
    fn tuple_f64(&self, tuple: usize) -> Vec<f64> {
        (0..self.number_of_components())
            .map(|c| self.component(tuple, c))
            .collect()
    }
}
