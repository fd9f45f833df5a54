//! Common traits and types that are useful for working with `vtk_pipeline`
#![allow(unused_imports)]

pub use crate::array::{ArrayAccess, DataArray, Scalar, ScalarType};
pub use crate::data::{
    AttributeRole, CellArray, CellType, DataObject, DataSetAttributes, FieldData, ImageData, MultiBlock, Points,
    PolyData, Table, UnstructuredGrid,
};
pub use crate::filters::ImplicitFunction;
pub use crate::object::{EventId, Observable};
pub use crate::pipeline::{Algorithm, NodeId, Pipeline, UpdateRequest};
pub use crate::{Error, Result};
pub use crate::{FromFieldData, ToFieldData};
