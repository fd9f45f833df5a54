#![doc = include_str!("../README.md")]

pub mod array;
pub mod cell;
pub mod data;
pub mod filters;
pub mod interaction;
pub mod io;
pub mod math;
pub mod object;
pub mod pipeline;
pub mod prelude;
pub mod scene;
mod utils;

pub use array::{ArrayAccess, DataArray, ImplicitArray, ScalarType};
pub use data::{
    CellArray, CellType, DataObject, DataSetAttributes, FieldData, FromFieldData, ImageData, MultiBlock, PolyData,
    RectilinearGrid, StructuredGrid, Table, ToFieldData, UnstructuredGrid,
};
pub use object::{EventId, Observable};
pub use pipeline::{Algorithm, NodeId, Pipeline, UpdateRequest};

#[cfg(feature = "derive")]
pub use vtk_pipeline_derive::{FromFieldData, ToFieldData};

pub use ndarray;

/// general purpose error enumeration for possible causes of failure.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("index out of bounds: {0}")]
    OutOfBounds(String),
    #[error("malformed file: {0}")]
    FileFormat(String),
    #[error("could not allocate: {0}")]
    AllocationFailure(String),
    #[error("pipeline failure: {0}")]
    Pipeline(String),
    #[error("Error while parsing VTK xml: {0}")]
    Parse(#[from] io::xml::ParseError),
    #[error("An io error occured: `{0}`")]
    Io(#[from] std::io::Error),
    #[error("Could not write XML data to file: `{0}`")]
    Xml(#[from] quick_xml::Error),
    #[error("Malformed xml attribute: `{0}`")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("Could not (de)serialize json: `{0}`")]
    Json(#[from] serde_json::Error),
    #[error("Could not decode base64 data: `{0}`")]
    Base64(#[from] base64::DecodeError),
    #[error("Could not convert file to uf8 encoding: `{0}`")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn out_of_bounds(msg: impl Into<String>) -> Self {
        Self::OutOfBounds(msg.into())
    }

    pub fn file_format(msg: impl Into<String>) -> Self {
        Self::FileFormat(msg.into())
    }

    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
