//! # VTK XML files
//!
//! Serial `.vti .vtr .vts .vtp .vtu .vtt` files, the parallel `.pvti .pvtr .pvts
//! .pvtp .pvtu` summaries and `.vtm` multiblock collections. Arrays are written
//! as ascii, inline base64 or raw appended binary, the latter two with a `UInt64`
//! byte-count header in front of every block.
//!
//! ```
//! use vtk_pipeline::io::xml::{Encoding, XmlReader, XmlWriter};
//! use vtk_pipeline::filters::SphereSource;
//! use vtk_pipeline::DataObject;
//!
//! let sphere = DataObject::from(SphereSource::new([0.0; 3], 1.0).generate().unwrap());
//! let bytes = XmlWriter::new(Encoding::Appended).write_to_bytes(&sphere).unwrap();
//! assert_eq!(XmlReader::new().read_bytes(&bytes).unwrap(), sphere);
//! ```

mod arrays;
mod composite;
mod error;
mod event_summary;
mod parallel;
mod reader;
mod tree;
mod writer;

pub use composite::{read_multiblock, write_multiblock};
pub use error::{
    ArrayData, MalformedAttribute, MalformedXml, MissingAttribute, MissingElement, ParseError, ParsedNameOrBytes,
    UnexpectedAttributeValue, UnexpectedElement,
};
pub use parallel::{read_parallel, ParallelWriter};
pub use reader::XmlReader;
pub use writer::XmlWriter;

use crate::data::DataObject;

/// How array payloads are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    Ascii,
    /// base64 text inside each `DataArray` element
    Binary,
    /// raw bytes in a trailing `AppendedData` block
    #[default]
    Appended,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Binary => "binary",
            Self::Appended => "appended",
        }
    }
}

/// `VTKFile` type name and serial extension for a dataset, if XML can hold it.
pub fn file_type(data: &DataObject) -> Option<(&'static str, &'static str)> {
    let pair = match data {
        DataObject::Image(_) => ("ImageData", "vti"),
        DataObject::Rectilinear(_) => ("RectilinearGrid", "vtr"),
        DataObject::Structured(_) => ("StructuredGrid", "vts"),
        DataObject::PolyData(_) => ("PolyData", "vtp"),
        DataObject::Unstructured(_) => ("UnstructuredGrid", "vtu"),
        DataObject::Table(_) => ("Table", "vtt"),
        DataObject::MultiBlock(_) => ("vtkMultiBlockDataSet", "vtm"),
        _ => return None,
    };
    Some(pair)
}
