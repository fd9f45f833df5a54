//! # Legacy `.vtk` files
//!
//! Versions 4.2 and 5.1, ASCII or big-endian BINARY, for image, rectilinear,
//! structured, polygonal and unstructured datasets plus tables.
//!
//! ```
//! use vtk_pipeline::io::legacy::{LegacyReader, LegacyVersion, LegacyWriter};
//! use vtk_pipeline::filters::PlaneSource;
//! use vtk_pipeline::DataObject;
//!
//! let plane = DataObject::from(PlaneSource::new().generate().unwrap());
//! let bytes = LegacyWriter::new().version(LegacyVersion::V4_2).write_to_bytes(&plane).unwrap();
//! let file = LegacyReader::new().read_bytes(&bytes).unwrap();
//! assert_eq!(file.version, (4, 2));
//! assert_eq!(file.data, plane);
//! ```

mod reader;
mod writer;

pub use reader::{LegacyFile, LegacyReader};
pub use writer::LegacyWriter;

/// Encoding of the array payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    #[default]
    Ascii,
    /// big-endian raw values
    Binary,
}

/// Layout of the cell sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegacyVersion {
    /// interleaved `n id0 id1 ...` 32 bit cell lists
    V4_2,
    /// separate 64 bit `OFFSETS` and `CONNECTIVITY` arrays
    #[default]
    V5_1,
}

impl LegacyVersion {
    pub fn number(&self) -> (u32, u32) {
        match self {
            Self::V4_2 => (4, 2),
            Self::V5_1 => (5, 1),
        }
    }
}
