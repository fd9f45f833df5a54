//! # Readers and writers
//!
//! * [`legacy`]: `.vtk` files, versions 4.2 and 5.1, ascii or big-endian binary,
//! * [`xml`]: serial and parallel VTK XML files and `.vtm` collections,
//! * [`cell_grid`]: `.dg` JSON descriptors of a [`CellGrid`](crate::data::CellGrid).
//!
//! [`read`] and [`write`] pick the format from the file extension. [`FileReader`]
//! wraps [`read`] as a pipeline source.

pub mod cell_grid;
pub(crate) mod encode;
pub mod legacy;
pub mod xml;

use crate::data::{DataKind, DataObject};
use crate::object::{Object, Observable};
use crate::pipeline::{array_information, extract_piece, Algorithm, ExecutionContext, Information};
use crate::utils::impl_observable;
use crate::{Error, Result};

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File families understood by [`read`] and [`write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Legacy,
    Xml,
    ParallelXml,
    MultiBlock,
    CellGrid,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| Error::invalid_argument(format!("`{}` has no extension", path.display())))?;
        let format = match ext.as_str() {
            "vtk" => Self::Legacy,
            "vti" | "vtr" | "vts" | "vtp" | "vtu" | "vtt" => Self::Xml,
            "pvti" | "pvtp" | "pvtu" => Self::ParallelXml,
            "vtm" => Self::MultiBlock,
            "dg" => Self::CellGrid,
            other => return Err(Error::invalid_argument(format!("unknown file extension `.{other}`"))),
        };
        Ok(format)
    }
}

/// Read any supported file.
pub fn read(path: impl AsRef<Path>) -> Result<DataObject> {
    let path = path.as_ref();
    let data = match FileFormat::from_path(path)? {
        FileFormat::Legacy => legacy::LegacyReader::new().read(path)?.data,
        FileFormat::Xml => xml::XmlReader::new().read(path)?,
        FileFormat::ParallelXml => xml::read_parallel(path)?,
        FileFormat::MultiBlock => DataObject::MultiBlock(xml::read_multiblock(path)?),
        FileFormat::CellGrid => DataObject::CellGrid(cell_grid::read(path)?),
    };
    Ok(data)
}

/// Write `data` with the default settings of the format the extension names.
pub fn write(path: impl AsRef<Path>, data: &DataObject) -> Result<()> {
    let path = path.as_ref();
    match (FileFormat::from_path(path)?, data) {
        (FileFormat::Legacy, _) => legacy::LegacyWriter::new().write(path, data),
        (FileFormat::Xml, _) => {
            let expected = xml::file_type(data).map(|(_, ext)| ext);
            let ext = path.extension().and_then(|e| e.to_str());
            if expected.is_none() || expected != ext.map(str::to_ascii_lowercase).as_deref() {
                return Err(Error::invalid_argument(format!(
                    "a {} cannot be written to `{}`",
                    data.type_name(),
                    path.display()
                )));
            }
            xml::XmlWriter::default().write(path, data)
        }
        (FileFormat::ParallelXml, _) => xml::ParallelWriter::default().write(path, data).map(|_| ()),
        (FileFormat::MultiBlock, DataObject::MultiBlock(blocks)) => {
            xml::write_multiblock(path, blocks, xml::Encoding::default())
        }
        (FileFormat::CellGrid, DataObject::CellGrid(grid)) => cell_grid::write(path, grid),
        (_, other) => Err(Error::invalid_argument(format!(
            "a {} cannot be written to `{}`",
            other.type_name(),
            path.display()
        ))),
    }
}

/// Pipeline source producing the contents of a file.
///
/// The file is read during the information pass, again only after [`set_path`]
/// or [`modified`](Observable::modified). Piece requests are served from the cached
/// dataset.
///
/// [`set_path`]: FileReader::set_path
#[derive(Debug)]
pub struct FileReader {
    object: Object,
    path: PathBuf,
    cache: Option<(u64, Arc<DataObject>)>,
}

impl_observable!(FileReader);

impl FileReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            object: Object::new(),
            path: path.into(),
            cache: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if path != self.path {
            self.path = path;
            self.modified();
        }
    }

    fn load(&mut self) -> Result<Arc<DataObject>> {
        let mtime = self.mtime();
        if let Some((read_at, data)) = &self.cache {
            if *read_at == mtime {
                return Ok(Arc::clone(data));
            }
        }
        let data = Arc::new(read(&self.path)?);
        tracing::debug!(path = %self.path.display(), kind = data.type_name(), "file reader loaded");
        self.cache = Some((mtime, Arc::clone(&data)));
        Ok(data)
    }
}

impl Algorithm for FileReader {
    fn name(&self) -> &'static str {
        "FileReader"
    }

    fn number_of_input_ports(&self) -> usize {
        0
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        let data = self.load()?;
        let info = &mut outputs[0];
        *info = Information::of_kind(data.kind());
        info.whole_extent = data.as_image().map(|image| image.extent);
        info.arrays = array_information(&data);
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let data = self.load()?;
        let out = extract_piece(&data, ctx.request().piece);
        ctx.set_output(0, out)
    }
}

/// Kind a reader for `path` will produce, without reading the file.
pub fn expected_kind(path: &Path) -> Option<DataKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let kind = match ext.as_str() {
        "vti" | "pvti" => DataKind::Image,
        "vtr" => DataKind::Rectilinear,
        "vts" => DataKind::Structured,
        "vtp" | "pvtp" => DataKind::PolyData,
        "vtu" | "pvtu" => DataKind::Unstructured,
        "vtt" => DataKind::Table,
        "vtm" => DataKind::MultiBlock,
        "dg" => DataKind::CellGrid,
        _ => return None,
    };
    Some(kind)
}
