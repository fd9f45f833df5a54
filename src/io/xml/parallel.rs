//! Parallel summary files (`.pvti .pvtp .pvtu`) and the serial pieces they list.

use super::arrays::{encode, PayloadReader};
use super::reader::{array_header, piece_extent, read_field_data, XmlReader};
use super::tree::parse_document;
use super::writer::{extent_string, floats, role_attribute, DocWriter, XmlWriter};
use super::{file_type, Encoding};
use crate::array::DataArray;
use crate::data::{
    extent_dimensions, AttributeRole, DataObject, DataSetAttributes, Extent, ImageData, PolyData, UnstructuredGrid,
};
use crate::math;
use crate::pipeline::{extract_piece, Piece};
use crate::{Error, Result};

use std::path::{Path, PathBuf};

/// Splits a dataset into pieces, writes each as a serial file and lists them in a
/// summary file.
///
/// Images are cut into slabs along their longest axis; neighbouring slabs share
/// one layer of points. Poly data and unstructured grids are split by cell range.
#[derive(Debug, Clone, Copy)]
pub struct ParallelWriter {
    pieces: usize,
    encoding: Encoding,
}

impl Default for ParallelWriter {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ParallelWriter {
    pub fn new(pieces: usize) -> Self {
        Self {
            pieces: pieces.max(1),
            encoding: Encoding::default(),
        }
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Write the summary to `path` and the pieces next to it as `<stem>_<i>.<ext>`.
    /// Returns the piece paths.
    pub fn write(&self, path: impl AsRef<Path>, data: &DataObject) -> Result<Vec<PathBuf>> {
        let path = path.as_ref();
        let (type_name, ext) = match data {
            DataObject::Image(_) | DataObject::PolyData(_) | DataObject::Unstructured(_) => {
                file_type(data).ok_or_else(|| Error::invalid_argument("no xml type"))?
            }
            other => {
                return Err(Error::invalid_argument(format!(
                    "a {} cannot be written as a parallel file",
                    other.type_name()
                )))
            }
        };
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::invalid_argument(format!("`{}` has no file name", path.display())))?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));

        let pieces = self.split(data)?;
        let serial = XmlWriter::new(self.encoding);
        let mut written = Vec::with_capacity(pieces.len());
        let mut sources = Vec::with_capacity(pieces.len());
        for (i, piece) in pieces.iter().enumerate() {
            let file = format!("{stem}_{i}.{ext}");
            let piece_path = dir.join(&file);
            serial.write(&piece_path, piece)?;
            written.push(piece_path);
            sources.push(file);
        }

        let summary = summary(type_name, data, &pieces, &sources)?;
        std::fs::write(path, summary)?;
        tracing::info!(path = %path.display(), pieces = pieces.len(), "wrote parallel xml file");
        Ok(written)
    }

    fn split(&self, data: &DataObject) -> Result<Vec<DataObject>> {
        match data {
            DataObject::Image(image) => {
                if self.pieces == 1 {
                    return Ok(vec![data.clone()]);
                }
                let mut out = Vec::new();
                for index in 0..self.pieces {
                    let Some(extent) = Piece::new(index, self.pieces).slab(&image.extent) else {
                        continue;
                    };
                    let mut slab = image.crop(&extent)?;
                    slab.field_data = image.field_data.clone();
                    out.push(DataObject::Image(slab));
                }
                if out.is_empty() {
                    out.push(data.clone());
                }
                Ok(out)
            }
            _ => Ok((0..self.pieces)
                .map(|index| extract_piece(data, Piece::new(index, self.pieces)))
                .collect()),
        }
    }
}

fn array_headers(doc: &mut DocWriter, array: &DataArray) -> Result<()> {
    let mut scratch = Vec::new();
    let encoded = encode(array, Encoding::Ascii, &mut scratch);
    let attributes: Vec<(&str, String)> = encoded
        .attributes
        .into_iter()
        .filter(|(k, _)| matches!(*k, "type" | "Name" | "NumberOfComponents"))
        .collect();
    doc.empty("PDataArray", &attributes)
}

fn attribute_headers(doc: &mut DocWriter, element: &str, attributes: &DataSetAttributes) -> Result<()> {
    let roles: Vec<(&str, String)> = AttributeRole::ALL
        .iter()
        .filter_map(|r| attributes.active_name(*r).map(|n| (role_attribute(*r), n.to_string())))
        .collect();
    doc.start(element, &roles)?;
    for array in attributes.iter() {
        array_headers(doc, array)?;
    }
    doc.end(element)
}

fn summary(type_name: &str, data: &DataObject, pieces: &[DataObject], sources: &[String]) -> Result<Vec<u8>> {
    let p_name = format!("P{type_name}");
    let mut doc = DocWriter::new(Encoding::Ascii);
    doc.open_file(&p_name)?;
    let mut attributes = vec![("GhostLevel", "0".to_string())];
    if let DataObject::Image(image) = data {
        attributes.insert(0, ("WholeExtent", extent_string(&image.extent)));
        attributes.push(("Origin", floats(&image.origin)));
        attributes.push(("Spacing", floats(&image.spacing)));
        if image.direction != math::IDENTITY3 {
            let flat: Vec<f64> = image.direction.iter().flatten().copied().collect();
            attributes.push(("Direction", floats(&flat)));
        }
    }
    doc.start(&p_name, &attributes)?;
    if let Some(fields) = data.field_data() {
        doc.field_data(fields)?;
    }
    if let (Some(point_data), Some(cell_data)) = (data.point_data(), data.cell_data()) {
        attribute_headers(&mut doc, "PPointData", point_data)?;
        attribute_headers(&mut doc, "PCellData", cell_data)?;
    }
    let points = match data {
        DataObject::PolyData(poly) => Some(poly.points.data()),
        DataObject::Unstructured(grid) => Some(grid.points.data()),
        _ => None,
    };
    if let Some(points) = points {
        doc.start("PPoints", &[])?;
        array_headers(&mut doc, points)?;
        doc.end("PPoints")?;
    }
    for (piece, source) in pieces.iter().zip(sources) {
        let mut attrs = Vec::with_capacity(2);
        if let DataObject::Image(image) = piece {
            attrs.push(("Extent", extent_string(&image.extent)));
        }
        attrs.push(("Source", source.clone()));
        doc.empty("Piece", &attrs)?;
    }
    doc.end(&p_name)?;
    doc.finish()
}

/// Read a parallel summary file and every piece it lists.
pub fn read_parallel(path: impl AsRef<Path>) -> Result<DataObject> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let doc = parse_document(&bytes)?;
    let p_name = doc.root.required("type")?;
    let type_name = p_name
        .strip_prefix('P')
        .ok_or_else(|| Error::file_format(format!("`{p_name}` is not a parallel file type")))?;
    let summary = doc.root.expect_child(p_name)?;
    let payload = PayloadReader::new(&doc.root, doc.appended)?;
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    let reader = XmlReader::new();
    let mut pieces = Vec::new();
    for piece in summary.children_named("Piece") {
        let source = piece.required("Source")?;
        let data = reader.read(dir.join(source))?;
        if data.type_name() != type_name {
            return Err(Error::file_format(format!(
                "piece `{source}` holds a {} instead of a {type_name}",
                data.type_name()
            )));
        }
        pieces.push(data);
    }
    let mut data = match type_name {
        "ImageData" => {
            let extent = piece_extent(summary, summary)?;
            let mut whole = ImageData::new(
                extent,
                summary.parse_list("Origin", "three coordinates")?.unwrap_or([0.0; 3]),
                summary.parse_list("Spacing", "three spacings")?.unwrap_or([1.0; 3]),
            );
            if let Some(d) = summary.parse_list::<f64, 9>("Direction", "nine direction cosines")? {
                whole.direction = [[d[0], d[1], d[2]], [d[3], d[4], d[5]], [d[6], d[7], d[8]]];
            }
            let images: Vec<&ImageData> = pieces.iter().filter_map(DataObject::as_image).collect();
            assemble_image(&mut whole, &images)?;
            DataObject::Image(whole)
        }
        "PolyData" => {
            let mut whole = PolyData::new();
            for (i, piece) in pieces.iter().filter_map(DataObject::as_poly_data).enumerate() {
                if i == 0 {
                    whole = piece.clone();
                } else {
                    whole.append(piece);
                }
            }
            DataObject::PolyData(whole)
        }
        "UnstructuredGrid" => {
            let mut whole = UnstructuredGrid::new();
            for (i, piece) in pieces.iter().filter_map(DataObject::as_unstructured).enumerate() {
                if i == 0 {
                    whole = piece.clone();
                } else {
                    whole.append(piece);
                }
            }
            DataObject::Unstructured(whole)
        }
        other => return Err(Error::file_format(format!("unsupported parallel type `P{other}`"))),
    };
    if let Some(fields) = data.field_data_mut() {
        *fields = read_field_data(summary, &payload)?;
    }
    check_declared_arrays(summary, &payload, &data)?;
    tracing::info!(path = %path.display(), pieces = pieces.len(), kind = data.type_name(), "read parallel xml file");
    data.validate()?;
    Ok(data)
}

/// Every array declared in the summary must be present with the declared shape.
fn check_declared_arrays(summary: &super::tree::Element, payload: &PayloadReader<'_>, data: &DataObject) -> Result<()> {
    for (element, attributes) in [("PPointData", data.point_data()), ("PCellData", data.cell_data())] {
        let (Some(declared), Some(attributes)) = (summary.child(element), attributes) else { continue };
        for header in declared.children_named("PDataArray") {
            let expected = array_header(header, payload)?;
            let name = expected.name().unwrap_or_default();
            let found = attributes
                .get(name)
                .ok_or_else(|| Error::file_format(format!("pieces lack the declared array `{name}`")))?;
            if found.number_of_components() != expected.number_of_components() {
                return Err(Error::file_format(format!(
                    "`{name}` has {} components, the summary declares {}",
                    found.number_of_components(),
                    expected.number_of_components()
                )));
            }
        }
    }
    Ok(())
}

fn contains(extent: &Extent, ijk: [i32; 3]) -> bool {
    (0..3).all(|a| extent[2 * a] <= ijk[a] && ijk[a] <= extent[2 * a + 1])
}

/// Cell extent: the upper index drops by one along every axis with more than one point.
fn cell_extent(extent: &Extent) -> Extent {
    let dims = extent_dimensions(extent);
    let mut out = *extent;
    for a in 0..3 {
        if dims[a] > 1 {
            out[2 * a + 1] -= 1;
        }
    }
    out
}

fn structured_id(extent: &Extent, ijk: [i32; 3]) -> usize {
    let dims = extent_dimensions(extent);
    let i = (ijk[0] - extent[0]) as usize;
    let j = (ijk[1] - extent[2]) as usize;
    let k = (ijk[2] - extent[4]) as usize;
    i + dims[0] * (j + dims[1] * k)
}

fn gather(
    whole: &Extent,
    pieces: &[(Extent, &DataSetAttributes)],
    first: &DataSetAttributes,
) -> Result<DataSetAttributes> {
    let mut out = first.new_like();
    for k in whole[4]..=whole[5] {
        for j in whole[2]..=whole[3] {
            for i in whole[0]..=whole[1] {
                let ijk = [i, j, k];
                let (extent, source) = pieces
                    .iter()
                    .find(|(e, _)| contains(e, ijk))
                    .ok_or_else(|| Error::file_format(format!("no piece covers index {ijk:?}")))?;
                out.append_from(source, structured_id(extent, ijk));
            }
        }
    }
    Ok(out)
}

fn assemble_image(whole: &mut ImageData, pieces: &[&ImageData]) -> Result<()> {
    let Some(first) = pieces.first() else { return Ok(()) };
    let point_pieces: Vec<(Extent, &DataSetAttributes)> =
        pieces.iter().map(|p| (p.extent, &p.point_data)).collect();
    whole.point_data = gather(&whole.extent, &point_pieces, &first.point_data)?;
    if whole.number_of_cells() > 0 {
        let cell_pieces: Vec<(Extent, &DataSetAttributes)> =
            pieces.iter().map(|p| (cell_extent(&p.extent), &p.cell_data)).collect();
        whole.cell_data = gather(&cell_extent(&whole.extent), &cell_pieces, &first.cell_data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::SphereSource;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vtk-pipeline-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn image_slabs_reassemble() {
        let mut image = ImageData::with_dimensions([5, 4, 3], [1.0, 2.0, 3.0], [0.5, 0.5, 0.5]);
        image.fill_point_scalars("r", |p| p[0] * 100.0 + p[1] * 10.0 + p[2]).unwrap();
        let cells: Vec<i32> = (0..image.number_of_cells() as i32).collect();
        image.cell_data.set_scalars(DataArray::scalars("cell", cells)).unwrap();
        let data = DataObject::from(image);

        let dir = scratch_dir("pvti");
        let summary = dir.join("slabs.pvti");
        let written = ParallelWriter::new(3).write(&summary, &data).unwrap();
        assert_eq!(written.len(), 3);
        assert!(written[1].ends_with("slabs_1.vti"));
        assert_eq!(read_parallel(&summary).unwrap(), data);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn poly_pieces_append() {
        let sphere = DataObject::from(SphereSource::new([0.0; 3], 1.0).generate().unwrap());
        let dir = scratch_dir("pvtp");
        let summary = dir.join("sphere.pvtp");
        ParallelWriter::new(4).encoding(Encoding::Binary).write(&summary, &sphere).unwrap();
        let back = read_parallel(&summary).unwrap();
        assert_eq!(back.number_of_cells(), sphere.number_of_cells());
        assert_eq!(back.type_name(), "PolyData");
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn tables_are_not_split() {
        let table = DataObject::from(crate::data::Table::new());
        assert!(ParallelWriter::new(2).write("t.pvtt", &table).is_err());
    }
}
