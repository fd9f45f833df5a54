use super::arrays::PayloadReader;
use super::tree::{parse_document, Element};
use super::writer::role_attribute;
use crate::array::DataArray;
use crate::data::{
    extent_dimensions, AttributeRole, CellArray, CellType, DataObject, DataSetAttributes, Extent, FieldData,
    ImageData, Points, PolyData, RectilinearGrid, StructuredGrid, Table, UnstructuredGrid,
};
use crate::io::encode::ids;
use crate::math::Mat3;
use crate::{Error, Result};

use std::path::Path;

/// Reads serial VTK XML files.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlReader;

impl XmlReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Result<DataObject> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let data = self.read_bytes(&bytes)?;
        tracing::debug!(path = %path.display(), kind = data.type_name(), "read xml file");
        Ok(data)
    }

    pub fn read_bytes(&self, bytes: &[u8]) -> Result<DataObject> {
        let doc = parse_document(bytes)?;
        let type_name = doc.root.required("type")?;
        if type_name == "vtkMultiBlockDataSet" || is_parallel_type(type_name) {
            return Err(Error::invalid_argument(format!(
                "`{type_name}` files reference other files; read them from a path"
            )));
        }
        let payload = PayloadReader::new(&doc.root, doc.appended)?;
        let data = read_dataset(&doc.root, type_name, &payload)?;
        data.validate()?;
        Ok(data)
    }
}

/// Serial dataset element names the reader understands.
const SERIAL_TYPES: [&str; 6] =
    ["ImageData", "RectilinearGrid", "StructuredGrid", "PolyData", "UnstructuredGrid", "Table"];

/// `PPolyData` and friends: summary files that point at serial pieces.
fn is_parallel_type(type_name: &str) -> bool {
    type_name
        .strip_prefix('P')
        .map_or(false, |serial| SERIAL_TYPES.contains(&serial))
}

/// Read the dataset element named `type_name` below `root`.
pub(crate) fn read_dataset(root: &Element, type_name: &str, payload: &PayloadReader<'_>) -> Result<DataObject> {
    let dataset = root.expect_child(type_name)?;
    let data = match type_name {
        "ImageData" => {
            let piece = dataset.expect_child("Piece")?;
            let extent = piece_extent(dataset, piece)?;
            let direction = dataset
                .parse_list::<f64, 9>("Direction", "nine direction cosines")?
                .map(|d| -> Mat3 { [[d[0], d[1], d[2]], [d[3], d[4], d[5]], [d[6], d[7], d[8]]] });
            let mut image = ImageData::new(
                extent,
                dataset.parse_list("Origin", "three coordinates")?.unwrap_or([0.0; 3]),
                dataset.parse_list("Spacing", "three spacings")?.unwrap_or([1.0; 3]),
            );
            if let Some(direction) = direction {
                image.direction = direction;
            }
            let (points, cells) = (image.number_of_points(), image.number_of_cells());
            read_attributes(piece.child("PointData"), points, payload, &mut image.point_data)?;
            read_attributes(piece.child("CellData"), cells, payload, &mut image.cell_data)?;
            image.field_data = read_field_data(dataset, payload)?;
            DataObject::Image(image)
        }
        "RectilinearGrid" => {
            let piece = dataset.expect_child("Piece")?;
            let extent = piece_extent(dataset, piece)?;
            let dims = extent_dimensions(&extent);
            let coordinates = piece.expect_child("Coordinates")?;
            let arrays: Vec<&Element> = coordinates.children_named("DataArray").collect();
            if arrays.len() != 3 {
                return Err(Error::file_format(format!("{} coordinate arrays instead of 3", arrays.len())));
            }
            let mut grid = RectilinearGrid::with_extent(
                extent,
                payload.read(arrays[0], Some(dims[0]), "x_coordinates")?,
                payload.read(arrays[1], Some(dims[1]), "y_coordinates")?,
                payload.read(arrays[2], Some(dims[2]), "z_coordinates")?,
            )?;
            let (points, cells) = (grid.number_of_points(), grid.number_of_cells());
            read_attributes(piece.child("PointData"), points, payload, &mut grid.point_data)?;
            read_attributes(piece.child("CellData"), cells, payload, &mut grid.cell_data)?;
            grid.field_data = read_field_data(dataset, payload)?;
            DataObject::Rectilinear(grid)
        }
        "StructuredGrid" => {
            let piece = dataset.expect_child("Piece")?;
            let extent = piece_extent(dataset, piece)?;
            let n: usize = extent_dimensions(&extent).iter().product();
            let mut grid = StructuredGrid::new(extent, read_points(piece, n, payload)?)?;
            let cells = grid.number_of_cells();
            read_attributes(piece.child("PointData"), n, payload, &mut grid.point_data)?;
            read_attributes(piece.child("CellData"), cells, payload, &mut grid.cell_data)?;
            grid.field_data = read_field_data(dataset, payload)?;
            DataObject::Structured(grid)
        }
        "PolyData" => {
            let mut poly = PolyData::new();
            for (i, piece) in dataset.children_named("Piece").enumerate() {
                let part = read_poly_piece(piece, payload)?;
                if i == 0 {
                    poly = part;
                } else {
                    poly.append(&part);
                }
            }
            poly.field_data = read_field_data(dataset, payload)?;
            DataObject::PolyData(poly)
        }
        "UnstructuredGrid" => {
            let mut grid = UnstructuredGrid::new();
            for (i, piece) in dataset.children_named("Piece").enumerate() {
                let part = read_unstructured_piece(piece, payload)?;
                if i == 0 {
                    grid = part;
                } else {
                    grid.append(&part);
                }
            }
            grid.field_data = read_field_data(dataset, payload)?;
            DataObject::Unstructured(grid)
        }
        "Table" => {
            let mut table = Table::new();
            for piece in dataset.children_named("Piece") {
                let rows = piece.parse::<usize>("NumberOfRows", "a row count")?;
                if let Some(row_data) = piece.child("RowData") {
                    for (i, element) in row_data.children_named("DataArray").enumerate() {
                        let column = payload.read(element, rows, &format!("column {i}"))?;
                        table.add_column(column)?;
                    }
                }
            }
            DataObject::Table(table)
        }
        other => return Err(Error::file_format(format!("unsupported xml dataset type `{other}`"))),
    };
    Ok(data)
}

pub(crate) fn piece_extent(dataset: &Element, piece: &Element) -> Result<Extent> {
    let extent = piece
        .parse_list::<i32, 6>("Extent", "six extent indices")?
        .or(dataset.parse_list::<i32, 6>("WholeExtent", "six extent indices")?)
        .ok_or_else(|| Error::file_format(format!("{} piece without an extent", dataset.name)))?;
    Ok(extent)
}

fn read_points(piece: &Element, n: usize, payload: &PayloadReader<'_>) -> Result<Points> {
    match piece.child("Points").and_then(|p| p.child("DataArray")) {
        Some(element) => Points::from_array(payload.read(element, Some(n), "Points")?),
        None if n == 0 => Ok(Points::new()),
        None => Err(Error::file_format(format!("{n} points announced but no Points element"))),
    }
}

/// Read a `connectivity`/`offsets` pair; `offsets` holds cell ends.
fn read_cells(element: Option<&Element>, count: usize, payload: &PayloadReader<'_>) -> Result<CellArray> {
    let Some(element) = element else {
        return if count == 0 {
            Ok(CellArray::new())
        } else {
            Err(Error::file_format(format!("{count} cells announced without connectivity")))
        };
    };
    let mut connectivity = None;
    let mut offsets = None;
    for child in element.children_named("DataArray") {
        match child.attr("Name") {
            Some("connectivity") => connectivity = Some(payload.read(child, None, "connectivity")?),
            Some("offsets") => offsets = Some(payload.read(child, Some(count), "offsets")?),
            _ => {}
        }
    }
    let missing = |what: &str| Error::file_format(format!("{} without {what}", element.name));
    let connectivity = ids(&connectivity.ok_or_else(|| missing("connectivity"))?)?;
    let ends = ids(&offsets.ok_or_else(|| missing("offsets"))?)?;
    let offsets = std::iter::once(0).chain(ends).collect();
    CellArray::from_offsets(offsets, connectivity)
}

fn read_poly_piece(piece: &Element, payload: &PayloadReader<'_>) -> Result<PolyData> {
    let count = |key: &str| -> Result<usize> { Ok(piece.parse::<usize>(key, "a cell count")?.unwrap_or(0)) };
    let n = count("NumberOfPoints")?;
    let mut poly = PolyData::with_points(read_points(piece, n, payload)?);
    poly.verts = read_cells(piece.child("Verts"), count("NumberOfVerts")?, payload)?;
    poly.lines = read_cells(piece.child("Lines"), count("NumberOfLines")?, payload)?;
    poly.strips = read_cells(piece.child("Strips"), count("NumberOfStrips")?, payload)?;
    poly.polys = read_cells(piece.child("Polys"), count("NumberOfPolys")?, payload)?;
    let cells = poly.number_of_cells();
    read_attributes(piece.child("PointData"), n, payload, &mut poly.point_data)?;
    read_attributes(piece.child("CellData"), cells, payload, &mut poly.cell_data)?;
    Ok(poly)
}

fn read_unstructured_piece(piece: &Element, payload: &PayloadReader<'_>) -> Result<UnstructuredGrid> {
    let n = piece.parse_required::<usize>("NumberOfPoints", "a point count")?;
    let cells = piece.parse_required::<usize>("NumberOfCells", "a cell count")?;
    let mut grid = UnstructuredGrid::with_points(read_points(piece, n, payload)?);
    let cells_element = piece.child("Cells");
    grid.cells = read_cells(cells_element, cells, payload)?;
    if let Some(element) = cells_element {
        let types = element
            .children_named("DataArray")
            .find(|c| c.attr("Name") == Some("types"))
            .ok_or_else(|| Error::file_format("Cells without types"))?;
        let types = payload.read(types, Some(cells), "types")?;
        grid.cell_types = (0..types.number_of_values())
            .map(|i| {
                let id = types.integer_value(i).unwrap_or(-1);
                i64::try_from(id)
                    .map_err(|_| Error::file_format(format!("unknown cell type {id}")))
                    .and_then(CellType::try_from)
            })
            .collect::<Result<_>>()?;
    }
    read_attributes(piece.child("PointData"), n, payload, &mut grid.point_data)?;
    read_attributes(piece.child("CellData"), cells, payload, &mut grid.cell_data)?;
    Ok(grid)
}

/// Fill `out` from a `PointData` or `CellData` element and restore the roles it names.
pub(crate) fn read_attributes(
    element: Option<&Element>,
    tuples: usize,
    payload: &PayloadReader<'_>,
    out: &mut DataSetAttributes,
) -> Result<()> {
    let Some(element) = element else { return Ok(()) };
    for (i, child) in element.children_named("DataArray").enumerate() {
        out.add_array(payload.read(child, Some(tuples), &format!("array {i}"))?);
    }
    for role in AttributeRole::ALL {
        if let Some(name) = element.attr(role_attribute(role)) {
            if let Err(err) = out.set_active(role, name) {
                tracing::warn!(%role, name, %err, "ignoring attribute designation");
            }
        }
    }
    Ok(())
}

pub(crate) fn read_field_data(dataset: &Element, payload: &PayloadReader<'_>) -> Result<FieldData> {
    let mut fields = FieldData::new();
    if let Some(element) = dataset.child("FieldData") {
        for (i, child) in element.children_named("DataArray").enumerate() {
            fields.add_array(payload.read(child, None, &format!("field {i}"))?);
        }
    }
    Ok(fields)
}

/// Array element of a summary file: type and shape only.
pub(crate) fn array_header(element: &Element, payload: &PayloadReader<'_>) -> Result<DataArray> {
    let mut empty = element.clone();
    empty.text.clear();
    empty
        .attributes
        .retain(|(k, _)| !matches!(k.as_str(), "NumberOfTuples" | "offset" | "format"));
    empty.attributes.push(("format".into(), "ascii".into()));
    payload.read(&empty, Some(0), "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::xml::{Encoding, XmlWriter};

    const IMAGE: &str = r#"<?xml version="1.0"?>
<VTKFile type="ImageData" version="0.1" byte_order="LittleEndian">
  <ImageData WholeExtent="0 1 0 1 0 0" Origin="0 0 0" Spacing="0.5 0.5 1">
    <Piece Extent="0 1 0 1 0 0">
      <PointData Scalars="height">
        <DataArray type="Float64" Name="height" format="ascii">0 1 2 3</DataArray>
      </PointData>
      <CellData/>
    </Piece>
  </ImageData>
</VTKFile>"#;

    #[test]
    fn reads_hand_written_image() {
        let data = XmlReader::new().read_bytes(IMAGE.as_bytes()).unwrap();
        let image = data.as_image().unwrap();
        assert_eq!(image.dimensions(), [2, 2, 1]);
        assert_eq!(image.spacing, [0.5, 0.5, 1.0]);
        assert_eq!(image.point_data.active_name(AttributeRole::Scalars), Some("height"));
        assert_eq!(image.point_data.scalars().unwrap().values_as_f64(), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn short_arrays_are_rejected() {
        let broken = IMAGE.replace("0 1 2 3", "0 1 2");
        assert!(XmlReader::new().read_bytes(broken.as_bytes()).is_err());
    }

    #[test]
    fn unstructured_round_trip_in_every_encoding() {
        let mut grid = UnstructuredGrid::with_points(Points::from_vec(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
        ]));
        grid.insert_next_cell(CellType::Tetra, &[0, 1, 2, 3]).unwrap();
        grid.insert_next_cell(CellType::Triangle, &[1, 2, 4]).unwrap();
        grid.cell_data
            .set_scalars(DataArray::scalars("material", vec![7i32, 9]))
            .unwrap();
        grid.field_data.add_array(DataArray::scalars("time", vec![0.25f64]));
        let data = DataObject::from(grid);
        for encoding in [Encoding::Ascii, Encoding::Binary, Encoding::Appended] {
            let bytes = XmlWriter::new(encoding).write_to_bytes(&data).unwrap();
            assert_eq!(XmlReader::new().read_bytes(&bytes).unwrap(), data, "{encoding:?}");
        }
    }

    #[test]
    fn pieces_are_appended() {
        let text = r#"<VTKFile type="PolyData">
  <PolyData>
    <Piece NumberOfPoints="1" NumberOfVerts="1">
      <Points><DataArray type="Float32" NumberOfComponents="3" format="ascii">0 0 0</DataArray></Points>
      <Verts>
        <DataArray type="Int32" Name="connectivity" format="ascii">0</DataArray>
        <DataArray type="Int32" Name="offsets" format="ascii">1</DataArray>
      </Verts>
    </Piece>
    <Piece NumberOfPoints="1" NumberOfVerts="1">
      <Points><DataArray type="Float32" NumberOfComponents="3" format="ascii">1 1 1</DataArray></Points>
      <Verts>
        <DataArray type="Int32" Name="connectivity" format="ascii">0</DataArray>
        <DataArray type="Int32" Name="offsets" format="ascii">1</DataArray>
      </Verts>
    </Piece>
  </PolyData>
</VTKFile>"#;
        let data = XmlReader::new().read_bytes(text.as_bytes()).unwrap();
        let poly = data.as_poly_data().unwrap();
        assert_eq!(poly.number_of_points(), 2);
        assert_eq!(poly.verts.cell(1), &[1]);
    }

    #[test]
    fn only_summary_types_count_as_parallel() {
        assert!(is_parallel_type("PPolyData"));
        assert!(is_parallel_type("PImageData"));
        assert!(is_parallel_type("PUnstructuredGrid"));
        assert!(!is_parallel_type("PolyData"));
        assert!(!is_parallel_type("Piece"));
    }

    #[test]
    fn serial_poly_data_reads_back() {
        let mut poly = PolyData::with_points(Points::from_vec(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ]));
        poly.verts.insert_next_cell(&[0]);
        poly.lines.insert_next_cell(&[0, 1, 2]);
        poly.polys.insert_next_cell(&[0, 1, 2, 3]);
        poly.strips.insert_next_cell(&[0, 1, 3, 2]);
        let data = DataObject::from(poly);
        for encoding in [Encoding::Ascii, Encoding::Binary, Encoding::Appended] {
            let bytes = XmlWriter::new(encoding).write_to_bytes(&data).unwrap();
            assert_eq!(XmlReader::new().read_bytes(&bytes).unwrap(), data, "{encoding:?}");
        }
    }
}
