use super::arrays::encode;
use super::{file_type, Encoding};
use crate::array::{DataArray, Scalar};
use crate::data::{AttributeRole, CellArray, DataObject, DataSetAttributes, Extent, FieldData, Points};
use crate::math;
use crate::{Error, Result};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use std::io::Write;
use std::path::Path;

/// Writes serial VTK XML files.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlWriter {
    encoding: Encoding,
}

impl XmlWriter {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Write `data` to `path`. The extension is not checked against the dataset.
    pub fn write(&self, path: impl AsRef<Path>, data: &DataObject) -> Result<()> {
        let bytes = self.write_to_bytes(data)?;
        std::fs::write(path.as_ref(), bytes)?;
        tracing::debug!(path = %path.as_ref().display(), kind = data.type_name(), encoding = self.encoding.as_str(), "wrote xml file");
        Ok(())
    }

    pub fn write_to_bytes(&self, data: &DataObject) -> Result<Vec<u8>> {
        let (type_name, _) = file_type(data)
            .filter(|_| !matches!(data, DataObject::MultiBlock(_)))
            .ok_or_else(|| Error::invalid_argument(format!("a {} cannot be written as a serial xml file", data.type_name())))?;
        let mut doc = DocWriter::new(self.encoding);
        doc.open_file(type_name)?;
        match data {
            DataObject::Image(image) => {
                let mut attrs = vec![
                    ("WholeExtent", extent_string(&image.extent)),
                    ("Origin", floats(&image.origin)),
                    ("Spacing", floats(&image.spacing)),
                ];
                if image.direction != math::IDENTITY3 {
                    let flat: Vec<f64> = image.direction.iter().flatten().copied().collect();
                    attrs.push(("Direction", floats(&flat)));
                }
                doc.start(type_name, &attrs)?;
                doc.field_data(&image.field_data)?;
                doc.start("Piece", &[("Extent", extent_string(&image.extent))])?;
                doc.attributes("PointData", &image.point_data)?;
                doc.attributes("CellData", &image.cell_data)?;
                doc.end("Piece")?;
            }
            DataObject::Rectilinear(grid) => {
                doc.start(type_name, &[("WholeExtent", extent_string(&grid.extent))])?;
                doc.field_data(&grid.field_data)?;
                doc.start("Piece", &[("Extent", extent_string(&grid.extent))])?;
                doc.attributes("PointData", &grid.point_data)?;
                doc.attributes("CellData", &grid.cell_data)?;
                doc.start("Coordinates", &[])?;
                for coords in [&grid.x_coordinates, &grid.y_coordinates, &grid.z_coordinates] {
                    doc.array(coords)?;
                }
                doc.end("Coordinates")?;
                doc.end("Piece")?;
            }
            DataObject::Structured(grid) => {
                doc.start(type_name, &[("WholeExtent", extent_string(&grid.extent))])?;
                doc.field_data(&grid.field_data)?;
                doc.start("Piece", &[("Extent", extent_string(&grid.extent))])?;
                doc.attributes("PointData", &grid.point_data)?;
                doc.attributes("CellData", &grid.cell_data)?;
                doc.points(&grid.points)?;
                doc.end("Piece")?;
            }
            DataObject::PolyData(poly) => {
                doc.start(type_name, &[])?;
                doc.field_data(&poly.field_data)?;
                doc.start(
                    "Piece",
                    &[
                        ("NumberOfPoints", poly.number_of_points().to_string()),
                        ("NumberOfVerts", poly.verts.number_of_cells().to_string()),
                        ("NumberOfLines", poly.lines.number_of_cells().to_string()),
                        ("NumberOfStrips", poly.strips.number_of_cells().to_string()),
                        ("NumberOfPolys", poly.polys.number_of_cells().to_string()),
                    ],
                )?;
                doc.attributes("PointData", &poly.point_data)?;
                doc.attributes("CellData", &poly.cell_data)?;
                doc.points(&poly.points)?;
                for (name, cells) in [
                    ("Verts", &poly.verts),
                    ("Lines", &poly.lines),
                    ("Strips", &poly.strips),
                    ("Polys", &poly.polys),
                ] {
                    doc.start(name, &[])?;
                    doc.cells(cells)?;
                    doc.end(name)?;
                }
                doc.end("Piece")?;
            }
            DataObject::Unstructured(grid) => {
                doc.start(type_name, &[])?;
                doc.field_data(&grid.field_data)?;
                doc.start(
                    "Piece",
                    &[
                        ("NumberOfPoints", grid.number_of_points().to_string()),
                        ("NumberOfCells", grid.number_of_cells().to_string()),
                    ],
                )?;
                doc.attributes("PointData", &grid.point_data)?;
                doc.attributes("CellData", &grid.cell_data)?;
                doc.points(&grid.points)?;
                doc.start("Cells", &[])?;
                doc.cells(&grid.cells)?;
                let types: Vec<u8> = grid.cell_types.iter().map(|t| t.id()).collect();
                doc.array(&DataArray::scalars("types", types))?;
                doc.end("Cells")?;
                doc.end("Piece")?;
            }
            DataObject::Table(table) => {
                doc.start(type_name, &[])?;
                doc.start(
                    "Piece",
                    &[
                        ("NumberOfCols", table.number_of_columns().to_string()),
                        ("NumberOfRows", table.number_of_rows().to_string()),
                    ],
                )?;
                doc.start("RowData", &[])?;
                for column in table.columns().iter() {
                    doc.array(column)?;
                }
                doc.end("RowData")?;
                doc.end("Piece")?;
            }
            other => {
                return Err(Error::invalid_argument(format!(
                    "{} is not a serial xml dataset",
                    other.type_name()
                )))
            }
        }
        doc.end(type_name)?;
        doc.finish()
    }
}

pub(crate) fn extent_string(extent: &Extent) -> String {
    extent.iter().map(i32::to_string).collect::<Vec<_>>().join(" ")
}

pub(crate) fn floats(values: &[f64]) -> String {
    let mut out = String::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        v.push_ascii(&mut out);
    }
    out
}

/// Event writer plus the appended block collected on the way.
pub(crate) struct DocWriter {
    writer: Writer<Vec<u8>>,
    encoding: Encoding,
    appended: Vec<u8>,
}

impl DocWriter {
    pub(crate) fn new(encoding: Encoding) -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
            encoding,
            appended: Vec::new(),
        }
    }

    pub(crate) fn open_file(&mut self, type_name: &str) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;
        self.start(
            "VTKFile",
            &[
                ("type", type_name.to_string()),
                ("version", "1.0".to_string()),
                ("byte_order", "LittleEndian".to_string()),
                ("header_type", "UInt64".to_string()),
            ],
        )
    }

    pub(crate) fn start(&mut self, name: &str, attributes: &[(&str, String)]) -> Result<()> {
        let mut element = BytesStart::new(name);
        for (key, value) in attributes {
            element.push_attribute((*key, value.as_str()));
        }
        self.writer.write_event(Event::Start(element))?;
        Ok(())
    }

    pub(crate) fn empty(&mut self, name: &str, attributes: &[(&str, String)]) -> Result<()> {
        let mut element = BytesStart::new(name);
        for (key, value) in attributes {
            element.push_attribute((*key, value.as_str()));
        }
        self.writer.write_event(Event::Empty(element))?;
        Ok(())
    }

    pub(crate) fn end(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    pub(crate) fn array(&mut self, array: &DataArray) -> Result<()> {
        let encoded = encode(array, self.encoding, &mut self.appended);
        match encoded.text {
            Some(text) if !text.is_empty() => {
                self.start("DataArray", &encoded.attributes)?;
                self.writer.write_event(Event::Text(BytesText::new(&text)))?;
                self.end("DataArray")
            }
            _ => self.empty("DataArray", &encoded.attributes),
        }
    }

    pub(crate) fn points(&mut self, points: &Points) -> Result<()> {
        self.start("Points", &[])?;
        self.array(points.data())?;
        self.end("Points")
    }

    /// `connectivity` and end `offsets`, both 64 bit.
    pub(crate) fn cells(&mut self, cells: &CellArray) -> Result<()> {
        let connectivity: Vec<i64> = cells.connectivity().iter().map(|&v| v as i64).collect();
        let offsets: Vec<i64> = cells.offsets().iter().skip(1).map(|&v| v as i64).collect();
        self.array(&DataArray::scalars("connectivity", connectivity))?;
        self.array(&DataArray::scalars("offsets", offsets))
    }

    pub(crate) fn field_data(&mut self, fields: &FieldData) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        self.start("FieldData", &[])?;
        for array in fields.iter() {
            self.array(array)?;
        }
        self.end("FieldData")
    }

    pub(crate) fn attributes(&mut self, element: &str, attributes: &DataSetAttributes) -> Result<()> {
        let roles: Vec<(&str, String)> = AttributeRole::ALL
            .iter()
            .filter_map(|role| {
                attributes
                    .active_name(*role)
                    .map(|name| (role_attribute(*role), name.to_string()))
            })
            .collect();
        self.start(element, &roles)?;
        for array in attributes.iter() {
            self.array(array)?;
        }
        self.end(element)
    }

    /// Close the document, appending the raw block if one was collected.
    pub(crate) fn finish(mut self) -> Result<Vec<u8>> {
        if self.encoding == Encoding::Appended && !self.appended.is_empty() {
            self.start("AppendedData", &[("encoding", "raw".to_string())])?;
            let inner = self.writer.inner();
            inner.write_all(b"\n   _")?;
            inner.write_all(&self.appended)?;
            self.end("AppendedData")?;
        }
        self.end("VTKFile")?;
        let mut bytes = self.writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }
}

pub(crate) fn role_attribute(role: AttributeRole) -> &'static str {
    match role {
        AttributeRole::Scalars => "Scalars",
        AttributeRole::Vectors => "Vectors",
        AttributeRole::Normals => "Normals",
        AttributeRole::TCoords => "TCoords",
        AttributeRole::Tensors => "Tensors",
        AttributeRole::GlobalIds => "GlobalIds",
    }
}
