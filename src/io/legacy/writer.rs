use super::{FileType, LegacyVersion};
use crate::array::{DataArray, Scalar, ScalarType};
use crate::data::{AttributeRole, CellArray, DataObject, DataSetAttributes, Extent, FieldData, Points};
use crate::io::encode::{encode_name, pack_bits, to_ascii, to_bytes, ByteOrder};
use crate::math;
use crate::{Error, Result};

use std::path::Path;

/// Writes datasets as legacy `.vtk` files.
#[derive(Debug, Clone)]
pub struct LegacyWriter {
    file_type: FileType,
    version: LegacyVersion,
    header: String,
}

impl Default for LegacyWriter {
    fn default() -> Self {
        Self {
            file_type: FileType::Ascii,
            version: LegacyVersion::V5_1,
            header: "vtk output".to_string(),
        }
    }
}

impl LegacyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn version(mut self, version: LegacyVersion) -> Self {
        self.version = version;
        self
    }

    /// The free-form second line; only its first line is kept.
    pub fn header(mut self, header: &str) -> Self {
        self.header = header.lines().next().unwrap_or_default().chars().take(255).collect();
        self
    }

    pub fn write(&self, path: impl AsRef<Path>, data: &DataObject) -> Result<()> {
        let bytes = self.write_to_bytes(data)?;
        std::fs::write(path.as_ref(), bytes)?;
        tracing::debug!(path = %path.as_ref().display(), kind = data.type_name(), "wrote legacy file");
        Ok(())
    }

    pub fn write_to_bytes(&self, data: &DataObject) -> Result<Vec<u8>> {
        let (major, minor) = self.version.number();
        let mut out = Out {
            buf: Vec::new(),
            file_type: self.file_type,
            version: self.version,
        };
        out.line(format!("# vtk DataFile Version {major}.{minor}"));
        out.line(&self.header);
        out.line(match self.file_type {
            FileType::Ascii => "ASCII",
            FileType::Binary => "BINARY",
        });

        match data {
            DataObject::Image(image) => {
                out.line("DATASET STRUCTURED_POINTS");
                out.field_data("FieldData", &image.field_data)?;
                out.extent(&image.extent);
                out.line(format!("SPACING {}", floats(&image.spacing)));
                out.line(format!("ORIGIN {}", floats(&image.origin)));
                if image.direction != math::IDENTITY3 {
                    let flat: Vec<f64> = image.direction.iter().flatten().copied().collect();
                    out.line(format!("DIRECTION {}", floats(&flat)));
                }
                out.attributes("POINT_DATA", image.number_of_points(), &image.point_data)?;
                out.attributes("CELL_DATA", image.number_of_cells(), &image.cell_data)?;
            }
            DataObject::Rectilinear(grid) => {
                out.line("DATASET RECTILINEAR_GRID");
                out.field_data("FieldData", &grid.field_data)?;
                out.extent(&grid.extent);
                for (axis, coords) in ["X", "Y", "Z"]
                    .iter()
                    .zip([&grid.x_coordinates, &grid.y_coordinates, &grid.z_coordinates])
                {
                    out.line(format!(
                        "{axis}_COORDINATES {} {}",
                        coords.number_of_tuples(),
                        coords.scalar_type().legacy_name()
                    ));
                    out.values(coords);
                }
                out.attributes("POINT_DATA", grid.number_of_points(), &grid.point_data)?;
                out.attributes("CELL_DATA", grid.number_of_cells(), &grid.cell_data)?;
            }
            DataObject::Structured(grid) => {
                out.line("DATASET STRUCTURED_GRID");
                out.field_data("FieldData", &grid.field_data)?;
                out.extent(&grid.extent);
                out.points(&grid.points);
                out.attributes("POINT_DATA", grid.number_of_points(), &grid.point_data)?;
                out.attributes("CELL_DATA", grid.number_of_cells(), &grid.cell_data)?;
            }
            DataObject::PolyData(poly) => {
                out.line("DATASET POLYDATA");
                out.field_data("FieldData", &poly.field_data)?;
                out.points(&poly.points);
                for (keyword, cells) in [
                    ("VERTICES", &poly.verts),
                    ("LINES", &poly.lines),
                    ("POLYGONS", &poly.polys),
                    ("TRIANGLE_STRIPS", &poly.strips),
                ] {
                    if !cells.is_empty() {
                        out.cells(keyword, cells)?;
                    }
                }
                out.attributes("POINT_DATA", poly.number_of_points(), &poly.point_data)?;
                out.attributes("CELL_DATA", poly.number_of_cells(), &poly.cell_data)?;
            }
            DataObject::Unstructured(grid) => {
                out.line("DATASET UNSTRUCTURED_GRID");
                out.field_data("FieldData", &grid.field_data)?;
                out.points(&grid.points);
                if !grid.cells.is_empty() {
                    out.cells("CELLS", &grid.cells)?;
                    let types: Vec<i32> = grid.cell_types.iter().map(|t| i32::from(t.id())).collect();
                    out.line(format!("CELL_TYPES {}", types.len()));
                    out.values(&DataArray::scalars("types", types));
                }
                out.attributes("POINT_DATA", grid.number_of_points(), &grid.point_data)?;
                out.attributes("CELL_DATA", grid.number_of_cells(), &grid.cell_data)?;
            }
            DataObject::Table(table) => {
                out.line("DATASET TABLE");
                out.line(format!("ROW_DATA {}", table.number_of_rows()));
                out.field_data("FieldData", table.columns())?;
            }
            other => {
                return Err(Error::invalid_argument(format!(
                    "a {} cannot be written as a legacy file",
                    other.type_name()
                )))
            }
        }
        Ok(out.buf)
    }
}

fn floats(values: &[f64]) -> String {
    let mut out = String::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        v.push_ascii(&mut out);
    }
    out
}

struct Out {
    buf: Vec<u8>,
    file_type: FileType,
    version: LegacyVersion,
}

impl Out {
    fn line(&mut self, text: impl AsRef<str>) {
        self.buf.extend_from_slice(text.as_ref().as_bytes());
        self.buf.push(b'\n');
    }

    fn values(&mut self, array: &DataArray) {
        match self.file_type {
            FileType::Ascii => {
                if array.number_of_values() > 0 {
                    self.line(to_ascii(array, 9));
                }
            }
            FileType::Binary => {
                if array.scalar_type() == ScalarType::Bit {
                    self.buf.extend(pack_bits(array));
                } else {
                    self.buf.extend(to_bytes(array, ByteOrder::Big));
                }
                self.buf.push(b'\n');
            }
        }
    }

    fn extent(&mut self, extent: &Extent) {
        if extent[0] == 0 && extent[2] == 0 && extent[4] == 0 {
            let dims = crate::data::extent_dimensions(extent);
            self.line(format!("DIMENSIONS {} {} {}", dims[0], dims[1], dims[2]));
        } else {
            let e: Vec<String> = extent.iter().map(i32::to_string).collect();
            self.line(format!("EXTENT {}", e.join(" ")));
        }
    }

    fn points(&mut self, points: &Points) {
        let data = points.data();
        self.line(format!("POINTS {} {}", points.len(), data.scalar_type().legacy_name()));
        self.values(data);
    }

    fn cells(&mut self, keyword: &str, cells: &CellArray) -> Result<()> {
        match self.version {
            LegacyVersion::V4_2 => {
                let legacy = cells.to_legacy();
                let values = legacy
                    .iter()
                    .map(|&v| i32::try_from(v))
                    .collect::<std::result::Result<Vec<i32>, _>>()
                    .map_err(|_| Error::invalid_argument("point ids do not fit the 32 bit cells of version 4.2"))?;
                self.line(format!("{keyword} {} {}", cells.number_of_cells(), values.len()));
                self.values(&DataArray::scalars("cells", values));
            }
            LegacyVersion::V5_1 => {
                let offsets: Vec<i64> = cells.offsets().iter().map(|&v| v as i64).collect();
                let connectivity: Vec<i64> = cells.connectivity().iter().map(|&v| v as i64).collect();
                self.line(format!("{keyword} {} {}", offsets.len(), connectivity.len()));
                self.line("OFFSETS vtktypeint64");
                self.values(&DataArray::scalars("offsets", offsets));
                self.line("CONNECTIVITY vtktypeint64");
                self.values(&DataArray::scalars("connectivity", connectivity));
            }
        }
        Ok(())
    }

    fn field_data(&mut self, name: &str, fields: &FieldData) -> Result<()> {
        let arrays: Vec<&DataArray> = fields.iter().collect();
        self.field_block(name, &arrays)
    }

    fn field_block(&mut self, name: &str, arrays: &[&DataArray]) -> Result<()> {
        if arrays.is_empty() {
            return Ok(());
        }
        self.line(format!("FIELD {name} {}", arrays.len()));
        for array in arrays {
            self.line(format!(
                "{} {} {} {}",
                array_name(array),
                array.number_of_components(),
                array.number_of_tuples(),
                array.scalar_type().legacy_name()
            ));
            self.values(array);
        }
        Ok(())
    }

    /// Arrays with a role use their keyword; runs of plain arrays go into FIELD
    /// blocks so the array order survives a round trip.
    fn attributes(&mut self, section: &str, count: usize, attributes: &DataSetAttributes) -> Result<()> {
        if attributes.is_empty() {
            return Ok(());
        }
        self.line(format!("{section} {count}"));
        let mut plain: Vec<&DataArray> = Vec::new();
        for array in attributes.iter() {
            let role = array.name().and_then(|n| attributes.role_of(n));
            let keyword = role.and_then(|r| self.attribute_header(r, array));
            match keyword {
                Some(header) => {
                    self.field_block("FieldData", &plain)?;
                    plain.clear();
                    self.line(header);
                    if role == Some(AttributeRole::Scalars) {
                        self.line("LOOKUP_TABLE default");
                    }
                    self.values(array);
                }
                None => plain.push(array),
            }
        }
        self.field_block("FieldData", &plain)
    }

    fn attribute_header(&self, role: AttributeRole, array: &DataArray) -> Option<String> {
        let name = array_name(array);
        let ty = array.scalar_type().legacy_name();
        let nc = array.number_of_components();
        let header = match role {
            AttributeRole::Scalars if nc <= 4 => format!("SCALARS {name} {ty} {nc}"),
            AttributeRole::Scalars => return None,
            AttributeRole::Vectors => format!("VECTORS {name} {ty}"),
            AttributeRole::Normals => format!("NORMALS {name} {ty}"),
            AttributeRole::TCoords => format!("TEXTURE_COORDINATES {name} {nc} {ty}"),
            AttributeRole::Tensors if nc == 9 => format!("TENSORS {name} {ty}"),
            AttributeRole::Tensors if self.version == LegacyVersion::V5_1 => format!("TENSORS6 {name} {ty}"),
            AttributeRole::Tensors => return None,
            AttributeRole::GlobalIds => format!("GLOBAL_IDS {name} {ty}"),
        };
        Some(header)
    }
}

fn array_name(array: &DataArray) -> String {
    match array.name() {
        Some(name) if !name.is_empty() => encode_name(name),
        _ => "unnamed".to_string(),
    }
}
