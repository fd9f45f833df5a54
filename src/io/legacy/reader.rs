use super::FileType;
use crate::array::{DataArray, ScalarType};
use crate::data::{
    AttributeRole, CellArray, CellType, DataObject, DataSetAttributes, Extent, FieldData, ImageData, Points,
    PolyData, RectilinearGrid, StructuredGrid, Table, UnstructuredGrid,
};
use crate::io::encode::{decode_name, from_bytes, from_tokens, ids, unpack_bits, ByteOrder};
use crate::math::{self, Mat3, Vec3};
use crate::{Error, Result};

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Contents of a legacy file.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyFile {
    pub version: (u32, u32),
    pub header: String,
    pub file_type: FileType,
    pub data: DataObject,
}

/// Reads legacy `.vtk` files of any version up to 5.1.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyReader;

impl LegacyReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Result<LegacyFile> {
        let bytes = std::fs::read(path.as_ref())?;
        self.read_bytes(&bytes)
    }

    pub fn read_bytes(&self, bytes: &[u8]) -> Result<LegacyFile> {
        let mut c = Cursor {
            bytes,
            pos: 0,
            file_type: FileType::Ascii,
        };
        let first = c.line()?;
        let version = first
            .trim()
            .strip_prefix("# vtk DataFile Version")
            .ok_or_else(|| Error::file_format("not a legacy vtk file"))?;
        let version = parse_version(version.trim())?;
        let header = c.line()?.trim_end().to_string();
        c.file_type = match c.line()?.trim().to_ascii_uppercase().as_str() {
            "ASCII" => FileType::Ascii,
            "BINARY" => FileType::Binary,
            other => return Err(Error::file_format(format!("unknown file type `{other}`"))),
        };
        tracing::debug!(major = version.0, minor = version.1, file_type = ?c.file_type, "reading legacy file");

        let keyword = c.expect("DATASET")?;
        if !keyword.eq_ignore_ascii_case("DATASET") {
            return Err(Error::file_format(format!("expected DATASET, found `{keyword}`")));
        }
        let kind = c.expect("dataset type")?.to_ascii_uppercase();
        let mut parts = Parts::default();
        while let Some(keyword) = c.token()? {
            parts.section(&mut c, &keyword.to_ascii_uppercase())?;
        }
        let data = parts.assemble(&kind)?;
        Ok(LegacyFile {
            version,
            header,
            file_type: c.file_type,
            data,
        })
    }
}

fn parse_version(text: &str) -> Result<(u32, u32)> {
    let mut parts = text.split('.');
    let mut next = || parts.next().and_then(|p| p.trim().parse::<u32>().ok());
    match (next(), next()) {
        (Some(major), Some(minor)) => Ok((major, minor)),
        _ => Err(Error::file_format(format!("bad version `{text}`"))),
    }
}

/// Byte cursor over the file: whitespace separated tokens, whole lines and raw
/// binary blocks.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    file_type: FileType,
}

impl<'a> Cursor<'a> {
    fn line(&mut self) -> Result<&'a str> {
        if self.pos >= self.bytes.len() {
            return Err(Error::file_format("unexpected end of file"));
        }
        let rest = &self.bytes[self.pos..];
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        self.pos += (end + 1).min(rest.len());
        let line = std::str::from_utf8(&rest[..end]).map_err(|_| Error::file_format("header is not text"))?;
        Ok(line.trim_end_matches('\r'))
    }

    fn token(&mut self) -> Result<Option<&'a str>> {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Ok(None);
        }
        let start = self.pos;
        while self.pos < self.bytes.len() && !self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .map(Some)
            .map_err(|_| Error::file_format(format!("binary data where a keyword was expected at byte {start}")))
    }

    fn peek(&mut self) -> Result<Option<&'a str>> {
        let pos = self.pos;
        let token = self.token();
        self.pos = pos;
        token
    }

    fn expect(&mut self, what: &str) -> Result<&'a str> {
        self.token()?
            .ok_or_else(|| Error::file_format(format!("unexpected end of file, expected {what}")))
    }

    fn number<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.expect(what)?;
        token
            .parse()
            .map_err(|_| Error::file_format(format!("expected {what}, found `{token}`")))
    }

    fn numbers<const N: usize>(&mut self, what: &str) -> Result<[f64; N]> {
        let mut out = [0.0; N];
        for v in out.iter_mut() {
            *v = self.number(what)?;
        }
        Ok(out)
    }

    fn scalar_type(&mut self) -> Result<ScalarType> {
        let token = self.expect("data type")?;
        ScalarType::from_legacy_name(token).ok_or_else(|| Error::file_format(format!("unknown data type `{token}`")))
    }

    fn skip_line(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        self.pos = (self.pos + 1).min(self.bytes.len());
    }

    fn raw(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.bytes.len() {
            return Err(Error::file_format(format!("expected {n} bytes of binary data")));
        }
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// The payload of an array whose header has just been read.
    fn array(&mut self, name: &str, ty: ScalarType, components: usize, tuples: usize) -> Result<DataArray> {
        let count = components * tuples;
        let array = match self.file_type {
            FileType::Ascii => {
                let mut tokens = Vec::with_capacity(count);
                for _ in 0..count {
                    tokens.push(self.expect(name)?);
                }
                from_tokens(name, ty, components, count, tokens)?
            }
            FileType::Binary => {
                self.skip_line();
                if ty == ScalarType::Bit {
                    let bytes = self.raw((count + 7) / 8)?;
                    unpack_bits(name, components, count, bytes)?
                } else {
                    let bytes = self.raw(count * ty.size())?;
                    from_bytes(name, ty, components, bytes, ByteOrder::Big)?
                }
            }
        };
        self.skip_metadata()?;
        Ok(array)
    }

    /// Unsigned char values stored as floats in `[0, 1]` by ascii files.
    fn color_array(&mut self, name: &str, components: usize, tuples: usize) -> Result<DataArray> {
        match self.file_type {
            FileType::Ascii => {
                let floats = self.array(name, ScalarType::Float, components, tuples)?;
                let bytes: Vec<u8> = floats
                    .values_as_f64()
                    .into_iter()
                    .map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
                    .collect();
                DataArray::from_vec(name, components, bytes)
            }
            FileType::Binary => self.array(name, ScalarType::UnsignedChar, components, tuples),
        }
    }

    /// `METADATA` blocks run until the next blank line.
    fn skip_metadata(&mut self) -> Result<()> {
        if !matches!(self.peek()?, Some(t) if t.eq_ignore_ascii_case("METADATA")) {
            return Ok(());
        }
        self.token()?;
        self.skip_line();
        while self.pos < self.bytes.len() {
            if self.line()?.trim().is_empty() {
                break;
            }
        }
        Ok(())
    }

    fn field_arrays(&mut self) -> Result<Vec<DataArray>> {
        let _name = self.expect("field name")?;
        let count: usize = self.number("number of arrays")?;
        let mut arrays = Vec::with_capacity(count);
        for _ in 0..count {
            let name = self.expect("array name")?;
            if name == "NULL_ARRAY" {
                continue;
            }
            let name = decode_name(name);
            let components: usize = self.number("number of components")?;
            let tuples: usize = self.number("number of tuples")?;
            let ty = self.scalar_type()?;
            arrays.push(self.array(&name, ty, components, tuples)?);
        }
        Ok(arrays)
    }

    fn cells(&mut self) -> Result<CellArray> {
        let first: usize = self.number("cell count")?;
        let second: usize = self.number("cell list size")?;
        if matches!(self.peek()?, Some(t) if t.eq_ignore_ascii_case("OFFSETS")) {
            self.token()?;
            let ty = self.scalar_type()?;
            let offsets = self.array("offsets", ty, 1, first)?;
            let keyword = self.expect("CONNECTIVITY")?;
            if !keyword.eq_ignore_ascii_case("CONNECTIVITY") {
                return Err(Error::file_format(format!("expected CONNECTIVITY, found `{keyword}`")));
            }
            let ty = self.scalar_type()?;
            let connectivity = self.array("connectivity", ty, 1, second)?;
            CellArray::from_offsets(ids(&offsets)?, ids(&connectivity)?)
        } else {
            let values = self.array("cells", ScalarType::Int, 1, second)?;
            let cells = CellArray::from_legacy(&ids(&values)?)?;
            if cells.number_of_cells() != first {
                return Err(Error::file_format(format!(
                    "cell list holds {} cells, header says {first}",
                    cells.number_of_cells()
                )));
            }
            Ok(cells)
        }
    }

    /// Attribute declarations up to the next data section.
    fn attributes(&mut self, tuples: usize, attributes: &mut DataSetAttributes) -> Result<()> {
        while let Some(peeked) = self.peek()? {
            let keyword = peeked.to_ascii_uppercase();
            if matches!(keyword.as_str(), "POINT_DATA" | "CELL_DATA" | "ROW_DATA") {
                break;
            }
            self.token()?;
            match keyword.as_str() {
                "SCALARS" => {
                    let name = decode_name(self.expect("scalars name")?);
                    let ty = self.scalar_type()?;
                    let components = match self.peek()? {
                        Some(t) => t.parse::<usize>().ok(),
                        None => None,
                    };
                    if components.is_some() {
                        self.token()?;
                    }
                    let table = self.expect("LOOKUP_TABLE")?;
                    if !table.eq_ignore_ascii_case("LOOKUP_TABLE") {
                        return Err(Error::file_format(format!("expected LOOKUP_TABLE, found `{table}`")));
                    }
                    self.expect("lookup table name")?;
                    let array = self.array(&name, ty, components.unwrap_or(1), tuples)?;
                    attributes.set_attribute(AttributeRole::Scalars, array)?;
                }
                "COLOR_SCALARS" => {
                    let name = decode_name(self.expect("color scalars name")?);
                    let components: usize = self.number("number of components")?;
                    let array = self.color_array(&name, components, tuples)?;
                    attributes.set_attribute(AttributeRole::Scalars, array)?;
                }
                "LOOKUP_TABLE" => {
                    let name = decode_name(self.expect("lookup table name")?);
                    let size: usize = self.number("lookup table size")?;
                    let table = self.color_array(&name, 4, size)?;
                    attributes.add_array(table);
                }
                "VECTORS" | "NORMALS" | "TENSORS" | "TENSORS6" | "GLOBAL_IDS" | "PEDIGREE_IDS" => {
                    let name = decode_name(self.expect("attribute name")?);
                    let ty = self.scalar_type()?;
                    let (role, components) = match keyword.as_str() {
                        "VECTORS" => (Some(AttributeRole::Vectors), 3),
                        "NORMALS" => (Some(AttributeRole::Normals), 3),
                        "TENSORS" => (Some(AttributeRole::Tensors), 9),
                        "TENSORS6" => (Some(AttributeRole::Tensors), 6),
                        "GLOBAL_IDS" => (Some(AttributeRole::GlobalIds), 1),
                        _ => (None, 1),
                    };
                    let array = self.array(&name, ty, components, tuples)?;
                    match role {
                        Some(role) => {
                            attributes.set_attribute(role, array)?;
                        }
                        None => {
                            attributes.add_array(array);
                        }
                    }
                }
                "TEXTURE_COORDINATES" => {
                    let name = decode_name(self.expect("texture coordinates name")?);
                    let components: usize = self.number("texture dimension")?;
                    let ty = self.scalar_type()?;
                    let array = self.array(&name, ty, components, tuples)?;
                    attributes.set_attribute(AttributeRole::TCoords, array)?;
                }
                "FIELD" => {
                    for array in self.field_arrays()? {
                        attributes.add_array(array);
                    }
                }
                other => return Err(Error::file_format(format!("unknown attribute keyword `{other}`"))),
            }
        }
        Ok(())
    }
}

/// Everything read so far, assembled once the dataset type is known.
#[derive(Default)]
struct Parts {
    extent: Option<Extent>,
    spacing: Option<Vec3>,
    origin: Option<Vec3>,
    direction: Option<Mat3>,
    points: Option<Points>,
    coordinates: [Option<DataArray>; 3],
    verts: CellArray,
    lines: CellArray,
    polys: CellArray,
    strips: CellArray,
    cells: CellArray,
    cell_types: Vec<CellType>,
    field_data: FieldData,
    point_data: DataSetAttributes,
    cell_data: DataSetAttributes,
    row_data: DataSetAttributes,
}

impl Parts {
    fn section(&mut self, c: &mut Cursor<'_>, keyword: &str) -> Result<()> {
        match keyword {
            "FIELD" => {
                for array in c.field_arrays()? {
                    self.field_data.add_array(array);
                }
            }
            "DIMENSIONS" => {
                let dims: [f64; 3] = c.numbers("dimension")?;
                let [x, y, z] = dims.map(|d| d as i32 - 1);
                self.extent = Some([0, x, 0, y, 0, z]);
            }
            "EXTENT" => {
                let mut extent = [0; 6];
                for e in extent.iter_mut() {
                    *e = c.number("extent")?;
                }
                self.extent = Some(extent);
            }
            "SPACING" | "ASPECT_RATIO" => self.spacing = Some(c.numbers("spacing")?),
            "ORIGIN" => self.origin = Some(c.numbers("origin")?),
            "DIRECTION" => {
                let m: [f64; 9] = c.numbers("direction")?;
                self.direction = Some([[m[0], m[1], m[2]], [m[3], m[4], m[5]], [m[6], m[7], m[8]]]);
            }
            "POINTS" => {
                let n: usize = c.number("number of points")?;
                let ty = c.scalar_type()?;
                self.points = Some(Points::from_array(c.array("Points", ty, 3, n)?)?);
            }
            "X_COORDINATES" | "Y_COORDINATES" | "Z_COORDINATES" => {
                let axis = usize::from(keyword.as_bytes()[0] - b'X');
                let n: usize = c.number("number of coordinates")?;
                let ty = c.scalar_type()?;
                let name = format!("{}_coordinates", (b'x' + axis as u8) as char);
                self.coordinates[axis] = Some(c.array(&name, ty, 1, n)?);
            }
            "VERTICES" => self.verts = c.cells()?,
            "LINES" => self.lines = c.cells()?,
            "POLYGONS" => self.polys = c.cells()?,
            "TRIANGLE_STRIPS" => self.strips = c.cells()?,
            "CELLS" => self.cells = c.cells()?,
            "CELL_TYPES" => {
                let n: usize = c.number("number of cell types")?;
                let types = c.array("types", ScalarType::Int, 1, n)?;
                self.cell_types = (0..n)
                    .map(|i| {
                        let id = types.integer_value(i).unwrap_or(-1);
                        i64::try_from(id)
                            .map_err(|_| Error::file_format(format!("unknown cell type {id}")))
                            .and_then(CellType::try_from)
                    })
                    .collect::<Result<_>>()?;
            }
            "POINT_DATA" => {
                let n = c.number("number of points")?;
                c.attributes(n, &mut self.point_data)?;
            }
            "CELL_DATA" => {
                let n = c.number("number of cells")?;
                c.attributes(n, &mut self.cell_data)?;
            }
            "ROW_DATA" => {
                let n = c.number("number of rows")?;
                c.attributes(n, &mut self.row_data)?;
            }
            "METADATA" => {
                c.skip_line();
                while c.pos < c.bytes.len() && !c.line()?.trim().is_empty() {}
            }
            other => return Err(Error::file_format(format!("unknown keyword `{other}`"))),
        }
        Ok(())
    }

    fn extent(&self) -> Result<Extent> {
        self.extent
            .ok_or_else(|| Error::file_format("structured dataset without DIMENSIONS"))
    }

    fn points(&mut self) -> Points {
        self.points.take().unwrap_or_default()
    }

    fn assemble(mut self, kind: &str) -> Result<DataObject> {
        let data = match kind {
            "STRUCTURED_POINTS" => DataObject::Image(ImageData {
                extent: self.extent()?,
                origin: self.origin.unwrap_or([0.0; 3]),
                spacing: self.spacing.unwrap_or([1.0; 3]),
                direction: self.direction.unwrap_or(math::IDENTITY3),
                point_data: self.point_data,
                cell_data: self.cell_data,
                field_data: self.field_data,
            }),
            "RECTILINEAR_GRID" => {
                let extent = self.extent()?;
                let [x, y, z] = std::mem::take(&mut self.coordinates).map(|c| c.map(Arc::new));
                let missing = || Error::file_format("rectilinear grid without coordinates");
                let mut grid = RectilinearGrid::with_extent(
                    extent,
                    x.ok_or_else(missing)?,
                    y.ok_or_else(missing)?,
                    z.ok_or_else(missing)?,
                )?;
                grid.point_data = self.point_data;
                grid.cell_data = self.cell_data;
                grid.field_data = self.field_data;
                DataObject::Rectilinear(grid)
            }
            "STRUCTURED_GRID" => {
                let extent = self.extent()?;
                let mut grid = StructuredGrid::new(extent, self.points())?;
                grid.point_data = self.point_data;
                grid.cell_data = self.cell_data;
                grid.field_data = self.field_data;
                DataObject::Structured(grid)
            }
            "POLYDATA" => DataObject::PolyData(PolyData {
                points: self.points(),
                verts: self.verts,
                lines: self.lines,
                polys: self.polys,
                strips: self.strips,
                point_data: self.point_data,
                cell_data: self.cell_data,
                field_data: self.field_data,
            }),
            "UNSTRUCTURED_GRID" => {
                if self.cell_types.len() != self.cells.number_of_cells() {
                    return Err(Error::file_format(format!(
                        "{} cell types for {} cells",
                        self.cell_types.len(),
                        self.cells.number_of_cells()
                    )));
                }
                DataObject::Unstructured(UnstructuredGrid {
                    points: self.points(),
                    cells: self.cells,
                    cell_types: self.cell_types,
                    point_data: self.point_data,
                    cell_data: self.cell_data,
                    field_data: self.field_data,
                })
            }
            "TABLE" => {
                let mut table = Table::new();
                for column in self.row_data.shared_iter() {
                    table.add_column(Arc::clone(column))?;
                }
                DataObject::Table(table)
            }
            other => return Err(Error::file_format(format!("unsupported dataset type `{other}`"))),
        };
        data.validate()?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::legacy::{LegacyVersion, LegacyWriter};

    const TRIANGLE: &str = "# vtk DataFile Version 4.2
hand written
ASCII
DATASET POLYDATA
POINTS 3 float
0 0 0 1 0 0 0 1 0
POLYGONS 1 4
3 0 1 2
POINT_DATA 3
SCALARS temperature double
LOOKUP_TABLE default
1.5 2.5 3.5
METADATA
INFORMATION 0

COLOR_SCALARS rgb 3
1 0 0 0 1 0 0 0 1
CELL_DATA 1
FIELD FieldData 2
ids 1 1 int
7
my%20flux 2 1 double
0.5 0.25
";

    #[test]
    fn reads_hand_written_file() {
        let file = LegacyReader::new().read_bytes(TRIANGLE.as_bytes()).unwrap();
        assert_eq!(file.version, (4, 2));
        assert_eq!(file.header, "hand written");
        let poly = file.data.as_poly_data().unwrap();
        assert_eq!(poly.number_of_points(), 3);
        assert_eq!(poly.polys.cell(0), &[0, 1, 2]);
        assert_eq!(poly.points.data().scalar_type(), ScalarType::Float);
        // the color scalars come last and take over the scalars role
        assert_eq!(poly.point_data.active_name(AttributeRole::Scalars), Some("rgb"));
        let rgb = poly.point_data.get("rgb").unwrap();
        assert_eq!(rgb.scalar_type(), ScalarType::UnsignedChar);
        assert_eq!(rgb.tuple(2), vec![0.0, 0.0, 255.0]);
        assert_eq!(poly.point_data.get("temperature").unwrap().tuple(1), vec![2.5]);
        assert_eq!(poly.cell_data.get("my flux").unwrap().tuple(0), vec![0.5, 0.25]);
    }

    #[test]
    fn version_4_2_rewritten_as_5_1_keeps_everything() {
        let file = LegacyReader::new().read_bytes(TRIANGLE.as_bytes()).unwrap();
        let bytes = LegacyWriter::new()
            .version(LegacyVersion::V5_1)
            .write_to_bytes(&file.data)
            .unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("OFFSETS vtktypeint64"));
        assert!(text.contains("my%20flux"));
        let again = LegacyReader::new().read_bytes(&bytes).unwrap();
        assert_eq!(again.version, (5, 1));
        assert_eq!(again.data, file.data);
    }

    #[test]
    fn structured_points_with_offset_extent() {
        let mut image = ImageData::new([2, 4, 0, 2, 0, 0], [1.0, 2.0, 3.0], [0.5, 0.5, 1.0]);
        image.point_data.set_scalars(DataArray::scalars("s", (0..9).map(|v| v as f32).collect())).unwrap();
        image.cell_data.add_array(DataArray::scalars("c", vec![1u16, 2, 3, 4]));
        for file_type in [FileType::Ascii, FileType::Binary] {
            let data = DataObject::Image(image.clone());
            let bytes = LegacyWriter::new().file_type(file_type).write_to_bytes(&data).unwrap();
            let back = LegacyReader::new().read_bytes(&bytes).unwrap();
            assert_eq!(back.file_type, file_type);
            assert_eq!(back.data, data);
        }
    }

    #[test]
    fn errors_are_file_format_errors() {
        let truncated = &TRIANGLE[..TRIANGLE.find("POLYGONS").unwrap() + 14];
        assert!(matches!(
            LegacyReader::new().read_bytes(truncated.as_bytes()),
            Err(Error::FileFormat(_))
        ));
        assert!(LegacyReader::new().read_bytes(b"hello\n").is_err());
    }
}
