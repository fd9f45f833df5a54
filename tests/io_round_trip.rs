use std::path::PathBuf;

use vtk_pipeline::data::{AttributeRole, CellGrid, FunctionSpace, Points, PolyData};
use vtk_pipeline::filters::{CellTypeSource, ImageSource, SphereSource};
use vtk_pipeline::io::legacy::{FileType, LegacyReader, LegacyVersion, LegacyWriter};
use vtk_pipeline::io::xml::{read_parallel, Encoding, ParallelWriter, XmlReader, XmlWriter};
use vtk_pipeline::io::{self, FileReader};
use vtk_pipeline::{
    CellType, DataArray, DataObject, ImageData, MultiBlock, Pipeline, RectilinearGrid, ScalarType, StructuredGrid,
    Table,
};

struct TempDir(PathBuf);

impl TempDir {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("vtk-pipeline-it-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn path(&self, file: &str) -> PathBuf {
        self.0.join(file)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.0).ok();
    }
}

fn image() -> DataObject {
    let mut image = ImageSource::sphere([5, 4, 3]).generate(&[0, 4, 0, 3, 0, 2]).unwrap();
    image.cell_data.add_array(DataArray::scalars("cell id", (0..24).collect::<Vec<i32>>()));
    image.field_data.add_array(DataArray::scalars("time", vec![0.25f64]));
    DataObject::Image(image)
}

fn rectilinear() -> DataObject {
    let mut grid = RectilinearGrid::new(vec![0.0, 1.0, 3.0], vec![0.0, 0.5], vec![-1.0, 0.0, 2.0]).unwrap();
    grid.point_data
        .set_scalars(DataArray::scalars("height", (0..18).map(|v| v as f32 * 0.5).collect()))
        .unwrap();
    DataObject::Rectilinear(grid)
}

fn structured() -> DataObject {
    let mut points = Vec::new();
    for j in 0..3 {
        for i in 0..3 {
            let (x, y) = (i as f64, j as f64);
            points.push([x + 0.1 * y, y, 0.05 * x * y]);
        }
    }
    let mut grid = StructuredGrid::new([0, 2, 0, 2, 0, 0], Points::from_vec(points)).unwrap();
    grid.point_data
        .set_vectors(DataArray::from_tuples("velocity", (0..9).map(|v| [v as f64, 0.0, 1.0]).collect()))
        .unwrap();
    DataObject::Structured(grid)
}

fn poly() -> DataObject {
    DataObject::PolyData(SphereSource::new([1.0, 2.0, 3.0], 0.75).generate().unwrap())
}

fn unstructured() -> DataObject {
    let mut grid = CellTypeSource::new(CellType::Hexahedron, [2, 2, 1]).unwrap().generate().unwrap();
    let cells = grid.number_of_cells();
    grid.cell_data
        .set_scalars(DataArray::scalars("material", (0..cells as i64).collect()))
        .unwrap();
    DataObject::Unstructured(grid)
}

fn table() -> DataObject {
    let mut table = Table::new();
    table.add_column(DataArray::scalars("count", vec![1u32, 5, 7])).unwrap();
    table.add_column(DataArray::scalars("weight", vec![0.5f64, 1.5, -2.0])).unwrap();
    DataObject::Table(table)
}

/// Every cell array, every attribute role, a bit array and multi-component field data.
fn rich_poly() -> DataObject {
    let mut poly = PolyData::with_points(Points::from_vec(vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.5, 0.5, 1.0],
    ]));
    poly.verts.insert_next_cell(&[4]);
    poly.lines.insert_next_cell(&[0, 4, 2]);
    poly.polys.insert_next_cell(&[0, 1, 2, 3]);
    poly.polys.insert_next_cell(&[0, 1, 4]);
    poly.strips.insert_next_cell(&[1, 2, 4, 3]);

    let pd = &mut poly.point_data;
    pd.set_scalars(DataArray::scalars("temperature", vec![1.5f64, -2.25, 3.0, 0.125, 1e-7]))
        .unwrap();
    pd.set_vectors(DataArray::from_tuples("velocity", (0..5).map(|i| [i as f64, 0.5, -1.0]).collect()))
        .unwrap();
    pd.set_normals(DataArray::from_tuples("normals", vec![[0.0f32, 0.0, 1.0]; 5]))
        .unwrap();
    pd.set_attribute(AttributeRole::TCoords, DataArray::from_tuples("uv", (0..5).map(|i| [i as f32 * 0.25, 1.0]).collect()))
        .unwrap();
    pd.set_attribute(AttributeRole::GlobalIds, DataArray::scalars("global", vec![10i32, 11, 12, 13, 14]))
        .unwrap();
    let mut mask = DataArray::scalars("mask", vec![1u8, 0, 1, 1, 0]);
    mask.set_scalar_type_tag(ScalarType::Bit).unwrap();
    pd.add_array(mask);

    let cd = &mut poly.cell_data;
    cd.set_scalars(DataArray::scalars("part", vec![3i16, 1, 4, 1, 5])).unwrap();
    let stress: Vec<[f64; 9]> = (0..5).map(|c| [c as f64, 1.0, 0.0, 1.0, 2.0, 0.0, 0.0, 0.0, -0.5]).collect();
    cd.set_attribute(AttributeRole::Tensors, DataArray::from_tuples("stress", stress))
        .unwrap();
    cd.add_array(DataArray::from_tuples("pair", vec![[1i64, -2], [3, -4], [5, -6], [7, -8], [9, -10]]));

    poly.field_data.add_array(DataArray::from_tuples("steps", vec![[1i32, 2, 3], [4, 5, 6]]));
    poly.field_data.add_array(DataArray::from_tuples("bounds", vec![[0.0f64, 1.0], [0.0, 1.0], [0.0, 1.0]]));
    DataObject::PolyData(poly)
}

fn datasets() -> Vec<DataObject> {
    vec![image(), rectilinear(), structured(), poly(), unstructured(), table()]
}

#[test]
fn legacy_round_trip_in_every_layout() {
    for version in [LegacyVersion::V4_2, LegacyVersion::V5_1] {
        for file_type in [FileType::Ascii, FileType::Binary] {
            let writer = LegacyWriter::new().version(version).file_type(file_type);
            for data in datasets() {
                let bytes = writer.write_to_bytes(&data).unwrap();
                let file = LegacyReader::new().read_bytes(&bytes).unwrap();
                assert_eq!(file.version, version.number());
                assert_eq!(file.data, data, "{version:?} {file_type:?} {}", data.type_name());
            }
        }
    }
}

#[test]
fn rich_poly_data_survives_every_encoding() {
    let data = rich_poly();
    data.validate().unwrap();
    for version in [LegacyVersion::V4_2, LegacyVersion::V5_1] {
        for file_type in [FileType::Ascii, FileType::Binary] {
            let bytes = LegacyWriter::new().version(version).file_type(file_type).write_to_bytes(&data).unwrap();
            assert_eq!(LegacyReader::new().read_bytes(&bytes).unwrap().data, data, "{version:?} {file_type:?}");
        }
    }
    for encoding in [Encoding::Ascii, Encoding::Binary, Encoding::Appended] {
        let bytes = XmlWriter::new(encoding).write_to_bytes(&data).unwrap();
        assert_eq!(XmlReader::new().read_bytes(&bytes).unwrap(), data, "{encoding:?}");
    }

    let dir = TempDir::new("vtp");
    let path = dir.path("rich.vtp");
    io::write(&path, &data).unwrap();
    assert_eq!(io::read(&path).unwrap(), data);
}

#[test]
fn legacy_4_2_upgrades_to_5_1_through_files() {
    let dir = TempDir::new("legacy");
    let old = dir.path("old.vtk");
    let new = dir.path("new.vtk");
    let data = unstructured();
    LegacyWriter::new().version(LegacyVersion::V4_2).write(&old, &data).unwrap();

    let file = LegacyReader::new().read(&old).unwrap();
    assert_eq!(file.version, (4, 2));
    LegacyWriter::new().write(&new, &file.data).unwrap();
    let text = std::fs::read_to_string(&new).unwrap();
    assert!(text.starts_with("# vtk DataFile Version 5.1"));
    assert_eq!(io::read(&new).unwrap(), data);
}

#[test]
fn xml_round_trip_in_every_encoding() {
    let reader = XmlReader::new();
    for encoding in [Encoding::Ascii, Encoding::Binary, Encoding::Appended] {
        let writer = XmlWriter::new(encoding);
        for data in datasets() {
            let bytes = writer.write_to_bytes(&data).unwrap();
            assert_eq!(reader.read_bytes(&bytes).unwrap(), data, "{encoding:?} {}", data.type_name());
        }
    }
}

#[test]
fn files_dispatch_on_extension() {
    let dir = TempDir::new("dispatch");
    for (data, ext) in datasets().into_iter().zip(["vti", "vtr", "vts", "vtp", "vtu", "vtt"]) {
        let path = dir.path(&format!("data.{ext}"));
        io::write(&path, &data).unwrap();
        assert_eq!(io::read(&path).unwrap(), data);
        assert_eq!(io::expected_kind(&path), Some(data.kind()));
    }
    let path = dir.path("legacy.vtk");
    io::write(&path, &poly()).unwrap();
    assert_eq!(io::read(&path).unwrap(), poly());
}

#[test]
fn parallel_image_reassembles() {
    let dir = TempDir::new("pvti");
    let path = dir.path("field.pvti");
    let data = image();
    let pieces = ParallelWriter::new(3).write(&path, &data).unwrap();
    assert_eq!(pieces.len(), 3);
    assert!(pieces.iter().all(|p| p.exists()));
    assert_eq!(read_parallel(&path).unwrap(), data);
    assert_eq!(io::read(&path).unwrap(), data);
}

#[test]
fn parallel_unstructured_keeps_every_cell() {
    let dir = TempDir::new("pvtu");
    let path = dir.path("mesh.pvtu");
    let data = unstructured();
    ParallelWriter::new(2).write(&path, &data).unwrap();
    let back = io::read(&path).unwrap();
    assert_eq!(back.number_of_cells(), data.number_of_cells());
    let material = back.as_unstructured().unwrap().cell_data.get("material").unwrap();
    let mut ids: Vec<i64> = (0..material.number_of_tuples())
        .map(|i| material.integer_value(i).unwrap() as i64)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..data.number_of_cells() as i64).collect::<Vec<_>>());
}

#[test]
fn multiblock_round_trip() {
    let dir = TempDir::new("vtm");
    let mut nested = MultiBlock::new();
    nested.add_block(Some("surface"), poly());
    nested.add_block(Some("volume"), unstructured());

    let mut root = MultiBlock::new();
    root.add_block(Some("grid"), image());
    root.add_block(Some("parts"), nested);
    root.set_block(2, None);
    root.add_block(Some("stats"), table());

    let path = dir.path("case.vtm");
    io::write(&path, &DataObject::MultiBlock(root.clone())).unwrap();
    let back = io::read(&path).unwrap();
    assert_eq!(back, DataObject::MultiBlock(root));
}

#[test]
fn cell_grid_round_trip() {
    let dir = TempDir::new("dg");
    let points = Points::from_vec(vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.5, 0.5, 1.0],
    ]);
    let mut grid = CellGrid::new(points);
    grid.add_cell_group("base", CellType::Quad, DataArray::from_tuples("conn", vec![[0i64, 1, 2, 3]]))
        .unwrap();
    grid.add_cell_group("sides", CellType::Triangle, DataArray::from_tuples("conn", vec![[0i64, 1, 4], [1, 2, 4]]))
        .unwrap();
    let temperature = grid.add_attribute("temperature", FunctionSpace::HGrad, 1);
    grid.set_attribute_array(temperature, "base", DataArray::from_tuples("t", vec![[1.0f64, 2.0, 3.0, 4.0]]))
        .unwrap();
    grid.set_attribute_array(temperature, "sides", DataArray::from_tuples("t", vec![[1.0f64, 2.0, 5.0], [2.0, 3.0, 5.0]]))
        .unwrap();

    let path = dir.path("shell.dg");
    io::write(&path, &DataObject::CellGrid(grid.clone())).unwrap();
    assert_eq!(io::read(&path).unwrap(), DataObject::CellGrid(grid));
}

#[test]
fn file_reader_serves_pieces() {
    let dir = TempDir::new("reader");
    let path = dir.path("sphere.vtp");
    io::write(&path, &poly()).unwrap();

    let mut pipeline = Pipeline::new();
    let reader = pipeline.add(FileReader::new(&path));
    pipeline.update(reader).unwrap();
    let whole = pipeline.output(reader, 0).unwrap();
    assert_eq!(*whole, poly());
    assert_eq!(pipeline.executions(reader), 1);
}

#[test]
fn image_extent_survives_xml() {
    let mut image = ImageData::new([3, 5, -2, 0, 1, 1], [0.5, 0.0, -1.0], [0.25, 1.0, 2.0]);
    image.point_data
        .set_scalars(DataArray::scalars("v", (0..9).map(|v| v as u8).collect()))
        .unwrap();
    let data = DataObject::Image(image);
    let bytes = XmlWriter::new(Encoding::Binary).write_to_bytes(&data).unwrap();
    assert_eq!(XmlReader::new().read_bytes(&bytes).unwrap(), data);
}
