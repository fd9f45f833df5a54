use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vtk_pipeline::cell::{evaluate_location, evaluate_position};
use vtk_pipeline::filters::{
    BinnedDecimation, CellTypeSource, ClipDataSet, ContourFilter, Cutter, HistogramModel, ImageSource, Plane,
    PlaneSource, PointLocator, Sphere, StaticPointLocator, VisualStatistics,
};
use vtk_pipeline::object::ObjectId;
use vtk_pipeline::pipeline::TrivialProducer;
use vtk_pipeline::scene::{Actor, CellPicker, Mapper, Renderer};
use vtk_pipeline::{
    CellType, DataArray, DataObject, EventId, MultiBlock, NodeId, Observable, Pipeline, ScalarType, Table,
    UpdateRequest,
};

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

#[test]
fn observer_sees_modification_until_removed() {
    let mut array = DataArray::new(ScalarType::Double, 1);
    let seen: Arc<Mutex<Vec<(ObjectId, &'static str)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let tag = array.add_observer(EventId::ModifiedEvent, 0.0, move |event| {
        sink.lock().unwrap().push((event.caller, event.id.as_str()));
    });

    array.modified();
    assert_eq!(*seen.lock().unwrap(), vec![(array.id(), "ModifiedEvent")]);

    assert!(array.remove_observer(tag));
    array.modified();
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn buffer_events_follow_reallocation() {
    let mut array = DataArray::new(ScalarType::Float, 3);
    array.set_number_of_tuples(10);
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    array.add_observer(EventId::BufferChangedEvent, 0.0, move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    array.set_number_of_tuples(10);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    array.resize(1000);
    assert!(count.load(Ordering::SeqCst) > 0);
}

#[test]
fn generated_cells_invert_their_parametric_map() {
    let pcoords = [0.2, 0.15, 0.1];
    for ty in [CellType::Tetra, CellType::Hexahedron, CellType::Wedge, CellType::Pyramid] {
        let grid = CellTypeSource::new(ty, [2, 2, 2]).unwrap().generate().unwrap();
        assert!(grid.number_of_cells() > 0);
        for id in 0..grid.number_of_cells() {
            let cell = grid.cell(id);
            let points: Vec<[f64; 3]> = cell.point_ids.iter().map(|&p| grid.point(p)).collect();
            let (x, weights) = evaluate_location(cell.cell_type, &points, pcoords).unwrap();
            assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);

            let hit = evaluate_position(cell.cell_type, &points, x).unwrap();
            assert!(hit.inside, "{ty:?} cell {id}");
            assert!(distance(hit.pcoords, pcoords) < 1e-3, "{ty:?} cell {id}: {:?}", hit.pcoords);
        }
    }
}

#[test]
fn unit_tetra_membership() {
    let tet = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    let c = |n: i32| -1.0 + 3.0 * n as f64 / 20.0;
    for i in 0..=20 {
        for j in 0..=20 {
            for k in 0..=20 {
                let x = [c(i), c(j), c(k)];
                let expected = x.iter().all(|v| (0.0..=1.0).contains(v)) && x[0] + x[1] + x[2] <= 1.01;
                let hit = evaluate_position(CellType::Tetra, &tet, x).unwrap();
                assert_eq!(hit.inside, expected, "{x:?}");
                if hit.inside {
                    let err = (0..3).map(|a| (hit.pcoords[a] - x[a]).abs()).fold(0.0, f64::max);
                    assert!(err < 1e-3);
                }
            }
        }
    }
}

#[test]
fn composite_picker_reports_the_block() {
    // 2x2 unit squares sharing their inner edges
    let mut blocks = MultiBlock::new();
    for (ix, iy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
        let mut plane = PlaneSource::new();
        plane.set_points([ix, iy, 0.0], [ix + 1.0, iy, 0.0], [ix, iy + 1.0, 0.0]);
        blocks.add_block(None, plane.generate().unwrap());
    }
    let leaves: Vec<(usize, DataObject)> = blocks.leaves().into_iter().map(|(i, d)| (i, d.clone())).collect();

    let mut renderer = Renderer::new();
    renderer.set_size(400, 400);
    renderer.add_actor(Actor::with_mapper(Mapper::with_input(blocks)));
    renderer.reset_camera();
    renderer.render();

    let centers = [[0.5, 0.5, 0.0], [1.5, 0.5, 0.0], [0.5, 1.5, 0.0], [1.5, 1.5, 0.0]];
    for ((flat, leaf), center) in leaves.iter().zip(centers) {
        let display = renderer.world_to_display(center);
        let hit = CellPicker::new().pick(display[0], display[1], &renderer).unwrap();
        assert_eq!(hit.flat_block_index, Some(*flat));
        assert_eq!(hit.cell_id, 0);
        let poly = leaf.as_poly_data().unwrap();
        assert!(poly.cell(hit.cell_id).unwrap().point_ids.contains(&hit.point_id));
    }
}

#[test]
fn locators_agree_on_closest_distance() {
    let mut rng = StdRng::seed_from_u64(11);
    let points: Vec<[f64; 3]> = (0..20_000).map(|_| rng.gen()).collect();
    let queries: Vec<[f64; 3]> = (0..5_000).map(|_| rng.gen()).collect();

    let mut incremental = PointLocator::new([0.0, 1.0, 0.0, 1.0, 0.0, 1.0], points.len(), 3);
    for p in &points {
        incremental.insert_next_point(*p);
    }
    let fixed = StaticPointLocator::build(points.clone(), 2, Some(4)).unwrap();

    for query in queries {
        let a = incremental.find_closest_point(query).unwrap();
        let b = fixed.find_closest_point(query).unwrap();
        let (da, db) = (distance(points[a], query), distance(points[b], query));
        assert!((da - db).abs() < 1e-12, "{query:?}: {a} at {da} vs {b} at {db}");
    }
}

#[test]
fn histograms_add_over_a_partition() {
    let mut rng = StdRng::seed_from_u64(5);
    let values: Vec<f64> = (0..1000).map(|_| rng.gen_range(0.0..=10.0)).collect();
    let mut table = Table::new();
    table.add_column(DataArray::scalars("c", values)).unwrap();

    let mut stats = VisualStatistics::new();
    stats.set_column_range("c", 0.0, 10.0).unwrap();
    stats.set_number_of_bins(5).unwrap();

    let whole = stats.learn(&table).unwrap();
    assert_eq!(whole.column("c").unwrap().bins().iter().sum::<u64>(), 1000);

    let (even, odd): (Vec<usize>, Vec<usize>) = (0..1000).partition(|i| i % 3 == 0);
    let a = stats.learn(&table.select_rows(&even)).unwrap();
    let b = stats.learn(&table.select_rows(&odd)).unwrap();
    assert_eq!(HistogramModel::aggregate(&[&a, &b]).unwrap(), whole);
}

#[test]
fn downstream_data_is_never_older_than_upstream() {
    let mut pipeline = Pipeline::new();
    let source = pipeline.add(ImageSource::sphere([16, 16, 16]));
    let contour = pipeline.add(ContourFilter::with_values(&[0.6]));
    let decimate = pipeline.add(BinnedDecimation::new());
    pipeline.connect(source, 0, contour, 0).unwrap();
    pipeline.connect(contour, 0, decimate, 0).unwrap();

    pipeline.update(decimate).unwrap();
    assert!(pipeline.data_time(decimate, 0) >= pipeline.data_time(contour, 0));
    assert!(pipeline.data_time(contour, 0) >= pipeline.data_time(source, 0));
    let surface = pipeline.output(decimate, 0).unwrap();
    assert!(surface.number_of_cells() > 0);

    // nothing changed: no re-execution
    pipeline.update(decimate).unwrap();
    assert_eq!(pipeline.executions(contour), 1);

    pipeline.algorithm_mut::<ContourFilter>(contour).unwrap().set_values(&[0.3]);
    pipeline.update(decimate).unwrap();
    assert_eq!(pipeline.executions(source), 1);
    assert_eq!(pipeline.executions(contour), 2);
    assert_eq!(pipeline.executions(decimate), 2);
    assert!(pipeline.data_time(decimate, 0) >= pipeline.data_time(contour, 0));
}

fn cells_over_pieces(pipeline: &mut Pipeline, node: NodeId, count: usize) -> usize {
    (0..count)
        .map(|index| {
            pipeline.update_with(node, 0, UpdateRequest::piece(index, count)).unwrap();
            pipeline.output(node, 0).unwrap().number_of_cells()
        })
        .sum()
}

#[test]
fn filtered_pieces_add_up_to_the_whole() {
    // producer that cuts cell ranges itself
    let mut grid = CellTypeSource::new(CellType::Tetra, [4, 4, 4]).unwrap().generate().unwrap();
    let d: Vec<f64> = (0..grid.number_of_points()).map(|p| distance(grid.point(p), [2.0; 3])).collect();
    grid.point_data.set_scalars(DataArray::scalars("d", d)).unwrap();
    let input_cells = grid.number_of_cells();

    let mut pipeline = Pipeline::new();
    let producer = pipeline.add(TrivialProducer::new(grid));
    let contour = pipeline.add(ContourFilter::with_values(&[1.3]));
    pipeline.connect(producer, 0, contour, 0).unwrap();
    pipeline.update(contour).unwrap();
    let whole = pipeline.output(contour, 0).unwrap().number_of_cells();
    assert!(whole > 0);

    pipeline.update_with(contour, 0, UpdateRequest::piece(0, 4)).unwrap();
    assert!(pipeline.output(contour, 0).unwrap().number_of_cells() < whole);
    assert!(pipeline.output(producer, 0).unwrap().number_of_cells() < input_cells);
    assert_eq!(cells_over_pieces(&mut pipeline, contour, 4), whole);

    // images are requested as slabs
    let source = pipeline.add(ImageSource::sphere([17, 17, 17]));
    let shell = pipeline.add(ContourFilter::with_values(&[0.6]));
    pipeline.connect(source, 0, shell, 0).unwrap();
    pipeline.update(shell).unwrap();
    let whole = pipeline.output(shell, 0).unwrap().number_of_cells();
    pipeline.update_with(shell, 0, UpdateRequest::piece(1, 3)).unwrap();
    assert!(pipeline.output(source, 0).unwrap().number_of_points() < 17 * 17 * 17);
    assert_eq!(cells_over_pieces(&mut pipeline, shell, 3), whole);

    // sources that only make whole outputs: the filter cuts the piece
    let blocks = pipeline.add(CellTypeSource::new(CellType::Hexahedron, [3, 3, 3]).unwrap());
    let clip = pipeline.add(ClipDataSet::with_function(Plane::new([1.4, 1.5, 1.5], [1.0, 0.3, 0.2])));
    let cutter = pipeline.add(Cutter::new(Sphere::new([1.5; 3], 1.2)));
    pipeline.connect(blocks, 0, clip, 0).unwrap();
    pipeline.connect(blocks, 0, cutter, 0).unwrap();
    for filter in [clip, cutter] {
        pipeline.update(filter).unwrap();
        let whole = pipeline.output(filter, 0).unwrap().number_of_cells();
        assert!(whole > 0);
        assert_eq!(cells_over_pieces(&mut pipeline, filter, 5), whole);
    }
    assert_eq!(pipeline.executions(blocks), 1);
}
