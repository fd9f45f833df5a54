use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use vtk_pipeline::filters::{PointLocator, StaticPointLocator};

fn random_points(n: usize) -> Vec<[f64; 3]> {
    let array: Array2<f64> = Array2::random((n, 3), Uniform::new(0., 1.));
    array.outer_iter().map(|row| [row[0], row[1], row[2]]).collect()
}

fn locator_bench(c: &mut Criterion) {
    let points = random_points(20_000);
    let queries = random_points(5_000);

    c.bench_function("static locator build 20k", |b| {
        b.iter(|| StaticPointLocator::build(black_box(points.clone()), 4, None).unwrap())
    });

    c.bench_function("incremental locator build 20k", |b| {
        b.iter(|| {
            let mut locator = PointLocator::new([0., 1., 0., 1., 0., 1.], points.len(), 3);
            for p in black_box(&points) {
                locator.insert_next_point(*p);
            }
            locator
        })
    });

    let fixed = StaticPointLocator::build(points.clone(), 4, None).unwrap();
    c.bench_function("static locator query 5k", |b| {
        b.iter(|| queries.iter().filter_map(|p| fixed.find_closest_point(*p)).count())
    });

    let mut incremental = PointLocator::new([0., 1., 0., 1., 0., 1.], points.len(), 3);
    for p in &points {
        incremental.insert_next_point(*p);
    }
    c.bench_function("incremental locator query 5k", |b| {
        b.iter(|| queries.iter().filter_map(|p| incremental.find_closest_point(*p)).count())
    });
}

criterion_group!(benches, locator_bench);
criterion_main!(benches);
