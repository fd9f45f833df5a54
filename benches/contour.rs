use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vtk_pipeline::filters::{ContourFilter, ImageSource, SurfaceNets3D};
use vtk_pipeline::DataObject;

fn sphere_field(n: usize) -> DataObject {
    let last = n as i32 - 1;
    DataObject::from(ImageSource::sphere([n; 3]).generate(&[0, last, 0, last, 0, last]).unwrap())
}

fn contour_bench(c: &mut Criterion) {
    let filter = ContourFilter::with_values(&[0.5]);

    let small = sphere_field(32);
    c.bench_function("contour sphere 32", |b| b.iter(|| filter.contour(black_box(&small)).unwrap()));

    let large = sphere_field(64);
    c.bench_function("contour sphere 64", |b| b.iter(|| filter.contour(black_box(&large)).unwrap()));

    let blobs = vec![([-0.4, 0.0, 0.0], 0.3), ([0.4, 0.0, 0.0], 0.3)];
    let labels = ImageSource::label_blobs([48; 3], blobs)
        .generate(&[0, 47, 0, 47, 0, 47])
        .unwrap();
    let mut nets = SurfaceNets3D::new();
    nets.set_labels(&[1.0, 2.0]);
    c.bench_function("surface nets two blobs 48", |b| b.iter(|| nets.extract(black_box(&labels)).unwrap()));
}

criterion_group!(benches, contour_bench);
criterion_main!(benches);
