//! Analytic sources: images with closed form scalar fields, planes, spheres, random
//! point clouds and blocks of a single cell type.

use crate::array::DataArray;
use crate::data::{
    extent_dimensions, intersect_extents, AttributeRole, CellType, DataKind, Extent, ImageData, Points, PolyData,
    UnstructuredGrid,
};
use crate::math::{self, Vec3};
use crate::object::{Object, Observable};
use crate::pipeline::{Algorithm, ExecutionContext, Information};
use crate::utils::impl_observable;
use crate::{Error, Result};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::f64::consts::PI;

/// Scalar field sampled by an [`ImageSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum ImageField {
    /// Gaussian bump plus sinusoids, stored as `RTData`.
    Wavelet {
        maximum: f64,
        frequency: Vec3,
        magnitude: Vec3,
        standard_deviation: f64,
        center: Vec3,
    },
    /// Distance to the origin, stored as `Distance`.
    SphereDistance,
    /// Integer labels, stored as `Labels`: point `x` gets `i + 1` for the last blob
    /// `(center, radius)` containing it and 0 outside every blob.
    LabelBlobs(Vec<(Vec3, f64)>),
}

impl ImageField {
    pub fn wavelet() -> Self {
        Self::Wavelet {
            maximum: 255.0,
            frequency: [60.0, 30.0, 40.0],
            magnitude: [10.0, 18.0, 5.0],
            standard_deviation: 0.5,
            center: [0.0; 3],
        }
    }

    fn array_name(&self) -> &'static str {
        match self {
            Self::Wavelet { .. } => "RTData",
            Self::SphereDistance => "Distance",
            Self::LabelBlobs(_) => "Labels",
        }
    }
}

/// Image source sampling an [`ImageField`] over a whole extent. Requests for a
/// sub-extent only compute that part.
#[derive(Debug)]
pub struct ImageSource {
    object: Object,
    field: ImageField,
    whole_extent: Extent,
    origin: Vec3,
    spacing: Vec3,
}

impl_observable!(ImageSource);

impl Default for ImageSource {
    fn default() -> Self {
        Self::new(ImageField::wavelet(), [-10, 10, -10, 10, -10, 10], [0.0; 3], [1.0; 3])
    }
}

impl ImageSource {
    pub fn new(field: ImageField, whole_extent: Extent, origin: Vec3, spacing: Vec3) -> Self {
        Self {
            object: Object::new(),
            field,
            whole_extent,
            origin,
            spacing,
        }
    }

    /// Distance field on `dims` points covering `[-1, 1]^3`.
    pub fn sphere(dims: [usize; 3]) -> Self {
        let extent = [0, dims[0] as i32 - 1, 0, dims[1] as i32 - 1, 0, dims[2] as i32 - 1];
        let spacing = dims.map(|d| if d > 1 { 2.0 / (d - 1) as f64 } else { 1.0 });
        Self::new(ImageField::SphereDistance, extent, [-1.0; 3], spacing)
    }

    /// Labelled balls on `dims` points covering `[-1, 1]^3`.
    pub fn label_blobs(dims: [usize; 3], blobs: Vec<(Vec3, f64)>) -> Self {
        let mut source = Self::sphere(dims);
        source.field = ImageField::LabelBlobs(blobs);
        source
    }

    pub fn field(&self) -> &ImageField {
        &self.field
    }

    pub fn set_field(&mut self, field: ImageField) {
        self.field = field;
        self.modified();
    }

    pub fn whole_extent(&self) -> Extent {
        self.whole_extent
    }

    pub fn set_whole_extent(&mut self, extent: Extent) {
        self.whole_extent = extent;
        self.modified();
    }

    /// Sample the field over `extent`.
    pub fn generate(&self, extent: &Extent) -> Result<ImageData> {
        let mut image = ImageData::new(*extent, self.origin, self.spacing);
        let name = self.field.array_name();
        match &self.field {
            ImageField::Wavelet {
                maximum,
                frequency,
                magnitude,
                standard_deviation,
                center,
            } => {
                let whole = self.whole_extent;
                let scale = |axis: usize| {
                    let span = whole[2 * axis + 1] - whole[2 * axis];
                    if span == 0 { 1.0 } else { 1.0 / span as f64 }
                };
                let scales = [scale(0), scale(1), scale(2)];
                let inv = 1.0 / (2.0 * standard_deviation * standard_deviation);
                let dims = extent_dimensions(extent);
                let mut values = Vec::with_capacity(image.number_of_points());
                for k in 0..dims[2] {
                    let z = (center[2] - (k as i32 + extent[4]) as f64) * scales[2];
                    for j in 0..dims[1] {
                        let y = (center[1] - (j as i32 + extent[2]) as f64) * scales[1];
                        for i in 0..dims[0] {
                            let x = (center[0] - (i as i32 + extent[0]) as f64) * scales[0];
                            let sum = x * x + y * y + z * z;
                            values.push(
                                maximum * (-sum * inv).exp()
                                    + magnitude[0] * (frequency[0] * x).sin()
                                    + magnitude[1] * (frequency[1] * y).sin()
                                    + magnitude[2] * (frequency[2] * z).cos(),
                            );
                        }
                    }
                }
                image.point_data.set_scalars(DataArray::scalars(name, values))?;
            }
            ImageField::SphereDistance => image.fill_point_scalars(name, math::norm)?,
            ImageField::LabelBlobs(blobs) => {
                let labels: Vec<i32> = (0..image.number_of_points())
                    .map(|id| {
                        let p = image.point(id);
                        blobs
                            .iter()
                            .enumerate()
                            .filter(|(_, (c, r))| math::distance2(p, *c) <= r * r)
                            .last()
                            .map_or(0, |(i, _)| i as i32 + 1)
                    })
                    .collect();
                image.point_data.set_scalars(DataArray::scalars(name, labels))?;
            }
        }
        Ok(image)
    }
}

impl Algorithm for ImageSource {
    fn name(&self) -> &'static str {
        "ImageSource"
    }

    fn number_of_input_ports(&self) -> usize {
        0
    }

    fn can_stream(&self) -> bool {
        true
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        let info = &mut outputs[0];
        *info = Information::of_kind(DataKind::Image);
        info.whole_extent = Some(self.whole_extent);
        info.can_stream = true;
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let extent = match ctx.request().extent {
            Some(requested) => intersect_extents(&self.whole_extent, &requested).ok_or_else(|| {
                Error::out_of_bounds(format!("requested extent {requested:?} is outside {:?}", self.whole_extent))
            })?,
            None => self.whole_extent,
        };
        let image = self.generate(&extent)?;
        ctx.set_output(0, image)
    }
}

/// A parallelogram spanned by `point1 - origin` and `point2 - origin`, split into
/// quads, with normals and texture coordinates.
#[derive(Debug)]
pub struct PlaneSource {
    object: Object,
    origin: Vec3,
    point1: Vec3,
    point2: Vec3,
    resolution: [usize; 2],
}

impl_observable!(PlaneSource);

impl Default for PlaneSource {
    fn default() -> Self {
        Self {
            object: Object::new(),
            origin: [-0.5, -0.5, 0.0],
            point1: [0.5, -0.5, 0.0],
            point2: [-0.5, 0.5, 0.0],
            resolution: [1, 1],
        }
    }
}

impl PlaneSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_points(&mut self, origin: Vec3, point1: Vec3, point2: Vec3) {
        self.origin = origin;
        self.point1 = point1;
        self.point2 = point2;
        self.modified();
    }

    pub fn set_resolution(&mut self, x: usize, y: usize) {
        self.resolution = [x.max(1), y.max(1)];
        self.modified();
    }

    pub fn generate(&self) -> Result<PolyData> {
        let v1 = math::sub(self.point1, self.origin);
        let v2 = math::sub(self.point2, self.origin);
        let normal = math::normalize(math::cross(v1, v2));
        if math::norm(normal) == 0.0 {
            return Err(Error::invalid_argument("plane axes are parallel"));
        }
        let [nx, ny] = self.resolution;
        let mut out = PolyData::new();
        let mut tcoords = Vec::with_capacity((nx + 1) * (ny + 1));
        for j in 0..=ny {
            let t = j as f64 / ny as f64;
            for i in 0..=nx {
                let s = i as f64 / nx as f64;
                out.points.push(math::add(self.origin, math::add(math::scale(v1, s), math::scale(v2, t))));
                tcoords.push([s, t]);
            }
        }
        for j in 0..ny {
            for i in 0..nx {
                let p = i + j * (nx + 1);
                out.polys.insert_next_cell(&[p, p + 1, p + nx + 2, p + nx + 1]);
            }
        }
        let n = out.number_of_points();
        out.point_data.set_normals(DataArray::from_tuples("Normals", vec![normal; n]))?;
        out.point_data
            .set_attribute(AttributeRole::TCoords, DataArray::from_tuples("TextureCoordinates", tcoords))?;
        Ok(out)
    }
}

impl Algorithm for PlaneSource {
    fn name(&self) -> &'static str {
        "PlaneSource"
    }

    fn number_of_input_ports(&self) -> usize {
        0
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::PolyData);
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let out = self.generate()?;
        ctx.set_output(0, out)
    }
}

/// Triangulated sphere: the two poles followed by one ring of points per latitude
/// and longitude.
#[derive(Debug)]
pub struct SphereSource {
    object: Object,
    center: Vec3,
    radius: f64,
    theta_resolution: usize,
    phi_resolution: usize,
}

impl_observable!(SphereSource);

impl Default for SphereSource {
    fn default() -> Self {
        Self {
            object: Object::new(),
            center: [0.0; 3],
            radius: 0.5,
            theta_resolution: 8,
            phi_resolution: 8,
        }
    }
}

impl SphereSource {
    pub fn new(center: Vec3, radius: f64) -> Self {
        Self {
            center,
            radius,
            ..Self::default()
        }
    }

    pub fn set_center(&mut self, center: Vec3) {
        self.center = center;
        self.modified();
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
        self.modified();
    }

    /// Longitude divisions (>= 3).
    pub fn set_theta_resolution(&mut self, n: usize) {
        self.theta_resolution = n.max(3);
        self.modified();
    }

    /// Latitude divisions (>= 3).
    pub fn set_phi_resolution(&mut self, n: usize) {
        self.phi_resolution = n.max(3);
        self.modified();
    }

    pub fn generate(&self) -> Result<PolyData> {
        let (nt, np) = (self.theta_resolution, self.phi_resolution);
        let rings = np - 1;
        let mut out = PolyData::new();
        let mut normals = Vec::with_capacity(2 + nt * (rings - 1));
        for dir in [[0.0, 0.0, 1.0], [0.0, 0.0, -1.0]] {
            out.points.push(math::add(self.center, math::scale(dir, self.radius)));
            normals.push(dir);
        }
        for i in 0..nt {
            let theta = 2.0 * PI * i as f64 / nt as f64;
            for j in 1..rings {
                let phi = PI * j as f64 / rings as f64;
                let dir = [phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos()];
                out.points.push(math::add(self.center, math::scale(dir, self.radius)));
                normals.push(dir);
            }
        }
        let ring = |i: usize, j: usize| 2 + (i % nt) * (rings - 1) + (j - 1);
        for i in 0..nt {
            out.polys.insert_next_cell(&[0, ring(i, 1), ring(i + 1, 1)]);
        }
        for i in 0..nt {
            for j in 1..rings - 1 {
                out.polys.insert_next_cell(&[ring(i, j), ring(i, j + 1), ring(i + 1, j + 1)]);
                out.polys.insert_next_cell(&[ring(i, j), ring(i + 1, j + 1), ring(i + 1, j)]);
            }
        }
        for i in 0..nt {
            out.polys.insert_next_cell(&[1, ring(i + 1, rings - 1), ring(i, rings - 1)]);
        }
        out.point_data.set_normals(DataArray::from_tuples("Normals", normals))?;
        Ok(out)
    }
}

impl Algorithm for SphereSource {
    fn name(&self) -> &'static str {
        "SphereSource"
    }

    fn number_of_input_ports(&self) -> usize {
        0
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::PolyData);
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let out = self.generate()?;
        ctx.set_output(0, out)
    }
}

/// How a [`PointSource`] spreads its points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointDistribution {
    /// uniform density inside the ball
    #[default]
    Uniform,
    /// on the sphere
    Shell,
}

/// Seeded random points in a ball, as one poly-vertex cell.
#[derive(Debug)]
pub struct PointSource {
    object: Object,
    number_of_points: usize,
    center: Vec3,
    radius: f64,
    distribution: PointDistribution,
    seed: u64,
}

impl_observable!(PointSource);

impl Default for PointSource {
    fn default() -> Self {
        Self {
            object: Object::new(),
            number_of_points: 10,
            center: [0.0; 3],
            radius: 0.5,
            distribution: PointDistribution::Uniform,
            seed: 0,
        }
    }
}

impl PointSource {
    pub fn new(number_of_points: usize, center: Vec3, radius: f64) -> Self {
        Self {
            number_of_points,
            center,
            radius,
            ..Self::default()
        }
    }

    pub fn set_number_of_points(&mut self, n: usize) {
        self.number_of_points = n;
        self.modified();
    }

    pub fn set_distribution(&mut self, distribution: PointDistribution) {
        self.distribution = distribution;
        self.modified();
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
        self.modified();
    }

    pub fn generate(&self) -> PolyData {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut out = PolyData::new();
        out.points.reserve(self.number_of_points);
        for _ in 0..self.number_of_points {
            let cos_phi: f64 = rng.gen_range(-1.0..=1.0);
            let theta: f64 = rng.gen_range(0.0..2.0 * PI);
            let r = match self.distribution {
                PointDistribution::Uniform => self.radius * rng.gen::<f64>().cbrt(),
                PointDistribution::Shell => self.radius,
            };
            let sin_phi = (1.0 - cos_phi * cos_phi).max(0.0).sqrt();
            let dir = [sin_phi * theta.cos(), sin_phi * theta.sin(), cos_phi];
            out.points.push(math::add(self.center, math::scale(dir, r)));
        }
        if self.number_of_points > 0 {
            let ids: Vec<usize> = (0..self.number_of_points).collect();
            out.verts.insert_next_cell(&ids);
        }
        out
    }
}

impl Algorithm for PointSource {
    fn name(&self) -> &'static str {
        "PointSource"
    }

    fn number_of_input_ports(&self) -> usize {
        0
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::PolyData);
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let out = self.generate();
        ctx.set_output(0, out)
    }
}

/// Unstructured grid filling a block of `dims` unit boxes with one linear 3D cell
/// type: one hexahedron or voxel, six tetrahedra, two wedges or six pyramids (around
/// an extra center point) per box.
#[derive(Debug)]
pub struct CellTypeSource {
    object: Object,
    cell_type: CellType,
    dims: [usize; 3],
}

impl_observable!(CellTypeSource);

impl CellTypeSource {
    pub fn new(cell_type: CellType, dims: [usize; 3]) -> Result<Self> {
        check_block_type(cell_type)?;
        Ok(Self {
            object: Object::new(),
            cell_type,
            dims,
        })
    }

    pub fn set_cell_type(&mut self, cell_type: CellType) -> Result<()> {
        check_block_type(cell_type)?;
        self.cell_type = cell_type;
        self.modified();
        Ok(())
    }

    pub fn set_dimensions(&mut self, dims: [usize; 3]) {
        self.dims = dims;
        self.modified();
    }

    pub fn generate(&self) -> Result<UnstructuredGrid> {
        let [nx, ny, nz] = self.dims;
        let mut points = Points::new();
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    points.push([i as f64, j as f64, k as f64]);
                }
            }
        }
        let corner = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);
        let mut grid = UnstructuredGrid::with_points(points);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    // hexahedron ordering
                    let h = [
                        corner(i, j, k),
                        corner(i + 1, j, k),
                        corner(i + 1, j + 1, k),
                        corner(i, j + 1, k),
                        corner(i, j, k + 1),
                        corner(i + 1, j, k + 1),
                        corner(i + 1, j + 1, k + 1),
                        corner(i, j + 1, k + 1),
                    ];
                    self.fill_box(&mut grid, h, [i as f64 + 0.5, j as f64 + 0.5, k as f64 + 0.5])?;
                }
            }
        }
        Ok(grid)
    }

    fn fill_box(&self, grid: &mut UnstructuredGrid, h: [usize; 8], center: Vec3) -> Result<()> {
        match self.cell_type {
            CellType::Hexahedron => {
                grid.insert_next_cell(CellType::Hexahedron, &h)?;
            }
            CellType::Voxel => {
                grid.insert_next_cell(CellType::Voxel, &[h[0], h[1], h[3], h[2], h[4], h[5], h[7], h[6]])?;
            }
            CellType::Tetra => {
                for [b, c] in [[1, 2], [1, 5], [3, 2], [3, 7], [4, 5], [4, 7]] {
                    let mut tet = [h[0], h[b], h[c], h[6]];
                    let [p0, p1, p2, p3] = tet.map(|id| grid.points.get(id));
                    let m = [math::sub(p1, p0), math::sub(p2, p0), math::sub(p3, p0)];
                    if math::determinant3(&m) < 0.0 {
                        tet.swap(1, 2);
                    }
                    grid.insert_next_cell(CellType::Tetra, &tet)?;
                }
            }
            CellType::Wedge => {
                grid.insert_next_cell(CellType::Wedge, &[h[0], h[3], h[1], h[4], h[7], h[5]])?;
                grid.insert_next_cell(CellType::Wedge, &[h[1], h[3], h[2], h[5], h[7], h[6]])?;
            }
            CellType::Pyramid => {
                let apex = grid.points.push(center);
                for face in CellType::Hexahedron.faces() {
                    grid.insert_next_cell(CellType::Pyramid, &[h[face[3]], h[face[2]], h[face[1]], h[face[0]], apex])?;
                }
            }
            other => return Err(Error::invalid_argument(format!("{other:?} cannot fill a block"))),
        }
        Ok(())
    }
}

fn check_block_type(cell_type: CellType) -> Result<()> {
    if cell_type.is_linear_3d() {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!("{cell_type:?} is not a linear 3D cell")))
    }
}

impl Algorithm for CellTypeSource {
    fn name(&self) -> &'static str {
        "CellTypeSource"
    }

    fn number_of_input_ports(&self) -> usize {
        0
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::Unstructured);
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let out = self.generate()?;
        ctx.set_output(0, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataObject;
    use crate::pipeline::{Pipeline, UpdateRequest};

    use std::collections::HashMap;

    #[test]
    fn wavelet_peaks_at_center() {
        let source = ImageSource::default();
        let image = source.generate(&source.whole_extent()).unwrap();
        assert_eq!(image.dimensions(), [21, 21, 21]);
        let rt = image.point_data.get("RTData").unwrap();
        let center = image.point_id(0, 0, 0);
        assert!((rt.component(center, 0) - (255.0 + 5.0)).abs() < 1e-9);
        let [lo, hi] = rt.range(0).unwrap();
        assert!(lo > 30.0 && hi <= 277.0);
    }

    #[test]
    fn streamed_extent_matches_whole_image() {
        let mut p = Pipeline::new();
        let src = p.add(ImageSource::default());
        p.update_with(src, 0, UpdateRequest::extent([0, 3, -2, 2, 5, 5])).unwrap();
        let piece = p.output(src, 0).unwrap();
        let piece = piece.as_image().unwrap();
        let whole = ImageSource::default().generate(&[-10, 10, -10, 10, -10, 10]).unwrap();
        let (a, b) = (piece.point_data.scalars().unwrap(), whole.point_data.scalars().unwrap());
        assert_eq!(a.component(piece.point_id(2, 1, 5), 0), b.component(whole.point_id(2, 1, 5), 0));
    }

    #[test]
    fn sphere_is_closed_and_outward() {
        let sphere = SphereSource::new([1.0, 0.0, 0.0], 2.0).generate().unwrap();
        assert_eq!(sphere.number_of_points(), 2 + 8 * 6);
        assert_eq!(sphere.polys.number_of_cells(), 2 * 8 * 6);
        let mut edges: HashMap<(usize, usize), usize> = HashMap::new();
        for (tri, _) in sphere.triangles() {
            let [a, b, c] = tri.map(|i| sphere.point(i));
            let n = math::cross(math::sub(b, a), math::sub(c, a));
            let centroid = math::scale(math::add(a, math::add(b, c)), 1.0 / 3.0);
            assert!(math::dot(n, math::sub(centroid, [1.0, 0.0, 0.0])) > 0.0);
            for e in 0..3 {
                let (u, v) = (tri[e], tri[(e + 1) % 3]);
                *edges.entry((u.min(v), u.max(v))).or_default() += 1;
            }
        }
        assert!(edges.values().all(|&c| c == 2));
    }

    #[test]
    fn plane_has_quads_and_tcoords() {
        let mut plane = PlaneSource::new();
        plane.set_resolution(3, 2);
        let out = plane.generate().unwrap();
        assert_eq!(out.number_of_points(), 12);
        assert_eq!(out.polys.number_of_cells(), 6);
        assert_eq!(out.point_data.tcoords().unwrap().tuple(11), vec![1.0, 1.0]);
        assert_eq!(out.point_data.normals().unwrap().tuple3(0), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn point_source_is_reproducible() {
        let mut a = PointSource::new(100, [0.0; 3], 1.0);
        a.set_seed(7);
        let mut b = PointSource::new(100, [0.0; 3], 1.0);
        b.set_seed(7);
        assert_eq!(a.generate(), b.generate());
        a.set_distribution(PointDistribution::Shell);
        for p in a.generate().points.iter() {
            assert!((math::norm(p) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn blocks_fill_the_volume() {
        for ty in [CellType::Tetra, CellType::Voxel, CellType::Hexahedron, CellType::Wedge, CellType::Pyramid] {
            let grid = CellTypeSource::new(ty, [2, 3, 1]).unwrap().generate().unwrap();
            grid.validate().unwrap();
            let data = DataObject::from(grid);
            let volume: f64 = (0..data.number_of_cells())
                .map(|c| {
                    let cell = data.cell(c).unwrap();
                    let crate::filters::Simplices::Tetras(tets) = crate::filters::simplices(&cell) else {
                        panic!("{ty:?} did not split")
                    };
                    tets.iter()
                        .map(|t| {
                            let [a, b, c, d] = t.map(|i| data.point(i).unwrap());
                            math::determinant3(&[math::sub(b, a), math::sub(c, a), math::sub(d, a)]).abs() / 6.0
                        })
                        .sum::<f64>()
                })
                .sum();
            assert!((volume - 6.0).abs() < 1e-9, "{ty:?}: {volume}");
        }
        assert!(CellTypeSource::new(CellType::Triangle, [1, 1, 1]).is_err());
    }
}
