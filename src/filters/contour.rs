//! Isosurfaces with marching tetrahedra.
//!
//! Linear 3D cells are split into tetrahedra and each tetrahedron is contoured with
//! the 16 entry case table (by symmetry: no crossing, one vertex cut off, or two
//! vertices split from the other two). 2D cells are split into triangles and give
//! line segments. Points are created on mesh edges and shared by the edge key.

use super::implicit::ImplicitFunction;
use super::{point_scalars, simplices, PointBuilder, Simplices};
use crate::array::DataArray;
use crate::data::{DataKind, DataObject, ImageData, Points, PolyData};
use crate::math::{self, Vec3};
use crate::object::{Object, Observable};
use crate::pipeline::{Algorithm, CellStreaming, ExecutionContext, Information, UpdateRequest};
use crate::utils::impl_observable;
use crate::{Error, Result};

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

/// `(low point id, high point id, contour value index)`
pub(crate) type EdgeKey = (usize, usize, usize);

/// Output of contouring a range of cells, with points local to the batch.
#[derive(Debug, Default)]
pub(crate) struct IsoBatch {
    pub points: Vec<Vec3>,
    /// the edge and the parameter along it of each point
    pub origins: Vec<(usize, usize, f64)>,
    pub keys: Vec<EdgeKey>,
    pub triangles: Vec<[usize; 3]>,
    pub triangle_cells: Vec<usize>,
    pub lines: Vec<[usize; 2]>,
    pub line_cells: Vec<usize>,
}

struct EdgePoints<'a> {
    data: &'a DataObject,
    scalars: &'a [f64],
    lookup: HashMap<EdgeKey, usize>,
}

impl<'a> EdgePoints<'a> {
    fn point(&mut self, batch: &mut IsoBatch, a: usize, b: usize, value: f64, value_index: usize) -> usize {
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        let key = (a, b, value_index);
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }
        let (sa, sb) = (self.scalars[a], self.scalars[b]);
        let t = if sb == sa { 0.5 } else { (value - sa) / (sb - sa) };
        let pa = self.data.point(a).unwrap_or_default();
        let pb = self.data.point(b).unwrap_or_default();
        batch.points.push(math::lerp(pa, pb, t));
        batch.origins.push((a, b, t));
        batch.keys.push(key);
        let id = batch.points.len() - 1;
        self.lookup.insert(key, id);
        id
    }
}

/// Orient `tri` so its normal points towards `above`.
fn orient(batch: &IsoBatch, tri: [usize; 3], above: Vec3) -> [usize; 3] {
    let [a, b, c] = tri.map(|i| batch.points[i]);
    let n = math::cross(math::sub(b, a), math::sub(c, a));
    let centroid = math::scale(math::add(a, math::add(b, c)), 1.0 / 3.0);
    if math::dot(n, math::sub(above, centroid)) < 0.0 {
        [tri[0], tri[2], tri[1]]
    } else {
        tri
    }
}

/// Contour `cells` of `data` at every value. With `merge` off, cells do not share
/// points.
pub(crate) fn contour_cells(data: &DataObject, scalars: &[f64], values: &[f64], cells: Range<usize>, merge: bool) -> IsoBatch {
    let mut batch = IsoBatch::default();
    let mut edges = EdgePoints {
        data,
        scalars,
        lookup: HashMap::new(),
    };
    for cell_id in cells {
        let Some(cell) = data.cell(cell_id) else { continue };
        let pieces = simplices(&cell);
        if !merge {
            edges.lookup.clear();
        }
        for (vi, &value) in values.iter().enumerate() {
            match &pieces {
                Simplices::Tetras(tets) => {
                    for tet in tets {
                        contour_tet(&mut edges, &mut batch, *tet, value, vi, cell_id);
                    }
                }
                Simplices::Triangles(tris) => {
                    for tri in tris {
                        contour_triangle(&mut edges, &mut batch, *tri, value, vi, cell_id);
                    }
                }
                Simplices::Unsupported => {}
            }
        }
    }
    batch
}

fn contour_tet(edges: &mut EdgePoints<'_>, batch: &mut IsoBatch, tet: [usize; 4], value: f64, vi: usize, cell_id: usize) {
    let above: Vec<usize> = tet.iter().copied().filter(|&p| edges.scalars[p] >= value).collect();
    let below: Vec<usize> = tet.iter().copied().filter(|&p| edges.scalars[p] < value).collect();
    if above.is_empty() || below.is_empty() {
        return;
    }
    let above_center = {
        let pts: Vec<Vec3> = above.iter().map(|&p| edges.data.point(p).unwrap_or_default()).collect();
        let sum = pts.iter().fold([0.0; 3], |acc, p| math::add(acc, *p));
        math::scale(sum, 1.0 / pts.len() as f64)
    };
    match (above.len(), below.len()) {
        (1, 3) | (3, 1) => {
            let (lone, others) = if above.len() == 1 { (above[0], &below) } else { (below[0], &above) };
            let tri = [
                edges.point(batch, lone, others[0], value, vi),
                edges.point(batch, lone, others[1], value, vi),
                edges.point(batch, lone, others[2], value, vi),
            ];
            let tri = orient(batch, tri, above_center);
            batch.triangles.push(tri);
            batch.triangle_cells.push(cell_id);
        }
        _ => {
            let q = [
                edges.point(batch, above[0], below[0], value, vi),
                edges.point(batch, above[0], below[1], value, vi),
                edges.point(batch, above[1], below[1], value, vi),
                edges.point(batch, above[1], below[0], value, vi),
            ];
            let first = orient(batch, [q[0], q[1], q[2]], above_center);
            let flipped = first != [q[0], q[1], q[2]];
            let second = if flipped { [q[0], q[3], q[2]] } else { [q[0], q[2], q[3]] };
            batch.triangles.push(first);
            batch.triangles.push(second);
            batch.triangle_cells.push(cell_id);
            batch.triangle_cells.push(cell_id);
        }
    }
}

fn contour_triangle(edges: &mut EdgePoints<'_>, batch: &mut IsoBatch, tri: [usize; 3], value: f64, vi: usize, cell_id: usize) {
    let above: Vec<usize> = tri.iter().copied().filter(|&p| edges.scalars[p] >= value).collect();
    let below: Vec<usize> = tri.iter().copied().filter(|&p| edges.scalars[p] < value).collect();
    if above.is_empty() || below.is_empty() {
        return;
    }
    let (lone, others) = if above.len() == 1 { (above[0], &below) } else { (below[0], &above) };
    let a = edges.point(batch, lone, others[0], value, vi);
    let b = edges.point(batch, lone, others[1], value, vi);
    batch.lines.push([a, b]);
    batch.line_cells.push(cell_id);
}

/// Stitch batches into one polydata, interpolating point data along the edges.
pub(crate) fn assemble(data: &DataObject, batches: Vec<IsoBatch>, merge: bool) -> PolyData {
    let empty = Default::default();
    let source = data.point_data().unwrap_or(&empty);
    let mut builder = PointBuilder::new(source);
    let mut global: HashMap<EdgeKey, usize> = HashMap::new();
    let mut out = PolyData::new();
    let mut line_cells = Vec::new();
    let mut triangle_cells = Vec::new();

    for batch in batches {
        let map: Vec<usize> = (0..batch.points.len())
            .map(|i| {
                let (a, b, t) = batch.origins[i];
                let add = |builder: &mut PointBuilder<'_>| builder.interpolate(batch.points[i], &[a, b], &[1.0 - t, t]);
                if merge {
                    *global.entry(batch.keys[i]).or_insert_with(|| add(&mut builder))
                } else {
                    add(&mut builder)
                }
            })
            .collect();
        for line in &batch.lines {
            out.lines.insert_next_cell(&line.map(|i| map[i]));
        }
        for tri in &batch.triangles {
            out.polys.insert_next_cell(&tri.map(|i| map[i]));
        }
        line_cells.extend_from_slice(&batch.line_cells);
        triangle_cells.extend_from_slice(&batch.triangle_cells);
    }

    out.points = Points::from_vec(builder.points);
    out.point_data = builder.point_data;
    if let Some(cell_data) = data.cell_data() {
        line_cells.extend_from_slice(&triangle_cells);
        out.cell_data = cell_data.extract(&line_cells);
    }
    out
}

/// Central differences of the point scalars of an image, in world coordinates.
fn image_gradients(image: &ImageData, scalars: &DataArray) -> Result<Vec<Vec3>> {
    let s = image.array3(scalars, 0)?;
    let (nx, ny, nz) = s.dim();
    let dims = [nx, ny, nz];
    let mut out = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let idx = [i, j, k];
                let mut g = [0.0; 3];
                for axis in 0..3 {
                    if dims[axis] < 2 {
                        continue;
                    }
                    let (mut lo, mut hi) = (idx, idx);
                    lo[axis] = idx[axis].saturating_sub(1);
                    hi[axis] = (idx[axis] + 1).min(dims[axis] - 1);
                    let h = (hi[axis] - lo[axis]) as f64 * image.spacing[axis];
                    g[axis] = (s[hi] - s[lo]) / h;
                }
                out.push(math::mat3_mul_vec(&image.direction, g));
            }
        }
    }
    Ok(out)
}

/// Per point normals: interpolated scalar gradients on images, averaged face normals
/// elsewhere.
fn add_normals(data: &DataObject, scalars: &DataArray, out: &mut PolyData, origins: &[(usize, usize, f64)]) -> Result<()> {
    let mut normals = vec![[0.0; 3]; out.number_of_points()];
    if let DataObject::Image(image) = data {
        if origins.len() == normals.len() {
            let gradients = image_gradients(image, scalars)?;
            for (n, &(a, b, t)) in normals.iter_mut().zip(origins) {
                *n = math::lerp(gradients[a], gradients[b], t);
            }
        }
    }
    let flat: Vec<f64> = unit_normals(normals, out).into_iter().flatten().collect();
    out.point_data.set_normals(DataArray::from_vec("Normals", 3, flat)?)?;
    Ok(())
}

/// Normalize `normals`. Zero vectors take the averaged normal of the faces around
/// the point, and +z when that is zero too.
fn unit_normals(mut normals: Vec<Vec3>, out: &PolyData) -> Vec<Vec3> {
    if normals.iter().any(|n| math::norm(*n) == 0.0) {
        let mut faces = vec![[0.0; 3]; normals.len()];
        for (tri, _) in out.triangles() {
            let [a, b, c] = tri.map(|i| out.point(i));
            let face = math::cross(math::sub(b, a), math::sub(c, a));
            for i in tri {
                faces[i] = math::add(faces[i], face);
            }
        }
        for (n, face) in normals.iter_mut().zip(faces) {
            if math::norm(*n) == 0.0 {
                *n = face;
            }
        }
    }
    normals
        .into_iter()
        .map(|n| if math::norm(n) > 0.0 { math::normalize(n) } else { [0.0, 0.0, 1.0] })
        .collect()
}

/// Linearly spaced values over `range`, both ends included.
pub(crate) fn generate_values(n: usize, range: [f64; 2]) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.5 * (range[0] + range[1])],
        _ => (0..n)
            .map(|i| range[0] + (range[1] - range[0]) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Point origins of an assembled, merged contour, in output order.
fn merged_origins(batch_origins: Vec<(EdgeKey, (usize, usize, f64))>) -> Vec<(usize, usize, f64)> {
    let mut seen = HashMap::new();
    let mut out = Vec::new();
    for (key, origin) in batch_origins {
        if seen.insert(key, ()).is_none() {
            out.push(origin);
        }
    }
    out
}

/// Isosurfaces (3D cells) and isolines (2D cells) of point scalars.
#[derive(Debug)]
pub struct ContourFilter {
    object: Object,
    values: Vec<f64>,
    array: Option<String>,
    compute_normals: bool,
    streaming: CellStreaming,
}

impl_observable!(ContourFilter);

impl Default for ContourFilter {
    fn default() -> Self {
        Self {
            object: Object::new(),
            values: Vec::new(),
            array: None,
            compute_normals: true,
            streaming: CellStreaming::new(),
        }
    }
}

impl ContourFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: &[f64]) -> Self {
        Self {
            values: values.to_vec(),
            ..Self::default()
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Set contour `i`, growing the list with zeros if needed.
    pub fn set_value(&mut self, i: usize, value: f64) {
        if i >= self.values.len() {
            self.values.resize(i + 1, 0.0);
        }
        self.values[i] = value;
        self.modified();
    }

    pub fn set_values(&mut self, values: &[f64]) {
        self.values = values.to_vec();
        self.modified();
    }

    /// `n` values evenly spread over `range`.
    pub fn generate_values(&mut self, n: usize, range: [f64; 2]) {
        self.values = generate_values(n, range);
        self.modified();
    }

    /// contour this point array instead of the active scalars
    pub fn set_input_array(&mut self, name: Option<&str>) {
        self.array = name.map(str::to_string);
        self.modified();
    }

    pub fn set_compute_normals(&mut self, on: bool) {
        self.compute_normals = on;
        self.modified();
    }

    /// Contour a dataset directly.
    pub fn contour(&self, data: &DataObject) -> Result<PolyData> {
        let scalars = point_scalars(data, self.array.as_deref())?;
        let values: Vec<f64> = (0..scalars.number_of_tuples()).map(|t| scalars.component(t, 0)).collect();
        if values.len() != data.number_of_points() {
            return Err(Error::invalid_argument(format!(
                "scalars have {} tuples for {} points",
                values.len(),
                data.number_of_points()
            )));
        }
        let batch = contour_cells(data, &values, &self.values, 0..data.number_of_cells(), true);
        let origins = merged_origins(batch.keys.iter().copied().zip(batch.origins.iter().copied()).collect());
        let mut out = assemble(data, vec![batch], true);
        if self.compute_normals && out.polys.number_of_cells() > 0 {
            add_normals(data, &scalars, &mut out, &origins)?;
        }
        Ok(out)
    }
}

impl Algorithm for ContourFilter {
    fn name(&self) -> &'static str {
        "ContourFilter"
    }

    fn can_stream(&self) -> bool {
        true
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::PolyData);
        outputs[0].can_stream = true;
        Ok(())
    }

    fn request_update_extent(&mut self, request: &UpdateRequest, inputs: &[Vec<Information>]) -> Vec<Vec<UpdateRequest>> {
        self.streaming.request_update_extent(request, inputs)
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let out = match self.streaming.cut(ctx.input(0)?)? {
            Some(input) => self.contour(&input)?,
            None => PolyData::new(),
        };
        tracing::debug!(values = self.values.len(), triangles = out.polys.number_of_cells(), "contoured");
        ctx.set_output(0, out)
    }
}

/// Cut a dataset with an implicit function: the contour of `F(x)` at the cut values.
#[derive(Debug)]
pub struct Cutter {
    object: Object,
    function: Arc<dyn ImplicitFunction>,
    values: Vec<f64>,
    streaming: CellStreaming,
}

impl_observable!(Cutter);

impl Cutter {
    pub fn new(function: impl ImplicitFunction + 'static) -> Self {
        Self {
            object: Object::new(),
            function: Arc::new(function),
            values: vec![0.0],
            streaming: CellStreaming::new(),
        }
    }

    pub fn set_function(&mut self, function: impl ImplicitFunction + 'static) {
        self.function = Arc::new(function);
        self.modified();
    }

    pub fn function(&self) -> &dyn ImplicitFunction {
        self.function.as_ref()
    }

    pub fn set_values(&mut self, values: &[f64]) {
        self.values = values.to_vec();
        self.modified();
    }

    pub fn generate_values(&mut self, n: usize, range: [f64; 2]) {
        self.values = generate_values(n, range);
        self.modified();
    }

    pub fn cut(&self, data: &DataObject) -> Result<PolyData> {
        let values: Vec<f64> = (0..data.number_of_points())
            .map(|i| data.point(i).map_or(0.0, |p| self.function.evaluate(p)))
            .collect();
        let batch = contour_cells(data, &values, &self.values, 0..data.number_of_cells(), true);
        Ok(assemble(data, vec![batch], true))
    }
}

impl Algorithm for Cutter {
    fn name(&self) -> &'static str {
        "Cutter"
    }

    fn can_stream(&self) -> bool {
        true
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::PolyData);
        outputs[0].can_stream = true;
        Ok(())
    }

    fn request_update_extent(&mut self, request: &UpdateRequest, inputs: &[Vec<Information>]) -> Vec<Vec<UpdateRequest>> {
        self.streaming.request_update_extent(request, inputs)
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let out = match self.streaming.cut(ctx.input(0)?)? {
            Some(input) => self.cut(&input)?,
            None => PolyData::new(),
        };
        ctx.set_output(0, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CellType, UnstructuredGrid};
    use crate::filters::implicit::Plane;

    fn sphere_image(n: usize) -> ImageData {
        let h = 2.0 / (n - 1) as f64;
        let mut image = ImageData::with_dimensions([n, n, n], [-1.0; 3], [h; 3]);
        image.fill_point_scalars("d", |p| math::norm(p)).unwrap();
        image
    }

    #[test]
    fn sphere_points_lie_near_radius() {
        let image = DataObject::from(sphere_image(21));
        let out = ContourFilter::with_values(&[0.6]).contour(&image).unwrap();
        assert!(out.polys.number_of_cells() > 100);
        out.validate().unwrap();
        for p in out.points.iter() {
            assert!((math::norm(p) - 0.6).abs() < 0.05, "{p:?}");
        }
        let scalars = out.point_data.get("d").unwrap();
        assert!(scalars.values_as_f64().iter().all(|v| (v - 0.6).abs() < 1e-9));
        let normals = out.point_data.normals().unwrap();
        for i in 0..out.number_of_points() {
            let n = normals.tuple3(i);
            let radial = math::normalize(out.point(i));
            assert!(math::dot(n, radial) > 0.9);
        }
    }

    #[test]
    fn zero_normals_fall_back_to_faces() {
        let mut poly = PolyData::with_points(Points::from_vec(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [5.0, 5.0, 5.0],
            [2.0, 2.0, 2.0],
        ]));
        poly.polys.insert_next_cell(&[0, 1, 2]);
        let normals = unit_normals(vec![[0.0; 3], [0.0; 3], [0.0; 3], [0.0; 3], [2.0, 0.0, 0.0]], &poly);
        assert_eq!(&normals[..3], &[[0.0, -1.0, 0.0]; 3]);
        assert_eq!(normals[3], [0.0, 0.0, 1.0]);
        assert_eq!(normals[4], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn merged_points_are_shared() {
        let image = DataObject::from(sphere_image(11));
        let out = ContourFilter::with_values(&[0.5]).contour(&image).unwrap();
        // a closed triangulated surface: every edge is used twice
        let mut edges: HashMap<(usize, usize), usize> = HashMap::new();
        for (tri, _) in out.triangles() {
            for e in 0..3 {
                let (a, b) = (tri[e], tri[(e + 1) % 3]);
                *edges.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        assert!(edges.values().all(|&c| c == 2));
    }

    #[test]
    fn tetra_cases() {
        let mut grid = UnstructuredGrid::with_points(Points::from_vec(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ]));
        grid.insert_next_cell(CellType::Tetra, &[0, 1, 2, 3]).unwrap();
        grid.point_data.set_scalars(DataArray::scalars("s", vec![0.0, 1.0, 1.0, 0.0])).unwrap();
        let data = DataObject::from(grid);
        let two = ContourFilter::with_values(&[0.5]).contour(&data).unwrap();
        assert_eq!((two.number_of_points(), two.polys.number_of_cells()), (4, 2));
        let one = ContourFilter::with_values(&[-1.0, 2.0]).contour(&data).unwrap();
        assert_eq!(one.number_of_cells(), 0);
    }

    #[test]
    fn cutting_a_cube_with_a_plane() {
        let image = DataObject::from(ImageData::with_dimensions([3, 3, 3], [0.0; 3], [1.0; 3]));
        let out = Cutter::new(Plane::new([0.0, 0.0, 0.5], [0.0, 0.0, 1.0])).cut(&image).unwrap();
        assert!(out.number_of_cells() > 0);
        for p in out.points.iter() {
            assert!((p[2] - 0.5).abs() < 1e-12);
        }
        let area: f64 = out
            .triangles()
            .iter()
            .map(|(t, _)| {
                let [a, b, c] = t.map(|i| out.point(i));
                0.5 * math::norm(math::cross(math::sub(b, a), math::sub(c, a)))
            })
            .sum();
        assert!((area - 4.0).abs() < 1e-9);
    }

    #[test]
    fn generated_values_include_ends() {
        assert_eq!(generate_values(3, [0.0, 1.0]), vec![0.0, 0.5, 1.0]);
        assert_eq!(generate_values(1, [0.0, 1.0]), vec![0.5]);
    }
}
