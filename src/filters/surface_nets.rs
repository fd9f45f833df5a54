//! Boundaries between the regions of a label image.
//!
//! Every pixel (2D) or voxel (3D) whose corner labels differ gets one dual point at
//! its center. Each lattice edge joining two different labels produces the dual cell
//! of that edge: a line segment in 2D, a quad in 3D. The cell is oriented so its
//! normal points from the first label of its `BoundaryLabels` pair towards the
//! second. A constrained relaxation then smooths the dual points.
//!
//! The image is padded by one layer of voxels, so edges on the image border also
//! get their dual cells; those reach half a voxel past the border. Regions touching
//! the border are left open there.

use crate::array::DataArray;
use crate::data::{AttributeRole, DataKind, ImageData, PolyData};
use crate::math::{self, Vec3};
use crate::object::{Object, Observable};
use crate::pipeline::{Algorithm, ExecutionContext, Information};
use crate::utils::impl_observable;
use crate::{Error, Result};

use std::collections::HashMap;

/// Cell type of the 3D boundary surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceNetsOutput {
    #[default]
    Quads,
    Triangles,
}

#[derive(Debug, Clone)]
struct NetSettings {
    array: Option<String>,
    labels: Vec<f64>,
    background: f64,
    exclude_background: bool,
    smoothing: bool,
    iterations: usize,
    relaxation: f64,
    /// in units of the smallest image spacing
    constraint_distance: f64,
}

impl Default for NetSettings {
    fn default() -> Self {
        Self {
            array: None,
            labels: Vec::new(),
            background: 0.0,
            exclude_background: false,
            smoothing: true,
            iterations: 16,
            relaxation: 0.5,
            constraint_distance: 0.5,
        }
    }
}

impl NetSettings {
    /// Labels outside the selection become background. An empty selection keeps all.
    fn classify(&self, value: f64) -> f64 {
        if self.labels.is_empty() || self.labels.contains(&value) {
            value
        } else {
            self.background
        }
    }

    /// `(lower selected label, other label)`, background last.
    fn pair(&self, a: f64, b: f64) -> Option<[f64; 2]> {
        if a == b {
            return None;
        }
        let bg = self.background;
        if a == bg || b == bg {
            if self.exclude_background {
                return None;
            }
            return Some([if a == bg { b } else { a }, bg]);
        }
        Some([a.min(b), a.max(b)])
    }

    fn label_values(&self, image: &ImageData) -> Result<Vec<f64>> {
        let attributes = &image.point_data;
        let array = match &self.array {
            Some(name) => attributes.get(name),
            None => attributes.attribute(AttributeRole::Scalars),
        }
        .ok_or_else(|| Error::pipeline("no label array on the input image"))?;
        if array.number_of_tuples() != image.number_of_points() {
            return Err(Error::invalid_argument(format!(
                "label array `{}` has {} tuples for {} points",
                array.name().unwrap_or_default(),
                array.number_of_tuples(),
                image.number_of_points()
            )));
        }
        Ok((0..array.number_of_tuples())
            .map(|t| self.classify(array.component(t, 0)))
            .collect())
    }
}

#[derive(Debug, Default)]
struct Net {
    points: Vec<Vec3>,
    cells: Vec<Vec<usize>>,
    labels: Vec<[f64; 2]>,
    duals: HashMap<usize, usize>,
}

impl Net {
    /// Dual point of `voxel`; coordinates run from -1 to `dims - 1` on active axes.
    fn dual(&mut self, image: &ImageData, voxel: [i64; 3], active: &[usize]) -> usize {
        let dims = image.dimensions().map(|d| d as i64 + 1);
        let key = ((voxel[0] + 1) + dims[0] * ((voxel[1] + 1) + dims[1] * (voxel[2] + 1))) as usize;
        let points = &mut self.points;
        *self.duals.entry(key).or_insert_with(|| {
            let mut ijk = [0.0; 3];
            for axis in 0..3 {
                ijk[axis] = (voxel[axis] + image.extent[2 * axis] as i64) as f64;
                if active.contains(&axis) {
                    ijk[axis] += 0.5;
                }
            }
            points.push(image.index_to_world(ijk));
            points.len() - 1
        })
    }

    fn extract(settings: &NetSettings, image: &ImageData, active: &[usize]) -> Result<Self> {
        let dims = image.dimensions();
        let values = settings.label_values(image)?;
        let id = |p: [usize; 3]| p[0] + dims[0] * (p[1] + dims[1] * p[2]);
        let mut net = Net::default();
        for k in 0..dims[2] {
            for j in 0..dims[1] {
                for i in 0..dims[0] {
                    let p = [i, j, k];
                    for (slot, &a) in active.iter().enumerate() {
                        if p[a] + 1 >= dims[a] {
                            continue;
                        }
                        let mut q = p;
                        q[a] += 1;
                        let lp = values[id(p)];
                        let Some(pair) = settings.pair(lp, values[id(q)]) else {
                            continue;
                        };
                        let p = p.map(|v| v as i64);
                        let mut voxels = if active.len() == 2 {
                            let v = active[1 - slot];
                            let mut lower = p;
                            lower[v] -= 1;
                            if slot == 0 {
                                vec![lower, p]
                            } else {
                                vec![p, lower]
                            }
                        } else {
                            let (b, c) = ((a + 1) % 3, (a + 2) % 3);
                            let at = |db: i64, dc: i64| {
                                let mut x = p;
                                x[b] -= db;
                                x[c] -= dc;
                                x
                            };
                            vec![at(1, 1), at(0, 1), at(0, 0), at(1, 0)]
                        };
                        if pair[0] != lp {
                            voxels.reverse();
                        }
                        let ids = voxels.into_iter().map(|v| net.dual(image, v, active)).collect();
                        net.cells.push(ids);
                        net.labels.push(pair);
                    }
                }
            }
        }
        Ok(net)
    }

    /// Laplacian relaxation; no point moves further than `distance` from where it
    /// started.
    fn smooth(&mut self, iterations: usize, relaxation: f64, distance: f64) {
        let mut neighbors = vec![Vec::new(); self.points.len()];
        for cell in &self.cells {
            let n = cell.len();
            let edges = if n == 2 { 1 } else { n };
            for e in 0..edges {
                let (a, b) = (cell[e], cell[(e + 1) % n]);
                neighbors[a].push(b);
                neighbors[b].push(a);
            }
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }
        let initial = self.points.clone();
        for _ in 0..iterations {
            let current = self.points.clone();
            for (id, list) in neighbors.iter().enumerate() {
                if list.is_empty() {
                    continue;
                }
                let w = 1.0 / list.len() as f64;
                let mean = list
                    .iter()
                    .fold([0.0; 3], |acc, &n| math::add(acc, math::scale(current[n], w)));
                let mut x = math::lerp(current[id], mean, relaxation);
                let offset = math::sub(x, initial[id]);
                let len = math::norm(offset);
                if len > distance {
                    x = math::add(initial[id], math::scale(offset, distance / len));
                }
                self.points[id] = x;
            }
        }
    }
}

fn active_axes(image: &ImageData, dimension: usize) -> Result<Vec<usize>> {
    let dims = image.dimensions();
    let active: Vec<usize> = (0..3).filter(|&a| dims[a] > 1).collect();
    if active.len() != dimension {
        return Err(Error::invalid_argument(format!(
            "expected a {dimension}D image, got dimensions {dims:?}"
        )));
    }
    Ok(active)
}

fn run(settings: &NetSettings, image: &ImageData, dimension: usize) -> Result<Net> {
    let active = active_axes(image, dimension)?;
    let mut net = Net::extract(settings, image, &active)?;
    if settings.smoothing && settings.iterations > 0 {
        let spacing = active
            .iter()
            .map(|&a| image.spacing[a].abs())
            .fold(f64::INFINITY, f64::min);
        net.smooth(settings.iterations, settings.relaxation, settings.constraint_distance * spacing);
    }
    tracing::debug!(
        points = net.points.len(),
        cells = net.cells.len(),
        dimension,
        "surface nets"
    );
    Ok(net)
}

macro_rules! net_setters {
    ($ty:ty) => {
        impl $ty {
            pub fn new() -> Self {
                Self::default()
            }

            /// Label array; the active point scalars when unset.
            pub fn set_input_array(&mut self, name: Option<&str>) {
                self.settings.array = name.map(str::to_string);
                self.modified();
            }

            /// Labels to extract. Unselected labels are treated as background.
            pub fn set_labels(&mut self, labels: &[f64]) {
                self.settings.labels = labels.to_vec();
                self.modified();
            }

            pub fn labels(&self) -> &[f64] {
                &self.settings.labels
            }

            pub fn set_background_label(&mut self, label: f64) {
                self.settings.background = label;
                self.modified();
            }

            /// Skip boundaries against the background label.
            pub fn set_exclude_background(&mut self, on: bool) {
                self.settings.exclude_background = on;
                self.modified();
            }

            pub fn set_smoothing(&mut self, on: bool) {
                self.settings.smoothing = on;
                self.modified();
            }

            pub fn set_number_of_iterations(&mut self, iterations: usize) {
                self.settings.iterations = iterations;
                self.modified();
            }

            pub fn set_relaxation_factor(&mut self, factor: f64) {
                self.settings.relaxation = factor;
                self.modified();
            }

            /// Maximum displacement while smoothing, in units of the smallest spacing.
            pub fn set_constraint_distance(&mut self, distance: f64) {
                self.settings.constraint_distance = distance.max(0.0);
                self.modified();
            }
        }
    };
}

/// Boundary line segments of a 2D label image.
#[derive(Debug, Default)]
pub struct SurfaceNets2D {
    object: Object,
    settings: NetSettings,
}

impl_observable!(SurfaceNets2D);
net_setters!(SurfaceNets2D);

impl SurfaceNets2D {
    pub fn extract(&self, image: &ImageData) -> Result<PolyData> {
        let net = run(&self.settings, image, 2)?;
        let mut out = PolyData::new();
        out.points = crate::data::Points::from_vec(net.points);
        for cell in &net.cells {
            out.lines.insert_next_cell(cell);
        }
        out.cell_data.add_array(DataArray::from_tuples("BoundaryLabels", net.labels));
        Ok(out)
    }
}

/// Boundary surfaces of a 3D label image.
#[derive(Debug, Default)]
pub struct SurfaceNets3D {
    object: Object,
    settings: NetSettings,
    output: SurfaceNetsOutput,
}

impl_observable!(SurfaceNets3D);
net_setters!(SurfaceNets3D);

impl SurfaceNets3D {
    pub fn set_output_type(&mut self, output: SurfaceNetsOutput) {
        self.output = output;
        self.modified();
    }

    pub fn extract(&self, image: &ImageData) -> Result<PolyData> {
        let net = run(&self.settings, image, 3)?;
        let mut out = PolyData::new();
        out.points = crate::data::Points::from_vec(net.points);
        let mut labels = Vec::with_capacity(net.labels.len());
        for (quad, pair) in net.cells.iter().zip(net.labels) {
            match self.output {
                SurfaceNetsOutput::Quads => {
                    out.polys.insert_next_cell(quad);
                    labels.push(pair);
                }
                SurfaceNetsOutput::Triangles => {
                    out.polys.insert_next_cell(&[quad[0], quad[1], quad[2]]);
                    out.polys.insert_next_cell(&[quad[0], quad[2], quad[3]]);
                    labels.extend([pair, pair]);
                }
            }
        }
        out.cell_data.add_array(DataArray::from_tuples("BoundaryLabels", labels));
        Ok(out)
    }
}

macro_rules! image_to_poly_data {
    ($ty:ty, $name:literal) => {
        impl Algorithm for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn input_kind(&self, _port: usize) -> DataKind {
                DataKind::Image
            }

            fn request_information(
                &mut self,
                _inputs: &[Vec<Information>],
                outputs: &mut [Information],
            ) -> Result<()> {
                outputs[0] = Information::of_kind(DataKind::PolyData);
                Ok(())
            }

            fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
                let image = ctx
                    .input(0)?
                    .as_image()
                    .ok_or_else(|| Error::pipeline("expected image data"))?;
                let out = self.extract(image)?;
                ctx.set_output(0, out)
            }
        }
    };
}

image_to_poly_data!(SurfaceNets2D, "SurfaceNets2D");
image_to_poly_data!(SurfaceNets3D, "SurfaceNets3D");

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn labelled(dims: [usize; 3], label: impl Fn([f64; 3]) -> f64) -> ImageData {
        let mut image = ImageData::with_dimensions(dims, [0.0; 3], [1.0; 3]);
        image.fill_point_scalars("labels", label).unwrap();
        image
    }

    fn ball(p: [f64; 3]) -> f64 {
        if math::distance2(p, [5.0; 3]) <= 9.0 {
            1.0
        } else {
            0.0
        }
    }

    fn edge_counts(out: &PolyData) -> HashMap<(usize, usize), usize> {
        let mut counts = HashMap::new();
        for cell in out.polys.iter() {
            for e in 0..cell.len() {
                let (a, b) = (cell[e], cell[(e + 1) % cell.len()]);
                *counts.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        counts
    }

    #[test]
    fn ball_gives_closed_outward_surface() {
        let image = labelled([11, 11, 11], ball);
        let mut nets = SurfaceNets3D::new();
        nets.set_smoothing(false);
        let out = nets.extract(&image).unwrap();
        assert!(out.polys.number_of_cells() > 0);
        assert!(edge_counts(&out).values().all(|&n| n == 2));

        let labels = out.cell_data.get("BoundaryLabels").unwrap();
        for c in 0..labels.number_of_tuples() {
            assert_eq!(labels.tuple(c), vec![1.0, 0.0]);
        }
        let volume: f64 = out
            .triangles()
            .iter()
            .map(|(t, _)| {
                let [a, b, c] = t.map(|i| out.points.get(i));
                math::dot(a, math::cross(b, c)) / 6.0
            })
            .sum();
        assert!(volume > 0.0);
    }

    #[test]
    fn smoothing_respects_constraint() {
        let image = labelled([11, 11, 11], ball);
        let mut nets = SurfaceNets3D::new();
        nets.set_smoothing(false);
        let raw = nets.extract(&image).unwrap();
        nets.set_smoothing(true);
        nets.set_constraint_distance(0.25);
        let smooth = nets.extract(&image).unwrap();
        assert_eq!(raw.number_of_points(), smooth.number_of_points());
        let mut moved = false;
        for (a, b) in raw.points.iter().zip(smooth.points.iter()) {
            let d = math::distance2(a, b).sqrt();
            assert!(d <= 0.25 + 1e-12);
            moved |= d > 1e-6;
        }
        assert!(moved);
    }

    #[test]
    fn label_pairs_and_selection() {
        // label 1 for x < 4, label 2 for 4 <= x < 8, background beyond
        let image = labelled([11, 6, 6], |p| {
            if p[0] < 4.0 {
                1.0
            } else if p[0] < 8.0 {
                2.0
            } else {
                0.0
            }
        });
        let pairs = |nets: &SurfaceNets3D| {
            let out = nets.extract(&image).unwrap();
            let labels = out.cell_data.get("BoundaryLabels").unwrap();
            let mut pairs: Vec<Vec<f64>> = (0..labels.number_of_tuples()).map(|c| labels.tuple(c)).collect();
            pairs.sort_by(|a, b| a.partial_cmp(b).unwrap());
            pairs.dedup();
            pairs
        };

        let mut nets = SurfaceNets3D::new();
        assert_eq!(pairs(&nets), vec![vec![1.0, 2.0], vec![2.0, 0.0]]);
        nets.set_exclude_background(true);
        assert_eq!(pairs(&nets), vec![vec![1.0, 2.0]]);
        nets.set_exclude_background(false);
        nets.set_labels(&[2.0]);
        assert_eq!(pairs(&nets), vec![vec![2.0, 0.0]]);
        assert_eq!(nets.labels(), &[2.0]);
    }

    #[test]
    fn triangle_output_doubles_cells() {
        let image = labelled([11, 11, 11], ball);
        let mut nets = SurfaceNets3D::new();
        let quads = nets.extract(&image).unwrap();
        nets.set_output_type(SurfaceNetsOutput::Triangles);
        let tris = nets.extract(&image).unwrap();
        assert_eq!(tris.polys.number_of_cells(), 2 * quads.polys.number_of_cells());
        assert_eq!(
            tris.cell_data.get("BoundaryLabels").unwrap().number_of_tuples(),
            tris.polys.number_of_cells()
        );
    }

    #[test]
    fn regions_reach_past_the_border() {
        let image = labelled([4, 4, 4], |p| if p[0] < 1.5 { 1.0 } else { 0.0 });
        let mut nets = SurfaceNets3D::new();
        nets.set_smoothing(false);
        let out = nets.extract(&image).unwrap();
        assert_eq!(out.polys.number_of_cells(), 16);
        assert_eq!(out.number_of_points(), 25);
        assert_eq!(out.bounds(), [1.5, 1.5, -0.5, 3.5, -0.5, 3.5]);
        // open only along the image border
        let counts = edge_counts(&out);
        assert_eq!(counts.values().filter(|&&n| n == 1).count(), 16);

        let flat = labelled([4, 4, 1], |p| if p[0] < 1.5 { 1.0 } else { 0.0 });
        let line = SurfaceNets2D::new().extract(&flat).unwrap();
        assert_eq!(line.lines.number_of_cells(), 4);
        assert_eq!(line.number_of_points(), 5);
    }

    #[test]
    fn square_gives_closed_loop() {
        let image = labelled([10, 10, 1], |p| {
            if (3.0..=6.0).contains(&p[0]) && (3.0..=6.0).contains(&p[1]) {
                4.0
            } else {
                0.0
            }
        });
        let out = SurfaceNets2D::new().extract(&image).unwrap();
        assert_eq!(out.lines.number_of_cells(), 16);
        let mut degree = vec![0; out.number_of_points()];
        for line in out.lines.iter() {
            degree[line[0]] += 1;
            degree[line[1]] += 1;
        }
        assert!(degree.iter().all(|&d| d == 2));
        assert!(SurfaceNets3D::new().extract(&image).is_err());
    }
}
