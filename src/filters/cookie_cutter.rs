//! Cut a planar mesh with closed loops, keeping what lies inside them.
//!
//! Everything happens in the xy-plane. Mesh cells are triangulated and each triangle
//! is intersected with each loop by Sutherland-Hodgman clipping (the triangle is the
//! convex clipping window). Output `z` comes from the mesh.

use super::PointBuilder;
use crate::data::{DataKind, DataObject, DataSetAttributes, Points, PolyData};
use crate::math::{self, Vec3};
use crate::object::{Object, Observable};
use crate::pipeline::{Algorithm, ExecutionContext, Information};
use crate::utils::impl_observable;
use crate::{Error, Result};

use std::collections::HashMap;

/// How attributes of output points are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointInterpolation {
    /// barycentric interpolation inside the mesh triangle
    #[default]
    MeshEdges,
    /// points on a loop take the loop's same-named arrays, interpolated along the loop
    /// edge; others interpolate the mesh
    LoopEdges,
}

#[derive(Debug)]
pub struct CookieCutter {
    object: Object,
    pass_cell_data: bool,
    interpolation: PointInterpolation,
}

impl_observable!(CookieCutter);

impl Default for CookieCutter {
    fn default() -> Self {
        Self {
            object: Object::new(),
            pass_cell_data: true,
            interpolation: PointInterpolation::MeshEdges,
        }
    }
}

type P2 = [f64; 2];

fn xy(p: Vec3) -> P2 {
    [p[0], p[1]]
}

fn cross2(o: P2, a: P2, b: P2) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Clip polygon `subject` to the counter-clockwise convex polygon `window`.
fn clip_polygon(subject: &[P2], window: &[P2]) -> Vec<P2> {
    let mut out = subject.to_vec();
    for e in 0..window.len() {
        if out.is_empty() {
            break;
        }
        let (a, b) = (window[e], window[(e + 1) % window.len()]);
        let input = std::mem::take(&mut out);
        for i in 0..input.len() {
            let (p, q) = (input[i], input[(i + 1) % input.len()]);
            let (dp, dq) = (cross2(a, b, p), cross2(a, b, q));
            if dp >= 0.0 {
                out.push(p);
            }
            if (dp >= 0.0) != (dq >= 0.0) {
                let t = dp / (dp - dq);
                out.push([p[0] + t * (q[0] - p[0]), p[1] + t * (q[1] - p[1])]);
            }
        }
    }
    out
}

/// Closed loops of the second input: polygons, and polylines (a repeated last point is
/// dropped).
fn loops_of(loops: &PolyData) -> Vec<Vec<usize>> {
    let mut out: Vec<Vec<usize>> = loops.polys.iter().map(|c| c.to_vec()).collect();
    for line in loops.lines.iter() {
        let mut ids = line.to_vec();
        if ids.len() > 1 && ids.first() == ids.last() {
            ids.pop();
        }
        out.push(ids);
    }
    out.retain(|ids| ids.len() >= 3);
    out
}

/// The loop edge `p` lies on: `(a, b, t)` with `p = a + t (b - a)`.
fn on_loop(p: P2, ring: &[usize], loops: &PolyData, tol: f64) -> Option<(usize, usize, f64)> {
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[(i + 1) % ring.len()]);
        let (pa, pb) = (xy(loops.point(a)), xy(loops.point(b)));
        let d = [pb[0] - pa[0], pb[1] - pa[1]];
        let len2 = d[0] * d[0] + d[1] * d[1];
        if len2 == 0.0 {
            continue;
        }
        let t = (((p[0] - pa[0]) * d[0] + (p[1] - pa[1]) * d[1]) / len2).clamp(0.0, 1.0);
        let q = [pa[0] + t * d[0], pa[1] + t * d[1]];
        if (p[0] - q[0]).hypot(p[1] - q[1]) <= tol {
            return Some((a, b, t));
        }
    }
    None
}

impl CookieCutter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pass_cell_data(&mut self, on: bool) {
        self.pass_cell_data = on;
        self.modified();
    }

    pub fn set_point_interpolation(&mut self, interpolation: PointInterpolation) {
        self.interpolation = interpolation;
        self.modified();
    }

    pub fn cut(&self, mesh: &PolyData, loops: &PolyData) -> Result<PolyData> {
        let bounds = mesh.bounds();
        let diag = if math::bounds_are_valid(&bounds) { math::bounds_diagonal(&bounds) } else { 1.0 };
        let tol = 1e-9 * diag.max(1.0);
        let rings = loops_of(loops);

        let mut builder = PointBuilder::new(&mesh.point_data);
        let mut merged: HashMap<(i64, i64), usize> = HashMap::new();
        let mut on_loops: Vec<(usize, usize, usize, f64)> = Vec::new();
        let mut out = PolyData::new();
        let mut cell_ids = Vec::new();

        for ring in &rings {
            let mut polygon: Vec<P2> = ring.iter().map(|&i| xy(loops.point(i))).collect();
            // clockwise loops are reversed so degenerate seams cancel the same way
            let area: f64 = (0..polygon.len())
                .map(|i| cross2([0.0, 0.0], polygon[i], polygon[(i + 1) % polygon.len()]))
                .sum();
            if area < 0.0 {
                polygon.reverse();
            }
            let mut ring_bounds = math::empty_bounds();
            for p in &polygon {
                math::grow_bounds(&mut ring_bounds, [p[0], p[1], 0.0]);
            }

            for (tri, cell_id) in mesh.triangles() {
                let corners = tri.map(|i| mesh.point(i));
                let mut window = corners.map(xy);
                let mut ids = tri;
                let signed = cross2(window[0], window[1], window[2]);
                if signed == 0.0 {
                    continue;
                }
                if signed < 0.0 {
                    window.swap(1, 2);
                    ids.swap(1, 2);
                }
                let outside = (0..2).any(|a| {
                    let lo = window.iter().map(|p| p[a]).fold(f64::INFINITY, f64::min);
                    let hi = window.iter().map(|p| p[a]).fold(f64::NEG_INFINITY, f64::max);
                    hi < ring_bounds[2 * a] || lo > ring_bounds[2 * a + 1]
                });
                if outside {
                    continue;
                }
                let piece = clip_polygon(&polygon, &window);
                let mut cell: Vec<usize> = Vec::with_capacity(piece.len());
                for p in piece {
                    let Some(weights) = math::barycentric_2d(p, window[0], window[1], window[2]) else { continue };
                    let key = ((p[0] / tol).round() as i64, (p[1] / tol).round() as i64);
                    let id = *merged.entry(key).or_insert_with(|| {
                        let z: f64 = (0..3).map(|v| weights[v] * mesh.point(ids[v])[2]).sum();
                        let id = builder.interpolate([p[0], p[1], z], &ids, &weights);
                        if let Some((a, b, t)) = on_loop(p, ring, loops, tol * 1e3) {
                            on_loops.push((id, a, b, t));
                        }
                        id
                    });
                    if cell.last() != Some(&id) && cell.first() != Some(&id) || cell.is_empty() {
                        cell.push(id);
                    }
                }
                if cell.len() >= 3 {
                    let pts: Vec<P2> = cell.iter().map(|&i| xy(builder.points[i])).collect();
                    let area: f64 = (1..pts.len() - 1).map(|i| cross2(pts[0], pts[i], pts[i + 1])).sum();
                    if area.abs() > tol * tol {
                        out.polys.insert_next_cell(&cell);
                        cell_ids.push(cell_id);
                    }
                }
            }
        }

        out.points = Points::from_vec(builder.points);
        out.point_data = builder.point_data;
        if self.interpolation == PointInterpolation::LoopEdges {
            apply_loop_values(&mut out.point_data, &loops.point_data, &on_loops)?;
        }
        if self.pass_cell_data {
            out.cell_data = mesh.cell_data.extract(&cell_ids);
        }
        Ok(out)
    }
}

/// Overwrite arrays shared by name with the loop's values for points on the loop.
fn apply_loop_values(
    point_data: &mut DataSetAttributes,
    loop_data: &DataSetAttributes,
    on_loops: &[(usize, usize, usize, f64)],
) -> Result<()> {
    for source in loop_data.iter() {
        let Some(name) = source.name() else { continue };
        let Some(target) = point_data.array_mut(name) else { continue };
        if target.number_of_components() != source.number_of_components() {
            continue;
        }
        for &(id, a, b, t) in on_loops {
            let values: Vec<f64> = source
                .tuple(a)
                .iter()
                .zip(source.tuple(b))
                .map(|(va, vb)| (1.0 - t) * va + t * vb)
                .collect();
            target.set_tuple(id, &values)?;
        }
    }
    Ok(())
}

impl Algorithm for CookieCutter {
    fn name(&self) -> &'static str {
        "CookieCutter"
    }

    fn number_of_input_ports(&self) -> usize {
        2
    }

    fn input_kind(&self, _port: usize) -> DataKind {
        DataKind::PolyData
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::PolyData);
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let as_poly = |data: &DataObject| {
            data.as_poly_data()
                .cloned()
                .ok_or_else(|| Error::pipeline(format!("expected polydata, got {}", data.type_name())))
        };
        let mesh = as_poly(ctx.input(0)?)?;
        let loops = as_poly(ctx.input(1)?)?;
        let out = self.cut(&mesh, &loops)?;
        ctx.set_output(0, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::DataArray;
    use crate::filters::PlaneSource;

    fn square_mesh() -> PolyData {
        let mut plane = PlaneSource::new();
        plane.set_points([0.0, 0.0, 1.0], [4.0, 0.0, 1.0], [0.0, 4.0, 1.0]);
        plane.set_resolution(4, 4);
        let mut mesh = plane.generate().unwrap();
        let x: Vec<f64> = mesh.points.iter().map(|p| p[0]).collect();
        mesh.point_data.add_array(DataArray::scalars("value", x));
        let ids: Vec<i32> = (0..16).collect();
        mesh.cell_data.add_array(DataArray::scalars("cell", ids));
        mesh
    }

    fn diamond() -> PolyData {
        let mut loops = PolyData::with_points(Points::from_vec(vec![
            [2.0, 0.5, 0.0],
            [3.5, 2.0, 0.0],
            [2.0, 3.5, 0.0],
            [0.5, 2.0, 0.0],
        ]));
        loops.polys.insert_next_cell(&[0, 1, 2, 3]);
        loops.point_data.add_array(DataArray::scalars("value", vec![10.0, 20.0, 30.0, 40.0]));
        loops
    }

    fn area(out: &PolyData) -> f64 {
        out.polys
            .iter()
            .map(|c| {
                let pts: Vec<P2> = c.iter().map(|&i| xy(out.point(i))).collect();
                (1..pts.len() - 1).map(|i| cross2(pts[0], pts[i], pts[i + 1])).sum::<f64>() / 2.0
            })
            .sum()
    }

    #[test]
    fn keeps_the_inside_of_the_loop() {
        let out = CookieCutter::new().cut(&square_mesh(), &diamond()).unwrap();
        // the diamond has diagonals of 3
        assert!((area(&out) - 4.5).abs() < 1e-9);
        assert!(out.points.iter().all(|p| (p[2] - 1.0).abs() < 1e-12));
        let cells = out.cell_data.get("cell").unwrap();
        assert_eq!(cells.number_of_tuples(), out.polys.number_of_cells());
        let value = out.point_data.get("value").unwrap();
        for (i, p) in out.points.iter().enumerate() {
            assert!((value.component(i, 0) - p[0]).abs() < 1e-9);
        }
    }

    #[test]
    fn loop_edge_mode_uses_loop_values() {
        let mut cutter = CookieCutter::new();
        cutter.set_point_interpolation(PointInterpolation::LoopEdges);
        cutter.set_pass_cell_data(false);
        let out = cutter.cut(&square_mesh(), &diamond()).unwrap();
        assert!(out.cell_data.is_empty());
        let value = out.point_data.get("value").unwrap();
        let corner = out.points.iter().position(|p| (p[0] - 2.0).abs() < 1e-9 && (p[1] - 0.5).abs() < 1e-9).unwrap();
        assert!((value.component(corner, 0) - 10.0).abs() < 1e-9);
        // interior mesh vertex keeps the mesh value
        let inner = out.points.iter().position(|p| (p[0] - 2.0).abs() < 1e-9 && (p[1] - 2.0).abs() < 1e-9).unwrap();
        assert!((value.component(inner, 0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn clipping_a_square_to_a_triangle() {
        let square = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]];
        let tri = [[1.0, -1.0], [3.0, 1.0], [1.0, 3.0]];
        let piece = clip_polygon(&square, &tri);
        let a: f64 = (1..piece.len() - 1).map(|i| cross2(piece[0], piece[i], piece[i + 1])).sum::<f64>() / 2.0;
        assert!((a - 2.0).abs() < 1e-12);
    }
}
