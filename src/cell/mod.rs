//! Parametric evaluation of linear cells.
//!
//! A cell maps its parametric domain onto world space through the interpolation
//! functions in [`shape`]. [`evaluate_position`] inverts that map: linear cells are
//! solved directly, multilinear ones with Newton iterations.
//!
//! ```
//! use vtk_pipeline::cell::evaluate_position;
//! use vtk_pipeline::CellType;
//!
//! let tet = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
//! let hit = evaluate_position(CellType::Tetra, &tet, [0.1, 0.2, 0.3]).unwrap();
//! assert!(hit.inside);
//! assert!((hit.pcoords[2] - 0.3).abs() < 1e-9);
//! ```

pub mod shape;

use crate::data::CellType;
use crate::math::{self, Vec3};
use crate::{Error, Result};

/// parametric tolerance used for the inside test
pub const PARAMETRIC_TOLERANCE: f64 = 1e-3;

const MAX_ITERATIONS: usize = 50;
const CONVERGENCE: f64 = 1e-12;

/// Result of locating a world position in a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// `x` lies in the cell or on its boundary
    pub inside: bool,
    pub closest_point: Vec3,
    pub pcoords: Vec3,
    /// squared distance from `x` to `closest_point`, zero when inside
    pub dist2: f64,
    pub weights: Vec<f64>,
}

fn check_points(cell_type: CellType, points: &[Vec3]) -> Result<()> {
    match cell_type.number_of_points() {
        Some(n) if n == points.len() && !shape::weights(cell_type, [0.0; 3]).is_empty() => Ok(()),
        Some(n) if n == points.len() => Err(Error::invalid_argument(format!(
            "{cell_type:?} has no parametric evaluation"
        ))),
        _ => Err(Error::invalid_argument(format!(
            "{cell_type:?} given {} points",
            points.len()
        ))),
    }
}

/// World position and interpolation weights at `pcoords`.
pub fn evaluate_location(cell_type: CellType, points: &[Vec3], pcoords: Vec3) -> Result<(Vec3, Vec<f64>)> {
    check_points(cell_type, points)?;
    let weights = shape::weights(cell_type, pcoords);
    Ok((interpolate(points, &weights), weights))
}

fn interpolate(points: &[Vec3], weights: &[f64]) -> Vec3 {
    let mut x = [0.0; 3];
    for (p, w) in points.iter().zip(weights) {
        for i in 0..3 {
            x[i] += w * p[i];
        }
    }
    x
}

/// Locate `x` in the cell.
///
/// Fails for cell types without parametric evaluation, wrong point counts,
/// degenerate geometry and positions where the Newton iteration does not converge.
pub fn evaluate_position(cell_type: CellType, points: &[Vec3], x: Vec3) -> Result<Evaluation> {
    check_points(cell_type, points)?;
    match cell_type {
        CellType::Vertex => {
            let dist2 = math::distance2(x, points[0]);
            Ok(Evaluation {
                inside: dist2 == 0.0,
                closest_point: points[0],
                pcoords: [0.0; 3],
                dist2,
                weights: vec![1.0],
            })
        }
        CellType::Line => Ok(evaluate_line(points[0], points[1], x)),
        CellType::Triangle => evaluate_triangle(points, x),
        CellType::Tetra => evaluate_tetra(points, x),
        CellType::Voxel => evaluate_voxel(points, x),
        CellType::Hexahedron | CellType::Wedge | CellType::Pyramid => evaluate_newton(cell_type, points, x),
        _ => Err(Error::invalid_argument(format!(
            "{cell_type:?} has no parametric evaluation"
        ))),
    }
}

fn evaluate_line(a: Vec3, b: Vec3, x: Vec3) -> Evaluation {
    let d = math::sub(b, a);
    let len2 = math::dot(d, d);
    let t = if len2 > 0.0 { math::dot(math::sub(x, a), d) / len2 } else { 0.0 };
    let clamped = t.clamp(0.0, 1.0);
    let closest_point = math::lerp(a, b, clamped);
    let dist2 = math::distance2(x, closest_point);
    Evaluation {
        inside: dist2 == 0.0 && shape::in_domain(CellType::Line, [t, 0.0, 0.0], 0.0),
        closest_point,
        pcoords: [t, 0.0, 0.0],
        dist2,
        weights: vec![1.0 - t, t],
    }
}

/// Parametric coordinates of the projection of `x` onto the plane of `(a, b, c)`.
fn triangle_pcoords(a: Vec3, b: Vec3, c: Vec3, x: Vec3) -> Option<[f64; 2]> {
    let (u, v, w) = (math::sub(b, a), math::sub(c, a), math::sub(x, a));
    let (uu, uv, vv) = (math::dot(u, u), math::dot(u, v), math::dot(v, v));
    let det = uu * vv - uv * uv;
    if det.abs() <= f64::EPSILON * uu * vv {
        return None;
    }
    let (wu, wv) = (math::dot(w, u), math::dot(w, v));
    Some([(vv * wu - uv * wv) / det, (uu * wv - uv * wu) / det])
}

/// Closest point to `x` on the triangle `(a, b, c)`.
pub fn closest_point_on_triangle(a: Vec3, b: Vec3, c: Vec3, x: Vec3) -> Vec3 {
    if let Some([r, s]) = triangle_pcoords(a, b, c, x) {
        if r >= 0.0 && s >= 0.0 && r + s <= 1.0 {
            return math::add(a, math::add(math::scale(math::sub(b, a), r), math::scale(math::sub(c, a), s)));
        }
    }
    [(a, b), (b, c), (c, a)]
        .iter()
        .map(|(p, q)| evaluate_line(*p, *q, x).closest_point)
        .fold(None, |best: Option<(f64, Vec3)>, p| {
            let d = math::distance2(x, p);
            match best {
                Some((bd, _)) if bd <= d => best,
                _ => Some((d, p)),
            }
        })
        .map_or(a, |(_, p)| p)
}

fn evaluate_triangle(points: &[Vec3], x: Vec3) -> Result<Evaluation> {
    let [r, s] = triangle_pcoords(points[0], points[1], points[2], x)
        .ok_or_else(|| Error::invalid_argument("degenerate triangle"))?;
    let pcoords = [r, s, 0.0];
    let weights = shape::weights(CellType::Triangle, pcoords);
    let projection = interpolate(points, &weights);
    let inside_domain = shape::in_domain(CellType::Triangle, pcoords, 0.0);
    let closest_point = if inside_domain {
        projection
    } else {
        closest_point_on_triangle(points[0], points[1], points[2], x)
    };
    let dist2 = math::distance2(x, closest_point);
    let scale = math::distance2(points[0], points[1]).max(math::distance2(points[0], points[2]));
    Ok(Evaluation {
        inside: inside_domain && dist2 <= 1e-12 * scale,
        closest_point,
        pcoords,
        dist2,
        weights,
    })
}

fn evaluate_tetra(points: &[Vec3], x: Vec3) -> Result<Evaluation> {
    let p0 = points[0];
    let (e1, e2, e3) = (math::sub(points[1], p0), math::sub(points[2], p0), math::sub(points[3], p0));
    let m = [[e1[0], e2[0], e3[0]], [e1[1], e2[1], e3[1]], [e1[2], e2[2], e3[2]]];
    let pcoords = math::solve3(&m, math::sub(x, p0)).ok_or_else(|| Error::invalid_argument("degenerate tetrahedron"))?;
    let weights = shape::weights(CellType::Tetra, pcoords);
    if shape::in_domain(CellType::Tetra, pcoords, PARAMETRIC_TOLERANCE) {
        return Ok(Evaluation {
            inside: true,
            closest_point: x,
            pcoords,
            dist2: 0.0,
            weights,
        });
    }
    let closest_point = CellType::Tetra
        .faces()
        .iter()
        .map(|f| closest_point_on_triangle(points[f[0]], points[f[1]], points[f[2]], x))
        .fold((f64::INFINITY, x), |best, p| {
            let d = math::distance2(x, p);
            if d < best.0 {
                (d, p)
            } else {
                best
            }
        })
        .1;
    Ok(Evaluation {
        inside: false,
        closest_point,
        pcoords,
        dist2: math::distance2(x, closest_point),
        weights,
    })
}

fn evaluate_voxel(points: &[Vec3], x: Vec3) -> Result<Evaluation> {
    let (lo, hi) = (points[0], points[7]);
    let mut pcoords = [0.0; 3];
    for i in 0..3 {
        let len = hi[i] - lo[i];
        if len <= 0.0 {
            return Err(Error::invalid_argument("degenerate voxel"));
        }
        pcoords[i] = (x[i] - lo[i]) / len;
    }
    Ok(finish(CellType::Voxel, points, x, pcoords))
}

fn finish(cell_type: CellType, points: &[Vec3], x: Vec3, pcoords: Vec3) -> Evaluation {
    let weights = shape::weights(cell_type, pcoords);
    if shape::in_domain(cell_type, pcoords, PARAMETRIC_TOLERANCE) {
        return Evaluation {
            inside: true,
            closest_point: x,
            pcoords,
            dist2: 0.0,
            weights,
        };
    }
    let clamped = shape::clamp_to_domain(cell_type, pcoords);
    let closest_point = interpolate(points, &shape::weights(cell_type, clamped));
    Evaluation {
        inside: false,
        closest_point,
        pcoords,
        dist2: math::distance2(x, closest_point),
        weights,
    }
}

fn evaluate_newton(cell_type: CellType, points: &[Vec3], x: Vec3) -> Result<Evaluation> {
    let mut p = shape::parametric_center(cell_type);
    for _ in 0..MAX_ITERATIONS {
        let residual = math::sub(x, interpolate(points, &shape::weights(cell_type, p)));
        let derivs = shape::derivatives(cell_type, p);
        let mut jacobian = [[0.0; 3]; 3];
        for (pt, d) in points.iter().zip(&derivs) {
            for row in 0..3 {
                for col in 0..3 {
                    jacobian[row][col] += pt[row] * d[col];
                }
            }
        }
        let delta = math::solve3(&jacobian, residual)
            .ok_or_else(|| Error::invalid_argument(format!("singular {cell_type:?} jacobian")))?;
        p = math::add(p, delta);
        if delta.iter().all(|d| d.abs() < CONVERGENCE) {
            return Ok(finish(cell_type, points, x, p));
        }
        if p.iter().any(|v| !v.is_finite() || v.abs() > 1e6) {
            break;
        }
    }
    Err(Error::invalid_argument(format!(
        "{cell_type:?} parametric inversion did not converge"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TET: [Vec3; 4] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    #[test]
    fn unit_tetra_grid() {
        for i in 0..=20 {
            for j in 0..=20 {
                for k in 0..=20 {
                    let c = |n: i32| -1.0 + 3.0 * n as f64 / 20.0;
                    let x = [c(i), c(j), c(k)];
                    let hit = evaluate_position(CellType::Tetra, &TET, x).unwrap();
                    let expected = x.iter().all(|v| (0.0..=1.0).contains(v)) && x[0] + x[1] + x[2] <= 1.01;
                    assert_eq!(hit.inside, expected, "{x:?}");
                    if hit.inside {
                        for a in 0..3 {
                            assert!((hit.pcoords[a] - x[a]).abs() < 1e-3);
                        }
                    } else {
                        assert!(hit.dist2 > 0.0);
                    }
                }
            }
        }
    }

    fn skewed(cell_type: CellType) -> Vec<Vec3> {
        shape::parametric_coords(cell_type)
            .iter()
            .map(|p| [2.0 * p[0] + 0.3 * p[1] + 0.1, 1.5 * p[1] + 0.2 * p[2] * p[0] - 0.4, 0.8 * p[2] + 0.1 * p[0]])
            .collect()
    }

    #[test]
    fn inverse_of_parametric_map() {
        let samples = [[0.1, 0.2, 0.3], [0.25, 0.25, 0.5], [0.4, 0.1, 0.05], [0.0, 0.0, 0.0]];
        for ty in [CellType::Hexahedron, CellType::Wedge, CellType::Pyramid, CellType::Tetra] {
            let points = skewed(ty);
            for p in samples {
                let (x, _) = evaluate_location(ty, &points, p).unwrap();
                let hit = evaluate_position(ty, &points, x).unwrap();
                assert!(hit.inside, "{ty:?} {p:?}");
                for a in 0..3 {
                    assert!((hit.pcoords[a] - p[a]).abs() < 1e-3, "{ty:?} {p:?} {:?}", hit.pcoords);
                }
            }
        }
    }

    #[test]
    fn voxel_outside_reports_closest_point() {
        let points: Vec<Vec3> = shape::parametric_coords(CellType::Voxel).to_vec();
        let hit = evaluate_position(CellType::Voxel, &points, [2.0, 0.5, 0.5]).unwrap();
        assert!(!hit.inside);
        assert_eq!(hit.closest_point, [1.0, 0.5, 0.5]);
        assert!((hit.dist2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn triangle_projection() {
        let tri = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let hit = evaluate_position(CellType::Triangle, &tri, [0.25, 0.25, 1.0]).unwrap();
        assert!(!hit.inside);
        assert_eq!(hit.closest_point, [0.25, 0.25, 0.0]);
        let on = evaluate_position(CellType::Triangle, &tri, [0.25, 0.25, 0.0]).unwrap();
        assert!(on.inside);
    }

    #[test]
    fn wrong_point_count_is_rejected() {
        assert!(evaluate_position(CellType::Hexahedron, &TET, [0.0; 3]).is_err());
        assert!(evaluate_position(CellType::Polygon, &TET, [0.0; 3]).is_err());
    }
}
