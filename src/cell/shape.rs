//! Interpolation functions and their parametric derivatives for linear cells.

use crate::data::CellType;
use crate::math::Vec3;

/// Interpolation weights of `cell_type` at `p`; empty for unsupported types.
pub fn weights(cell_type: CellType, p: Vec3) -> Vec<f64> {
    let [r, s, t] = p;
    let (rm, sm, tm) = (1.0 - r, 1.0 - s, 1.0 - t);
    match cell_type {
        CellType::Vertex => vec![1.0],
        CellType::Line => vec![rm, r],
        CellType::Triangle => vec![1.0 - r - s, r, s],
        CellType::Pixel => vec![rm * sm, r * sm, rm * s, r * s],
        CellType::Quad => vec![rm * sm, r * sm, r * s, rm * s],
        CellType::Tetra => vec![1.0 - r - s - t, r, s, t],
        CellType::Voxel => vec![
            rm * sm * tm,
            r * sm * tm,
            rm * s * tm,
            r * s * tm,
            rm * sm * t,
            r * sm * t,
            rm * s * t,
            r * s * t,
        ],
        CellType::Hexahedron => vec![
            rm * sm * tm,
            r * sm * tm,
            r * s * tm,
            rm * s * tm,
            rm * sm * t,
            r * sm * t,
            r * s * t,
            rm * s * t,
        ],
        CellType::Wedge => vec![
            (1.0 - r - s) * tm,
            r * tm,
            s * tm,
            (1.0 - r - s) * t,
            r * t,
            s * t,
        ],
        CellType::Pyramid => vec![rm * sm * tm, r * sm * tm, r * s * tm, rm * s * tm, t],
        _ => Vec::new(),
    }
}

/// `d weights / d (r, s, t)`, one row per point.
pub fn derivatives(cell_type: CellType, p: Vec3) -> Vec<[f64; 3]> {
    let [r, s, t] = p;
    let (rm, sm, tm) = (1.0 - r, 1.0 - s, 1.0 - t);
    match cell_type {
        CellType::Line => vec![[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
        CellType::Triangle => vec![[-1.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        CellType::Tetra => vec![
            [-1.0, -1.0, -1.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ],
        CellType::Voxel => vec![
            [-sm * tm, -rm * tm, -rm * sm],
            [sm * tm, -r * tm, -r * sm],
            [-s * tm, rm * tm, -rm * s],
            [s * tm, r * tm, -r * s],
            [-sm * t, -rm * t, rm * sm],
            [sm * t, -r * t, r * sm],
            [-s * t, rm * t, rm * s],
            [s * t, r * t, r * s],
        ],
        CellType::Hexahedron => vec![
            [-sm * tm, -rm * tm, -rm * sm],
            [sm * tm, -r * tm, -r * sm],
            [s * tm, r * tm, -r * s],
            [-s * tm, rm * tm, -rm * s],
            [-sm * t, -rm * t, rm * sm],
            [sm * t, -r * t, r * sm],
            [s * t, r * t, r * s],
            [-s * t, rm * t, rm * s],
        ],
        CellType::Wedge => vec![
            [-tm, -tm, -(1.0 - r - s)],
            [tm, 0.0, -r],
            [0.0, tm, -s],
            [-t, -t, 1.0 - r - s],
            [t, 0.0, r],
            [0.0, t, s],
        ],
        CellType::Pyramid => vec![
            [-sm * tm, -rm * tm, -rm * sm],
            [sm * tm, -r * tm, -r * sm],
            [s * tm, r * tm, -r * s],
            [-s * tm, rm * tm, -rm * s],
            [0.0, 0.0, 1.0],
        ],
        _ => Vec::new(),
    }
}

/// Parametric coordinates of the cell centre.
pub fn parametric_center(cell_type: CellType) -> Vec3 {
    match cell_type {
        CellType::Vertex => [0.0; 3],
        CellType::Line => [0.5, 0.0, 0.0],
        CellType::Triangle => [1.0 / 3.0, 1.0 / 3.0, 0.0],
        CellType::Pixel | CellType::Quad => [0.5, 0.5, 0.0],
        CellType::Tetra => [0.25, 0.25, 0.25],
        CellType::Wedge => [1.0 / 3.0, 1.0 / 3.0, 0.5],
        CellType::Pyramid => [0.4, 0.4, 0.2],
        _ => [0.5, 0.5, 0.5],
    }
}

/// Parametric coordinates of the cell's points.
pub fn parametric_coords(cell_type: CellType) -> &'static [Vec3] {
    match cell_type {
        CellType::Vertex => &[[0.0, 0.0, 0.0]],
        CellType::Line => &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
        CellType::Triangle => &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        CellType::Pixel => &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
        CellType::Quad => &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
        CellType::Tetra => &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        CellType::Voxel => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
        ],
        CellType::Hexahedron => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ],
        CellType::Wedge => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
        ],
        CellType::Pyramid => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ],
        _ => &[],
    }
}

/// Whether `p` lies in the parametric domain of the cell, within `tol`.
pub fn in_domain(cell_type: CellType, p: Vec3, tol: f64) -> bool {
    let unit = |v: f64| v >= -tol && v <= 1.0 + tol;
    let [r, s, t] = p;
    match cell_type {
        CellType::Tetra => r >= -tol && s >= -tol && t >= -tol && r + s + t <= 1.0 + tol,
        CellType::Wedge => r >= -tol && s >= -tol && r + s <= 1.0 + tol && unit(t),
        CellType::Triangle => r >= -tol && s >= -tol && r + s <= 1.0 + tol,
        CellType::Line => unit(r),
        CellType::Vertex => true,
        _ => unit(r) && unit(s) && unit(t),
    }
}

/// Nearest point of the parametric domain.
pub fn clamp_to_domain(cell_type: CellType, p: Vec3) -> Vec3 {
    let c = |v: f64| v.clamp(0.0, 1.0);
    match cell_type {
        CellType::Tetra => {
            let mut q = [c(p[0]), c(p[1]), c(p[2])];
            let sum = q[0] + q[1] + q[2];
            if sum > 1.0 {
                for v in q.iter_mut() {
                    *v /= sum;
                }
            }
            q
        }
        CellType::Wedge | CellType::Triangle => {
            let mut q = [c(p[0]), c(p[1]), c(p[2])];
            let sum = q[0] + q[1];
            if sum > 1.0 {
                q[0] /= sum;
                q[1] /= sum;
            }
            if cell_type == CellType::Triangle {
                q[2] = 0.0;
            }
            q
        }
        _ => [c(p[0]), c(p[1]), c(p[2])],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_are_a_partition_of_unity() {
        for ty in [
            CellType::Tetra,
            CellType::Voxel,
            CellType::Hexahedron,
            CellType::Wedge,
            CellType::Pyramid,
            CellType::Quad,
        ] {
            let w = weights(ty, [0.2, 0.3, 0.4]);
            assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12, "{ty:?}");
            let d = derivatives(ty, [0.2, 0.3, 0.4]);
            for axis in 0..3 {
                let sum: f64 = d.iter().map(|row| row[axis]).sum();
                assert!(sum.abs() < 1e-12, "{ty:?} axis {axis}");
            }
        }
    }

    #[test]
    fn weights_interpolate_corners() {
        for ty in [CellType::Tetra, CellType::Voxel, CellType::Hexahedron, CellType::Wedge] {
            for (i, p) in parametric_coords(ty).iter().enumerate() {
                let w = weights(ty, *p);
                for (j, wj) in w.iter().enumerate() {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert!((wj - expected).abs() < 1e-12);
                }
            }
        }
    }
}
