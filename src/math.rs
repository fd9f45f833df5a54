//! Small fixed-size linear algebra on `[f64; 3]` vectors and row-major matrices.

pub type Vec3 = [f64; 3];
pub type Mat3 = [[f64; 3]; 3];
pub type Mat4 = [[f64; 4]; 4];

/// `[xmin, xmax, ymin, ymax, zmin, zmax]`
pub type Bounds = [f64; 6];

pub const IDENTITY3: Mat3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

pub const IDENTITY4: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(a: Vec3, s: f64) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn norm(a: Vec3) -> f64 {
    dot(a, a).sqrt()
}

pub fn distance2(a: Vec3, b: Vec3) -> f64 {
    let d = sub(a, b);
    dot(d, d)
}

/// Unit vector along `a`, or `a` unchanged when it has zero length.
pub fn normalize(a: Vec3) -> Vec3 {
    let n = norm(a);
    if n > 0.0 {
        scale(a, 1.0 / n)
    } else {
        a
    }
}

pub fn lerp(a: Vec3, b: Vec3, t: f64) -> Vec3 {
    [
        a[0] + t * (b[0] - a[0]),
        a[1] + t * (b[1] - a[1]),
        a[2] + t * (b[2] - a[2]),
    ]
}

pub fn determinant3(m: &Mat3) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Solve `m x = b` with Cramer's rule, `None` when `m` is (nearly) singular.
pub fn solve3(m: &Mat3, b: Vec3) -> Option<Vec3> {
    let det = determinant3(m);
    if det.abs() < 1e-300 {
        return None;
    }
    let mut out = [0.0; 3];
    for (col, slot) in out.iter_mut().enumerate() {
        let mut mc = *m;
        for row in 0..3 {
            mc[row][col] = b[row];
        }
        *slot = determinant3(&mc) / det;
    }
    Some(out)
}

pub fn transpose3(m: &Mat3) -> Mat3 {
    let mut t = [[0.0; 3]; 3];
    for (i, row) in m.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            t[j][i] = *v;
        }
    }
    t
}

pub fn mat3_mul_vec(m: &Mat3, v: Vec3) -> Vec3 {
    [dot(m[0], v), dot(m[1], v), dot(m[2], v)]
}

pub fn invert3(m: &Mat3) -> Option<Mat3> {
    let det = determinant3(m);
    if det.abs() < 1e-300 {
        return None;
    }
    let inv_det = 1.0 / det;
    let mut inv = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            let (r0, r1) = ((j + 1) % 3, (j + 2) % 3);
            let (c0, c1) = ((i + 1) % 3, (i + 2) % 3);
            inv[i][j] = (m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]) * inv_det;
        }
    }
    Some(inv)
}

pub fn mat4_mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for i in 0..4 {
        for j in 0..4 {
            out[i][j] = (0..4).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

/// Apply a homogeneous transform to a point, dividing by `w`.
pub fn transform_point(m: &Mat4, p: Vec3) -> Vec3 {
    let v = [p[0], p[1], p[2], 1.0];
    let mut out = [0.0; 4];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = (0..4).map(|k| m[i][k] * v[k]).sum();
    }
    if out[3] != 0.0 && out[3] != 1.0 {
        [out[0] / out[3], out[1] / out[3], out[2] / out[3]]
    } else {
        [out[0], out[1], out[2]]
    }
}

/// Gauss-Jordan inverse with partial pivoting.
pub fn invert4(m: &Mat4) -> Option<Mat4> {
    let mut a = *m;
    let mut inv = IDENTITY4;
    for col in 0..4 {
        let pivot = (col..4).max_by(|x, y| a[*x][col].abs().total_cmp(&a[*y][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        inv.swap(col, pivot);
        let p = a[col][col];
        for k in 0..4 {
            a[col][k] /= p;
            inv[col][k] /= p;
        }
        for row in 0..4 {
            if row != col {
                let f = a[row][col];
                for k in 0..4 {
                    a[row][k] -= f * a[col][k];
                    inv[row][k] -= f * inv[col][k];
                }
            }
        }
    }
    Some(inv)
}

/// Rotation of `angle_deg` degrees about `axis` (Rodrigues).
pub fn rotation(axis: Vec3, angle_deg: f64) -> Mat3 {
    let [x, y, z] = normalize(axis);
    let (s, c) = angle_deg.to_radians().sin_cos();
    let t = 1.0 - c;
    [
        [t * x * x + c, t * x * y - s * z, t * x * z + s * y],
        [t * x * y + s * z, t * y * y + c, t * y * z - s * x],
        [t * x * z - s * y, t * y * z + s * x, t * z * z + c],
    ]
}

/// Empty bounds, ready to be grown with [`grow_bounds`].
pub fn empty_bounds() -> Bounds {
    [
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
    ]
}

pub fn grow_bounds(bounds: &mut Bounds, p: Vec3) {
    for axis in 0..3 {
        bounds[2 * axis] = bounds[2 * axis].min(p[axis]);
        bounds[2 * axis + 1] = bounds[2 * axis + 1].max(p[axis]);
    }
}

pub fn bounds_are_valid(bounds: &Bounds) -> bool {
    bounds[0] <= bounds[1] && bounds[2] <= bounds[3] && bounds[4] <= bounds[5]
}

pub fn bounds_diagonal(bounds: &Bounds) -> f64 {
    if !bounds_are_valid(bounds) {
        return 0.0;
    }
    norm([bounds[1] - bounds[0], bounds[3] - bounds[2], bounds[5] - bounds[4]])
}

pub fn bounds_center(bounds: &Bounds) -> Vec3 {
    [
        0.5 * (bounds[0] + bounds[1]),
        0.5 * (bounds[2] + bounds[3]),
        0.5 * (bounds[4] + bounds[5]),
    ]
}

/// Barycentric coordinates of `p` with respect to triangle `(a, b, c)` in the xy-plane.
pub fn barycentric_2d(p: [f64; 2], a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Option<[f64; 3]> {
    let det = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
    if det.abs() < 1e-300 {
        return None;
    }
    let l0 = ((b[1] - c[1]) * (p[0] - c[0]) + (c[0] - b[0]) * (p[1] - c[1])) / det;
    let l1 = ((c[1] - a[1]) * (p[0] - c[0]) + (a[0] - c[0]) * (p[1] - c[1])) / det;
    Some([l0, l1, 1.0 - l0 - l1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_and_invert() {
        let m = [[2.0, 0.0, 1.0], [1.0, 3.0, 0.0], [0.0, 1.0, 4.0]];
        let x = solve3(&m, [3.0, 4.0, 5.0]).unwrap();
        let back = mat3_mul_vec(&m, x);
        for i in 0..3 {
            assert!((back[i] - [3.0, 4.0, 5.0][i]).abs() < 1e-12);
        }
        let inv = invert3(&m).unwrap();
        let y = mat3_mul_vec(&inv, [3.0, 4.0, 5.0]);
        for i in 0..3 {
            assert!((x[i] - y[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn invert_4x4() {
        let mut m = IDENTITY4;
        m[0][3] = 2.0;
        m[1][1] = 4.0;
        let inv = invert4(&m).unwrap();
        let p = transform_point(&inv, transform_point(&m, [1.0, 2.0, 3.0]));
        assert!(distance2(p, [1.0, 2.0, 3.0]) < 1e-20);
    }

    #[test]
    fn rotation_about_z() {
        let r = rotation([0.0, 0.0, 1.0], 90.0);
        let p = mat3_mul_vec(&r, [1.0, 0.0, 0.0]);
        assert!(distance2(p, [0.0, 1.0, 0.0]) < 1e-20);
    }
}
