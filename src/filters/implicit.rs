//! Implicit functions `F: R^3 -> R`. `F = 0` is a surface, `F <= 0` a volume.

use crate::math::{self, Vec3};

use std::fmt::Debug;

pub trait ImplicitFunction: Debug + Send + Sync {
    fn evaluate(&self, x: Vec3) -> f64;

    fn gradient(&self, x: Vec3) -> Vec3;
}

/// Plane through `origin`; positive on the side `normal` points to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub origin: Vec3,
    pub normal: Vec3,
}

impl Plane {
    pub fn new(origin: Vec3, normal: Vec3) -> Self {
        Self {
            origin,
            normal: math::normalize(normal),
        }
    }
}

impl ImplicitFunction for Plane {
    fn evaluate(&self, x: Vec3) -> f64 {
        math::dot(self.normal, math::sub(x, self.origin))
    }

    fn gradient(&self, _x: Vec3) -> Vec3 {
        self.normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f64,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f64) -> Self {
        Self { center, radius }
    }
}

impl ImplicitFunction for Sphere {
    fn evaluate(&self, x: Vec3) -> f64 {
        math::distance2(x, self.center) - self.radius * self.radius
    }

    fn gradient(&self, x: Vec3) -> Vec3 {
        math::scale(math::sub(x, self.center), 2.0)
    }
}

/// `a0 x^2 + a1 y^2 + a2 z^2 + a3 xy + a4 yz + a5 xz + a6 x + a7 y + a8 z + a9`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric {
    pub coefficients: [f64; 10],
}

impl Quadric {
    pub fn new(coefficients: [f64; 10]) -> Self {
        Self { coefficients }
    }
}

impl ImplicitFunction for Quadric {
    fn evaluate(&self, x: Vec3) -> f64 {
        let a = &self.coefficients;
        let [x, y, z] = x;
        a[0] * x * x + a[1] * y * y + a[2] * z * z + a[3] * x * y + a[4] * y * z + a[5] * x * z + a[6] * x + a[7] * y
            + a[8] * z
            + a[9]
    }

    fn gradient(&self, x: Vec3) -> Vec3 {
        let a = &self.coefficients;
        let [x, y, z] = x;
        [
            2.0 * a[0] * x + a[3] * y + a[5] * z + a[6],
            2.0 * a[1] * y + a[3] * x + a[4] * z + a[7],
            2.0 * a[2] * z + a[4] * y + a[5] * x + a[8],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadric_matches_sphere() {
        let sphere = Sphere::new([0.0; 3], 2.0);
        let quadric = Quadric::new([1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -4.0]);
        for x in [[1.0, 2.0, 3.0], [0.0, 0.0, 0.0], [-0.5, 0.25, 2.0]] {
            assert!((sphere.evaluate(x) - quadric.evaluate(x)).abs() < 1e-12);
            assert_eq!(sphere.gradient(x), quadric.gradient(x));
        }
    }

    #[test]
    fn plane_is_signed_distance() {
        let plane = Plane::new([0.0, 0.0, 1.0], [0.0, 0.0, 2.0]);
        assert_eq!(plane.evaluate([5.0, 5.0, 3.0]), 2.0);
        assert_eq!(plane.evaluate([5.0, 5.0, 0.0]), -1.0);
    }
}
