use crate::math::{self, Bounds, Mat4, Vec3};
use crate::object::{Object, Observable};
use crate::utils::impl_observable;

/// A perspective or parallel camera looking from `position` at `focal_point`.
#[derive(Debug, Clone)]
pub struct Camera {
    object: Object,
    position: Vec3,
    focal_point: Vec3,
    view_up: Vec3,
    view_angle: f64,
    parallel_projection: bool,
    parallel_scale: f64,
    clipping_range: [f64; 2],
}

impl_observable!(Camera);

impl Default for Camera {
    fn default() -> Self {
        Self {
            object: Object::new(),
            position: [0.0, 0.0, 1.0],
            focal_point: [0.0; 3],
            view_up: [0.0, 1.0, 0.0],
            view_angle: 30.0,
            parallel_projection: false,
            parallel_scale: 1.0,
            clipping_range: [0.01, 1000.01],
        }
    }
}

fn rotate_about(p: Vec3, center: Vec3, axis: Vec3, angle: f64) -> Vec3 {
    let r = math::rotation(axis, angle);
    math::add(center, math::mat3_mul_vec(&r, math::sub(p, center)))
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.modified();
    }

    pub fn focal_point(&self) -> Vec3 {
        self.focal_point
    }

    pub fn set_focal_point(&mut self, focal_point: Vec3) {
        self.focal_point = focal_point;
        self.modified();
    }

    pub fn view_up(&self) -> Vec3 {
        self.view_up
    }

    pub fn set_view_up(&mut self, view_up: Vec3) {
        self.view_up = math::normalize(view_up);
        self.modified();
    }

    /// vertical field of view in degrees
    pub fn view_angle(&self) -> f64 {
        self.view_angle
    }

    pub fn set_view_angle(&mut self, degrees: f64) {
        self.view_angle = degrees.clamp(0.00000001, 179.0);
        self.modified();
    }

    pub fn parallel_projection(&self) -> bool {
        self.parallel_projection
    }

    pub fn set_parallel_projection(&mut self, on: bool) {
        self.parallel_projection = on;
        self.modified();
    }

    /// half the viewport height in world units, for parallel projection
    pub fn parallel_scale(&self) -> f64 {
        self.parallel_scale
    }

    pub fn set_parallel_scale(&mut self, scale: f64) {
        self.parallel_scale = scale;
        self.modified();
    }

    pub fn clipping_range(&self) -> [f64; 2] {
        self.clipping_range
    }

    pub fn set_clipping_range(&mut self, near: f64, far: f64) {
        let near = near.max(1e-6);
        self.clipping_range = [near, far.max(near * 1.0001)];
        self.modified();
    }

    pub fn distance(&self) -> f64 {
        math::norm(math::sub(self.focal_point, self.position))
    }

    /// unit vector from the position to the focal point
    pub fn direction_of_projection(&self) -> Vec3 {
        math::normalize(math::sub(self.focal_point, self.position))
    }

    /// Rotate the position about the view up vector through the focal point.
    pub fn azimuth(&mut self, degrees: f64) {
        self.position = rotate_about(self.position, self.focal_point, self.view_up, degrees);
        self.modified();
    }

    /// Rotate the position about the horizontal screen axis through the focal point.
    pub fn elevation(&mut self, degrees: f64) {
        let axis = math::cross(self.direction_of_projection(), self.view_up);
        self.position = rotate_about(self.position, self.focal_point, axis, -degrees);
        self.modified();
    }

    /// Rotate the view up vector about the direction of projection.
    pub fn roll(&mut self, degrees: f64) {
        let r = math::rotation(self.direction_of_projection(), degrees);
        self.view_up = math::mat3_mul_vec(&r, self.view_up);
        self.modified();
    }

    /// Move towards the focal point, dividing the distance by `factor`.
    pub fn dolly(&mut self, factor: f64) {
        if factor <= 0.0 {
            return;
        }
        let d = self.distance() / factor;
        self.position = math::sub(self.focal_point, math::scale(self.direction_of_projection(), d));
        self.modified();
    }

    pub fn zoom(&mut self, factor: f64) {
        if factor <= 0.0 {
            return;
        }
        if self.parallel_projection {
            self.parallel_scale /= factor;
        } else {
            self.view_angle /= factor;
        }
        self.modified();
    }

    /// Make the view up vector perpendicular to the direction of projection.
    pub fn orthogonalize_view_up(&mut self) {
        let d = self.direction_of_projection();
        let right = math::normalize(math::cross(d, self.view_up));
        self.view_up = math::normalize(math::cross(right, d));
        self.modified();
    }

    /// World to eye coordinates; the camera looks down `-z`.
    pub fn view_matrix(&self) -> Mat4 {
        let d = self.direction_of_projection();
        let r = math::normalize(math::cross(d, self.view_up));
        let u = math::cross(r, d);
        let p = self.position;
        [
            [r[0], r[1], r[2], -math::dot(r, p)],
            [u[0], u[1], u[2], -math::dot(u, p)],
            [-d[0], -d[1], -d[2], math::dot(d, p)],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// Eye to normalized device coordinates in `[-1, 1]³`.
    pub fn projection_matrix(&self, aspect: f64) -> Mat4 {
        let [n, f] = self.clipping_range;
        if self.parallel_projection {
            let s = self.parallel_scale;
            [
                [1.0 / (s * aspect), 0.0, 0.0, 0.0],
                [0.0, 1.0 / s, 0.0, 0.0],
                [0.0, 0.0, -2.0 / (f - n), -(f + n) / (f - n)],
                [0.0, 0.0, 0.0, 1.0],
            ]
        } else {
            let t = 1.0 / (self.view_angle.to_radians() / 2.0).tan();
            [
                [t / aspect, 0.0, 0.0, 0.0],
                [0.0, t, 0.0, 0.0],
                [0.0, 0.0, -(f + n) / (f - n), -2.0 * f * n / (f - n)],
                [0.0, 0.0, -1.0, 0.0],
            ]
        }
    }

    /// Look at the center of `bounds` from far enough to see all of it, keeping the
    /// direction of projection.
    pub fn reset(&mut self, bounds: &Bounds) {
        if !math::bounds_are_valid(bounds) {
            return;
        }
        let center = math::bounds_center(bounds);
        let radius = (math::bounds_diagonal(bounds) / 2.0).max(1e-12);
        let distance = radius / (self.view_angle.to_radians() / 2.0).sin();
        let d = self.direction_of_projection();
        self.focal_point = center;
        self.position = math::sub(center, math::scale(d, distance));
        self.parallel_scale = radius;
        self.clipping_range = [(distance - radius * 1.01).max(distance * 0.001), distance + radius * 1.01];
        self.modified();
    }

    /// Fit the near and far planes around `bounds`.
    pub fn reset_clipping_range(&mut self, bounds: &Bounds) {
        if !math::bounds_are_valid(bounds) {
            return;
        }
        let d = self.direction_of_projection();
        let mut near = f64::INFINITY;
        let mut far = f64::NEG_INFINITY;
        for i in 0..8 {
            let corner = [bounds[i & 1], bounds[2 + ((i >> 1) & 1)], bounds[4 + ((i >> 2) & 1)]];
            let depth = math::dot(math::sub(corner, self.position), d);
            near = near.min(depth);
            far = far.max(depth);
        }
        let pad = (far - near).max(1e-9) * 0.01;
        let near = (near - pad).max((far + pad) * 0.001);
        self.set_clipping_range(near, far + pad);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        math::distance2(a, b) < 1e-18
    }

    #[test]
    fn azimuth_keeps_distance() {
        let mut camera = Camera::new();
        camera.azimuth(90.0);
        assert!(close(camera.position(), [1.0, 0.0, 0.0]));
        camera.elevation(90.0);
        assert!((camera.distance() - 1.0).abs() < 1e-12);
        assert!(close(camera.position(), [0.0, 1.0, 0.0]));
    }

    #[test]
    fn dolly_and_reset() {
        let mut camera = Camera::new();
        camera.dolly(2.0);
        assert!(close(camera.position(), [0.0, 0.0, 0.5]));
        camera.reset(&[-1.0, 1.0, -1.0, 1.0, -1.0, 1.0]);
        assert!(close(camera.focal_point(), [0.0; 3]));
        let expected = 3f64.sqrt() / 15f64.to_radians().sin();
        assert!((camera.distance() - expected).abs() < 1e-9);
    }

    #[test]
    fn focal_point_projects_to_center() {
        let mut camera = Camera::new();
        camera.set_position([3.0, 2.0, 5.0]);
        camera.set_focal_point([1.0, 1.0, 1.0]);
        camera.reset_clipping_range(&[0.0, 2.0, 0.0, 2.0, 0.0, 2.0]);
        let m = math::mat4_mul(&camera.projection_matrix(1.0), &camera.view_matrix());
        let ndc = math::transform_point(&m, [1.0, 1.0, 1.0]);
        assert!(ndc[0].abs() < 1e-12 && ndc[1].abs() < 1e-12);
        assert!(ndc[2] > -1.0 && ndc[2] < 1.0);
    }
}
