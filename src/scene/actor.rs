use super::{Mapper, Property};
use crate::math::{self, Bounds, Mat4, Vec3};
use crate::object::{Object, Observable};
use crate::utils::impl_observable;

/// A mapper placed in the world with a transform and a property.
#[derive(Debug, Clone)]
pub struct Actor {
    object: Object,
    mapper: Option<Mapper>,
    property: Property,
    position: Vec3,
    origin: Vec3,
    /// rotations about x, y and z in degrees, applied z first then x then y
    orientation: Vec3,
    scale: Vec3,
    visibility: bool,
    pickable: bool,
}

impl_observable!(Actor);

impl Default for Actor {
    fn default() -> Self {
        Self {
            object: Object::new(),
            mapper: None,
            property: Property::new(),
            position: [0.0; 3],
            origin: [0.0; 3],
            orientation: [0.0; 3],
            scale: [1.0; 3],
            visibility: true,
            pickable: true,
        }
    }
}

fn translation(t: Vec3) -> Mat4 {
    let mut m = math::IDENTITY4;
    for (row, v) in m.iter_mut().zip(t) {
        row[3] = v;
    }
    m
}

fn embed(r: &math::Mat3) -> Mat4 {
    let mut m = math::IDENTITY4;
    for i in 0..3 {
        m[i][..3].copy_from_slice(&r[i]);
    }
    m
}

impl Actor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapper(mapper: Mapper) -> Self {
        Self {
            mapper: Some(mapper),
            ..Self::default()
        }
    }

    pub fn mapper(&self) -> Option<&Mapper> {
        self.mapper.as_ref()
    }

    pub fn mapper_mut(&mut self) -> Option<&mut Mapper> {
        self.mapper.as_mut()
    }

    pub fn set_mapper(&mut self, mapper: Mapper) {
        self.mapper = Some(mapper);
        self.modified();
    }

    pub fn property(&self) -> &Property {
        &self.property
    }

    pub fn property_mut(&mut self) -> &mut Property {
        &mut self.property
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.modified();
    }

    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = origin;
        self.modified();
    }

    pub fn orientation(&self) -> Vec3 {
        self.orientation
    }

    pub fn set_orientation(&mut self, degrees: Vec3) {
        self.orientation = degrees;
        self.modified();
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.modified();
    }

    pub fn visibility(&self) -> bool {
        self.visibility
    }

    pub fn set_visibility(&mut self, visible: bool) {
        self.visibility = visible;
        self.modified();
    }

    pub fn pickable(&self) -> bool {
        self.pickable
    }

    pub fn set_pickable(&mut self, pickable: bool) {
        self.pickable = pickable;
        self.modified();
    }

    /// Model to world: `T(position + origin) · Rz · Rx · Ry · S · T(-origin)`.
    pub fn matrix(&self) -> Mat4 {
        let [rx, ry, rz] = self.orientation;
        let rotate = math::mat4_mul(
            &embed(&math::rotation([0.0, 0.0, 1.0], rz)),
            &math::mat4_mul(
                &embed(&math::rotation([1.0, 0.0, 0.0], rx)),
                &embed(&math::rotation([0.0, 1.0, 0.0], ry)),
            ),
        );
        let mut scale = math::IDENTITY4;
        for i in 0..3 {
            scale[i][i] = self.scale[i];
        }
        let m = math::mat4_mul(&translation(math::add(self.position, self.origin)), &rotate);
        let m = math::mat4_mul(&m, &scale);
        math::mat4_mul(&m, &translation(math::scale(self.origin, -1.0)))
    }

    /// World bounds of the transformed input, `None` without a mapper or input.
    pub fn bounds(&self) -> Option<Bounds> {
        let local = self.mapper.as_ref()?.bounds()?;
        if !math::bounds_are_valid(&local) {
            return None;
        }
        let m = self.matrix();
        let mut bounds = math::empty_bounds();
        for i in 0..8 {
            let corner = [local[i & 1], local[2 + ((i >> 1) & 1)], local[4 + ((i >> 2) & 1)]];
            math::grow_bounds(&mut bounds, math::transform_point(&m, corner));
        }
        Some(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::SphereSource;

    #[test]
    fn transform_moves_bounds() {
        let sphere = SphereSource::new([0.0; 3], 0.5).generate().unwrap();
        let mut actor = Actor::with_mapper(Mapper::with_input(sphere));
        let before = actor.bounds().unwrap();
        actor.set_position([10.0, 0.0, 0.0]);
        actor.set_scale([2.0, 2.0, 2.0]);
        let after = actor.bounds().unwrap();
        assert!((after[0] - (10.0 + 2.0 * before[0])).abs() < 1e-12);
        assert!((after[1] - (10.0 + 2.0 * before[1])).abs() < 1e-12);
    }

    #[test]
    fn rotation_about_origin() {
        let mut actor = Actor::new();
        actor.set_origin([1.0, 0.0, 0.0]);
        actor.set_orientation([0.0, 0.0, 90.0]);
        let p = math::transform_point(&actor.matrix(), [2.0, 0.0, 0.0]);
        assert!(math::distance2(p, [1.0, 1.0, 0.0]) < 1e-24);
        assert!(actor.bounds().is_none());
    }
}
