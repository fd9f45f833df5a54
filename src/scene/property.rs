use crate::math::Vec3;
use crate::object::{Object, Observable};
use crate::utils::impl_observable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    Points,
    Wireframe,
    #[default]
    Surface,
}

/// Appearance of an actor when it is not colored by scalars.
#[derive(Debug, Clone)]
pub struct Property {
    object: Object,
    color: Vec3,
    opacity: f64,
    point_size: f64,
    line_width: f64,
    representation: Representation,
}

impl_observable!(Property);

impl Default for Property {
    fn default() -> Self {
        Self {
            object: Object::new(),
            color: [1.0, 1.0, 1.0],
            opacity: 1.0,
            point_size: 1.0,
            line_width: 1.0,
            representation: Representation::Surface,
        }
    }
}

impl Property {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// RGB in `[0, 1]`; components are clamped.
    pub fn set_color(&mut self, color: Vec3) {
        self.color = color.map(|c| c.clamp(0.0, 1.0));
        self.modified();
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.modified();
    }

    pub fn point_size(&self) -> f64 {
        self.point_size
    }

    pub fn set_point_size(&mut self, size: f64) {
        self.point_size = size.max(0.0);
        self.modified();
    }

    pub fn line_width(&self) -> f64 {
        self.line_width
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width.max(0.0);
        self.modified();
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    pub fn set_representation(&mut self, representation: Representation) {
        self.representation = representation;
        self.modified();
    }

    /// Color and opacity as RGBA bytes.
    pub fn rgba(&self) -> [u8; 4] {
        let [r, g, b] = self.color.map(to_byte);
        [r, g, b, to_byte(self.opacity)]
    }
}

pub(crate) fn to_byte(c: f64) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}
