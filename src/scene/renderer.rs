//! Turning actors into display-space primitives.

use super::mapper::{decompose, leaves};
use super::property::{to_byte, Representation};
use super::{Actor, Camera};
use crate::data::{Association, DataObject};
use crate::math::{self, Bounds, Mat4, Vec3};
use crate::object::{EventId, Object, Observable};
use crate::utils::impl_observable;

use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Point,
    Line,
    Triangle,
}

/// One point, segment or triangle in display coordinates.
///
/// `vertices` hold pixel x and y (origin at the lower-left corner) and a depth in
/// `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub vertices: Vec<Vec3>,
    pub colors: Vec<[u8; 4]>,
    /// index of the actor in the renderer
    pub actor: usize,
    pub flat_block_index: Option<usize>,
    pub cell_id: usize,
}

/// Where rendered primitives go.
pub trait DisplaySurface: Send {
    fn begin_frame(&mut self, size: [usize; 2], background: [u8; 4]);
    fn draw(&mut self, primitive: &Primitive);
    fn end_frame(&mut self);
}

/// A finished frame kept by a [`RecordingSurface`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub size: [usize; 2],
    pub background: [u8; 4],
    pub primitives: Vec<Primitive>,
}

/// Surface that keeps every frame in memory.
///
/// Clones share the frames, so a clone can be handed to a renderer and the original
/// inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    frames: Arc<Mutex<Vec<Frame>>>,
    current: Option<Frame>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number_of_frames(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.frames.lock().ok().and_then(|f| f.last().cloned())
    }
}

impl DisplaySurface for RecordingSurface {
    fn begin_frame(&mut self, size: [usize; 2], background: [u8; 4]) {
        self.current = Some(Frame {
            size,
            background,
            primitives: Vec::new(),
        });
    }

    fn draw(&mut self, primitive: &Primitive) {
        if let Some(frame) = &mut self.current {
            frame.primitives.push(primitive.clone());
        }
    }

    fn end_frame(&mut self) {
        if let (Some(frame), Ok(mut frames)) = (self.current.take(), self.frames.lock()) {
            frames.push(frame);
        }
    }
}

/// Actors, a camera and a viewport of `size` pixels.
pub struct Renderer {
    object: Object,
    actors: Vec<Actor>,
    camera: Camera,
    background: Vec3,
    size: [usize; 2],
    surface: Option<Box<dyn DisplaySurface>>,
    frames_rendered: usize,
}

impl_observable!(Renderer);

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("actors", &self.actors.len())
            .field("camera", &self.camera)
            .field("size", &self.size)
            .field("frames_rendered", &self.frames_rendered)
            .finish()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            object: Object::new(),
            actors: Vec::new(),
            camera: Camera::new(),
            background: [0.0; 3],
            size: [300, 300],
            surface: None,
            frames_rendered: 0,
        }
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_actor(&mut self, actor: Actor) -> usize {
        self.actors.push(actor);
        self.modified();
        self.actors.len() - 1
    }

    pub fn remove_actor(&mut self, index: usize) -> Option<Actor> {
        if index >= self.actors.len() {
            return None;
        }
        self.modified();
        Some(self.actors.remove(index))
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn actor(&self, index: usize) -> Option<&Actor> {
        self.actors.get(index)
    }

    pub fn actor_mut(&mut self, index: usize) -> Option<&mut Actor> {
        self.actors.get_mut(index)
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn set_background(&mut self, color: Vec3) {
        self.background = color;
        self.modified();
    }

    pub fn size(&self) -> [usize; 2] {
        self.size
    }

    pub fn set_size(&mut self, width: usize, height: usize) {
        self.size = [width.max(1), height.max(1)];
        self.modified();
    }

    pub fn set_display_surface(&mut self, surface: Box<dyn DisplaySurface>) {
        self.surface = Some(surface);
    }

    pub fn frames_rendered(&self) -> usize {
        self.frames_rendered
    }

    /// union of the bounds of visible actors
    pub fn visible_bounds(&self) -> Option<Bounds> {
        let mut bounds = math::empty_bounds();
        for b in self.actors.iter().filter(|a| a.visibility()).filter_map(Actor::bounds) {
            math::grow_bounds(&mut bounds, [b[0], b[2], b[4]]);
            math::grow_bounds(&mut bounds, [b[1], b[3], b[5]]);
        }
        math::bounds_are_valid(&bounds).then_some(bounds)
    }

    /// Point the camera at all visible actors.
    pub fn reset_camera(&mut self) {
        if let Some(bounds) = self.visible_bounds() {
            self.camera.reset(&bounds);
        }
    }

    pub fn reset_camera_clipping_range(&mut self) {
        if let Some(bounds) = self.visible_bounds() {
            self.camera.reset_clipping_range(&bounds);
        }
    }

    pub fn aspect(&self) -> f64 {
        self.size[0] as f64 / self.size[1] as f64
    }

    /// World to normalized device coordinates.
    pub fn composite_matrix(&self) -> Mat4 {
        math::mat4_mul(&self.camera.projection_matrix(self.aspect()), &self.camera.view_matrix())
    }

    pub fn world_to_display(&self, p: Vec3) -> Vec3 {
        let ndc = math::transform_point(&self.composite_matrix(), p);
        self.ndc_to_display(ndc)
    }

    fn ndc_to_display(&self, ndc: Vec3) -> Vec3 {
        [
            (ndc[0] + 1.0) * 0.5 * self.size[0] as f64,
            (ndc[1] + 1.0) * 0.5 * self.size[1] as f64,
            (ndc[2] + 1.0) * 0.5,
        ]
    }

    /// Points on the near and far planes under display position `(x, y)`.
    pub fn display_to_world_ray(&self, x: f64, y: f64) -> Option<(Vec3, Vec3)> {
        let inverse = math::invert4(&self.composite_matrix())?;
        let nx = 2.0 * x / self.size[0] as f64 - 1.0;
        let ny = 2.0 * y / self.size[1] as f64 - 1.0;
        let near = math::transform_point(&inverse, [nx, ny, -1.0]);
        let far = math::transform_point(&inverse, [nx, ny, 1.0]);
        Some((near, far))
    }

    /// Display primitives of every visible actor, in actor order.
    pub fn primitives(&mut self) -> Vec<Primitive> {
        let composite = self.composite_matrix();
        let mut out = Vec::new();
        for index in 0..self.actors.len() {
            let actor = &mut self.actors[index];
            if !actor.visibility() {
                continue;
            }
            let model = math::mat4_mul(&composite, &actor.matrix());
            let property = actor.property().clone();
            let Some(mapper) = actor.mapper_mut() else { continue };
            let Some(input) = mapper.shared_input() else { continue };
            for (flat, leaf) in leaves(&input) {
                let block = flat.and_then(|i| mapper.block_attributes(i)).cloned().unwrap_or_default();
                if block.visibility == Some(false) {
                    continue;
                }
                let mapped = mapper.map_scalars(leaf);
                let [r, g, b] = block.color.unwrap_or_else(|| property.color()).map(to_byte);
                let flat_color = [r, g, b, to_byte(block.opacity.unwrap_or_else(|| property.opacity()))];
                let ctx = LeafContext {
                    data: leaf,
                    model: &model,
                    actor: index,
                    flat,
                    representation: property.representation(),
                    flat_color,
                    mapped: mapped.as_ref(),
                };
                ctx.emit(self.size, &mut out);
            }
        }
        out
    }

    /// Render one frame onto the display surface.
    pub fn render(&mut self) {
        self.invoke_event(EventId::StartEvent, None);
        self.invoke_event(EventId::StartRenderEvent, None);
        let primitives = self.primitives();
        let background = {
            let [r, g, b] = self.background.map(to_byte);
            [r, g, b, 255]
        };
        if let Some(surface) = self.surface.as_mut() {
            surface.begin_frame(self.size, background);
            for primitive in &primitives {
                surface.draw(primitive);
            }
            surface.end_frame();
        }
        self.frames_rendered += 1;
        tracing::debug!(primitives = primitives.len(), frame = self.frames_rendered, "rendered frame");
        self.invoke_event(EventId::EndRenderEvent, None);
        self.invoke_event(EventId::EndEvent, None);
    }
}

struct LeafContext<'a> {
    data: &'a DataObject,
    model: &'a Mat4,
    actor: usize,
    flat: Option<usize>,
    representation: Representation,
    flat_color: [u8; 4],
    mapped: Option<&'a super::MappedColors>,
}

impl LeafContext<'_> {
    fn color(&self, cell_id: usize, point_id: usize) -> [u8; 4] {
        let lookup = |colors: &Vec<[u8; 4]>, i: usize| colors.get(i).copied();
        self.mapped
            .and_then(|m| match m.association {
                Association::Points => lookup(&m.colors, point_id),
                Association::Cells => lookup(&m.colors, cell_id),
                Association::Field => None,
            })
            .unwrap_or(self.flat_color)
    }

    fn primitive(&self, size: [usize; 2], kind: PrimitiveKind, cell_id: usize, ids: &[usize]) -> Option<Primitive> {
        let mut vertices = Vec::with_capacity(ids.len());
        for &id in ids {
            let ndc = math::transform_point(self.model, self.data.point(id)?);
            vertices.push([
                (ndc[0] + 1.0) * 0.5 * size[0] as f64,
                (ndc[1] + 1.0) * 0.5 * size[1] as f64,
                (ndc[2] + 1.0) * 0.5,
            ]);
        }
        Some(Primitive {
            kind,
            vertices,
            colors: ids.iter().map(|&id| self.color(cell_id, id)).collect(),
            actor: self.actor,
            flat_block_index: self.flat,
            cell_id,
        })
    }

    fn emit(&self, size: [usize; 2], out: &mut Vec<Primitive>) {
        for cell_id in 0..self.data.number_of_cells() {
            let Some(cell) = self.data.cell(cell_id) else { continue };
            let pieces = decompose(&cell);
            let mut push = |kind, ids: &[usize]| {
                if let Some(p) = self.primitive(size, kind, cell_id, ids) {
                    out.push(p);
                }
            };
            match self.representation {
                Representation::Points => {
                    let mut ids = cell.point_ids.clone();
                    ids.sort_unstable();
                    ids.dedup();
                    for id in ids {
                        push(PrimitiveKind::Point, &[id]);
                    }
                }
                Representation::Wireframe => {
                    for [a, b, c] in &pieces.triangles {
                        for edge in [[*a, *b], [*b, *c], [*c, *a]] {
                            push(PrimitiveKind::Line, &edge);
                        }
                    }
                    for line in &pieces.lines {
                        push(PrimitiveKind::Line, line);
                    }
                    for &v in &pieces.vertices {
                        push(PrimitiveKind::Point, &[v]);
                    }
                }
                Representation::Surface => {
                    for tri in &pieces.triangles {
                        push(PrimitiveKind::Triangle, tri);
                    }
                    for line in &pieces.lines {
                        push(PrimitiveKind::Line, line);
                    }
                    for &v in &pieces.vertices {
                        push(PrimitiveKind::Point, &[v]);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::PlaneSource;
    use crate::scene::Mapper;

    fn plane_renderer() -> (Renderer, RecordingSurface) {
        let plane = PlaneSource::new().generate().unwrap();
        let mut renderer = Renderer::new();
        renderer.add_actor(Actor::with_mapper(Mapper::with_input(plane)));
        renderer.reset_camera();
        let surface = RecordingSurface::new();
        renderer.set_display_surface(Box::new(surface.clone()));
        (renderer, surface)
    }

    #[test]
    fn render_fires_events_in_order() {
        let (mut renderer, surface) = plane_renderer();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        renderer.add_observer(EventId::AnyEvent, 0.0, move |event| {
            sink.lock().unwrap().push(event.id);
        });
        renderer.render();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                EventId::StartEvent,
                EventId::StartRenderEvent,
                EventId::EndRenderEvent,
                EventId::EndEvent
            ]
        );
        let frame = surface.last_frame().unwrap();
        assert_eq!(frame.size, [300, 300]);
        assert!(!frame.primitives.is_empty());
        assert!(frame.primitives.iter().all(|p| p.kind == PrimitiveKind::Triangle));
    }

    #[test]
    fn reset_camera_keeps_everything_on_screen() {
        let (mut renderer, _) = plane_renderer();
        for p in renderer.primitives() {
            for v in p.vertices {
                assert!(v[0] >= 0.0 && v[0] <= 300.0);
                assert!(v[1] >= 0.0 && v[1] <= 300.0);
                assert!(v[2] > 0.0 && v[2] < 1.0);
            }
        }
        let center = renderer.world_to_display([0.0; 3]);
        assert!((center[0] - 150.0).abs() < 1e-9 && (center[1] - 150.0).abs() < 1e-9);
        let (near, far) = renderer.display_to_world_ray(150.0, 150.0).unwrap();
        let dir = math::normalize(math::sub(far, near));
        assert!(math::distance2(dir, renderer.camera().direction_of_projection()) < 1e-12);
    }

    #[test]
    fn hidden_actors_and_wireframe() {
        let (mut renderer, _) = plane_renderer();
        let triangles = renderer.primitives().len();
        renderer
            .actor_mut(0)
            .unwrap()
            .property_mut()
            .set_representation(Representation::Wireframe);
        assert_eq!(renderer.primitives().len(), 3 * triangles);
        renderer.actor_mut(0).unwrap().set_visibility(false);
        assert!(renderer.primitives().is_empty());
    }
}
