//! Ray-cast picking of cells under a display position.

use super::mapper::{decompose, leaves};
use super::Renderer;
use crate::math::{self, Vec3};
use crate::object::{CallData, EventId, Object, Observable};
use crate::utils::impl_observable;

/// What lies under the picked display position.
#[derive(Debug, Clone, PartialEq)]
pub struct PickResult {
    /// index of the actor in the renderer
    pub actor: usize,
    /// flat index of the block the cell belongs to, for composite inputs
    pub flat_block_index: Option<usize>,
    pub cell_id: usize,
    /// vertex of the picked cell closest to `position`
    pub point_id: usize,
    /// world position of the hit
    pub position: Vec3,
}

/// Picks the frontmost cell of any visible, pickable actor.
///
/// Surface cells and faces of volume cells are intersected exactly; lines and
/// vertices are hit when the ray passes within `tolerance` (a fraction of the
/// actor's bounding box diagonal).
#[derive(Debug, Clone)]
pub struct CellPicker {
    object: Object,
    tolerance: f64,
    result: Option<PickResult>,
}

impl_observable!(CellPicker);

impl Default for CellPicker {
    fn default() -> Self {
        Self {
            object: Object::new(),
            tolerance: 0.005,
            result: None,
        }
    }
}

/// Ray parameter of the intersection of `origin + t·dir` with a triangle.
fn intersect_triangle(origin: Vec3, dir: Vec3, [a, b, c]: [Vec3; 3]) -> Option<f64> {
    let e1 = math::sub(b, a);
    let e2 = math::sub(c, a);
    let p = math::cross(dir, e2);
    let det = math::dot(e1, p);
    if det.abs() < 1e-300 {
        return None;
    }
    let inv = 1.0 / det;
    let s = math::sub(origin, a);
    let u = math::dot(s, p) * inv;
    if !(-1e-12..=1.0 + 1e-12).contains(&u) {
        return None;
    }
    let q = math::cross(s, e1);
    let v = math::dot(dir, q) * inv;
    if v < -1e-12 || u + v > 1.0 + 1e-12 {
        return None;
    }
    Some(math::dot(e2, q) * inv)
}

/// Ray parameter and distance of the point of segment `[a, b]` closest to the ray.
fn segment_distance(origin: Vec3, dir: Vec3, a: Vec3, b: Vec3) -> (f64, f64) {
    let u = math::sub(b, a);
    let w = math::sub(origin, a);
    let (aa, ab, bb) = (math::dot(dir, dir), math::dot(dir, u), math::dot(u, u));
    let (ad, bd) = (math::dot(dir, w), math::dot(u, w));
    let denom = aa * bb - ab * ab;
    let s = if denom.abs() < 1e-300 || bb == 0.0 {
        0.0
    } else {
        ((aa * bd - ab * ad) / denom).clamp(0.0, 1.0)
    };
    let on_segment = math::add(a, math::scale(u, s));
    let t = math::dot(math::sub(on_segment, origin), dir) / aa;
    let on_ray = math::add(origin, math::scale(dir, t));
    (t, math::distance2(on_ray, on_segment).sqrt())
}

impl CellPicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance.max(0.0);
        self.modified();
    }

    /// the result of the last pick
    pub fn result(&self) -> Option<&PickResult> {
        self.result.as_ref()
    }

    /// Pick at display position `(x, y)`, origin at the lower-left corner.
    pub fn pick(&mut self, x: f64, y: f64, renderer: &Renderer) -> Option<PickResult> {
        self.result = self.cast(x, y, renderer);
        if let Some(hit) = &self.result {
            tracing::debug!(actor = hit.actor, cell = hit.cell_id, block = ?hit.flat_block_index, "picked");
            let data = CallData::Pick(hit.clone());
            self.invoke_event(EventId::PickEvent, Some(&data));
            self.invoke_event(EventId::EndPickEvent, Some(&data));
        } else {
            self.invoke_event(EventId::EndPickEvent, None);
        }
        self.result.clone()
    }

    fn cast(&self, x: f64, y: f64, renderer: &Renderer) -> Option<PickResult> {
        let (near, far) = renderer.display_to_world_ray(x, y)?;
        let mut best: Option<(f64, PickResult)> = None;
        for (index, actor) in renderer.actors().iter().enumerate() {
            if !actor.visibility() || !actor.pickable() {
                continue;
            }
            let Some(input) = actor.mapper().and_then(|m| m.input()) else { continue };
            let model = actor.matrix();
            let Some(inverse) = math::invert4(&model) else { continue };
            let origin = math::transform_point(&inverse, near);
            let dir = math::sub(math::transform_point(&inverse, far), origin);
            let diagonal = math::bounds_diagonal(&input.bounds());
            let tolerance = self.tolerance * diagonal.max(f64::MIN_POSITIVE);

            for (flat, leaf) in leaves(input) {
                if flat
                    .and_then(|i| actor.mapper().and_then(|m| m.block_attributes(i)))
                    .and_then(|b| b.visibility)
                    == Some(false)
                {
                    continue;
                }
                for cell_id in 0..leaf.number_of_cells() {
                    let Some(cell) = leaf.cell(cell_id) else { continue };
                    let pieces = decompose(&cell);
                    let point = |i: usize| leaf.point(i).unwrap_or([f64::NAN; 3]);
                    let mut t_cell = f64::INFINITY;
                    for tri in &pieces.triangles {
                        if let Some(t) = intersect_triangle(origin, dir, tri.map(point)) {
                            if (0.0..=1.0).contains(&t) {
                                t_cell = t_cell.min(t);
                            }
                        }
                    }
                    for [a, b] in &pieces.lines {
                        let (t, d) = segment_distance(origin, dir, point(*a), point(*b));
                        if d <= tolerance && (0.0..=1.0).contains(&t) {
                            t_cell = t_cell.min(t);
                        }
                    }
                    for &v in &pieces.vertices {
                        let (t, d) = segment_distance(origin, dir, point(v), point(v));
                        if d <= tolerance && (0.0..=1.0).contains(&t) {
                            t_cell = t_cell.min(t);
                        }
                    }
                    if !t_cell.is_finite() || best.as_ref().map_or(false, |(t, _)| *t <= t_cell) {
                        continue;
                    }
                    let local = math::add(origin, math::scale(dir, t_cell));
                    let point_id = cell
                        .point_ids
                        .iter()
                        .copied()
                        .min_by(|&a, &b| {
                            math::distance2(point(a), local).total_cmp(&math::distance2(point(b), local))
                        })
                        .unwrap_or(0);
                    best = Some((
                        t_cell,
                        PickResult {
                            actor: index,
                            flat_block_index: flat,
                            cell_id,
                            point_id,
                            position: math::transform_point(&model, local),
                        },
                    ));
                }
            }
        }
        best.map(|(_, hit)| hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::PlaneSource;
    use crate::scene::{Actor, Mapper};
    use std::sync::{Arc, Mutex};

    fn scene() -> Renderer {
        let mut source = PlaneSource::new();
        source.set_resolution(2, 2);
        let mut renderer = Renderer::new();
        renderer.add_actor(Actor::with_mapper(Mapper::with_input(source.generate().unwrap())));
        renderer.reset_camera();
        renderer
    }

    #[test]
    fn picks_cell_under_cursor() {
        let renderer = scene();
        // center of the upper right quad of the 2x2 plane
        let target = renderer.world_to_display([0.25, 0.25, 0.0]);
        let mut picker = CellPicker::new();
        let hit = picker.pick(target[0], target[1], &renderer).unwrap();
        assert_eq!(hit.actor, 0);
        assert_eq!(hit.cell_id, 3);
        assert_eq!(hit.flat_block_index, None);
        assert!(math::distance2(hit.position, [0.25, 0.25, 0.0]) < 1e-12);
        assert!([4, 5, 7, 8].contains(&hit.point_id));
    }

    #[test]
    fn miss_fires_only_end_pick() {
        let renderer = scene();
        let mut picker = CellPicker::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        picker.add_observer(EventId::AnyEvent, 0.0, move |event| {
            let picked = matches!(event.data, Some(CallData::Pick(_)));
            sink.lock().unwrap().push((event.id, picked));
        });
        assert!(picker.pick(1.0, 1.0, &renderer).is_none());
        let target = renderer.world_to_display([-0.25, -0.25, 0.0]);
        assert_eq!(picker.pick(target[0], target[1], &renderer).map(|h| h.cell_id), Some(0));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (EventId::EndPickEvent, false),
                (EventId::PickEvent, true),
                (EventId::EndPickEvent, true)
            ]
        );
    }

    #[test]
    fn frontmost_actor_wins() {
        let mut renderer = scene();
        let mut front = Actor::with_mapper(Mapper::with_input(PlaneSource::new().generate().unwrap()));
        front.set_position([0.0, 0.0, 0.1]);
        renderer.add_actor(front);
        renderer.reset_camera();
        let center = renderer.world_to_display([0.0, 0.0, 0.1]);
        let hit = CellPicker::new().pick(center[0] + 3.0, center[1] + 3.0, &renderer).unwrap();
        assert_eq!(hit.actor, 1);
        renderer.actor_mut(1).unwrap().set_pickable(false);
        let hit = CellPicker::new().pick(center[0] + 3.0, center[1] + 3.0, &renderer).unwrap();
        assert_eq!(hit.actor, 0);
    }
}
