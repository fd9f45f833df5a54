use super::InputState;
use crate::object::{EventId, Object, Observable};
use crate::scene::Renderer;
use crate::utils::impl_observable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    None,
    Rotate,
    Dolly,
}

/// Left drag rotates the camera about its focal point; right drag and the mouse
/// wheel dolly it.
#[derive(Debug, Clone)]
pub struct TrackballCameraStyle {
    object: Object,
    motion: Motion,
    last: [i32; 2],
    motion_factor: f64,
    wheel_motion_factor: f64,
}

impl_observable!(TrackballCameraStyle);

impl Default for TrackballCameraStyle {
    fn default() -> Self {
        Self {
            object: Object::new(),
            motion: Motion::None,
            last: [0, 0],
            motion_factor: 10.0,
            wheel_motion_factor: 1.0,
        }
    }
}

impl TrackballCameraStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_motion_factor(&mut self, factor: f64) {
        self.motion_factor = factor;
        self.modified();
    }

    pub fn set_mouse_wheel_motion_factor(&mut self, factor: f64) {
        self.wheel_motion_factor = factor;
        self.modified();
    }

    /// true while a button is held
    pub fn is_interacting(&self) -> bool {
        self.motion != Motion::None
    }

    /// React to `event`; returns whether the scene changed and needs a render.
    pub fn handle(&mut self, event: EventId, state: &InputState, renderer: &mut Renderer) -> bool {
        match event {
            EventId::LeftButtonPressEvent => self.start(Motion::Rotate, state),
            EventId::RightButtonPressEvent => self.start(Motion::Dolly, state),
            EventId::LeftButtonReleaseEvent | EventId::RightButtonReleaseEvent => {
                let was_interacting = self.is_interacting();
                self.motion = Motion::None;
                self.invoke_event(EventId::EndEvent, None);
                was_interacting
            }
            EventId::MouseMoveEvent => {
                let [x, y] = state.position;
                let [dx, dy] = [x - self.last[0], y - self.last[1]];
                self.last = state.position;
                match self.motion {
                    Motion::Rotate => self.rotate(dx, dy, renderer),
                    Motion::Dolly => {
                        let center = renderer.size()[1] as f64 / 2.0;
                        self.dolly(1.1f64.powf(self.motion_factor * dy as f64 / center), renderer);
                    }
                    Motion::None => return false,
                }
                self.invoke_event(EventId::InteractionEvent, None);
                true
            }
            EventId::MouseWheelForwardEvent | EventId::MouseWheelBackwardEvent => {
                let sign = if event == EventId::MouseWheelForwardEvent { 1.0 } else { -1.0 };
                let factor = 0.2 * self.motion_factor * self.wheel_motion_factor * sign;
                self.dolly(1.1f64.powf(factor), renderer);
                true
            }
            _ => false,
        }
    }

    fn start(&mut self, motion: Motion, state: &InputState) -> bool {
        self.motion = motion;
        self.last = state.position;
        self.invoke_event(EventId::StartEvent, None);
        false
    }

    fn rotate(&mut self, dx: i32, dy: i32, renderer: &mut Renderer) {
        let [w, h] = renderer.size();
        let azimuth = -20.0 / w as f64 * dx as f64 * self.motion_factor;
        let elevation = -20.0 / h as f64 * dy as f64 * self.motion_factor;
        let camera = renderer.camera_mut();
        camera.azimuth(azimuth);
        camera.elevation(elevation);
        camera.orthogonalize_view_up();
        renderer.reset_camera_clipping_range();
    }

    fn dolly(&mut self, factor: f64, renderer: &mut Renderer) {
        let camera = renderer.camera_mut();
        if camera.parallel_projection() {
            let scale = camera.parallel_scale() / factor;
            camera.set_parallel_scale(scale);
        } else {
            camera.dolly(factor);
            renderer.reset_camera_clipping_range();
        }
    }
}
