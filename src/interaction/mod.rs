//! # Interaction
//!
//! An [`Interactor`] turns device input into events on its observer table, lets an
//! optional [`TrackballCameraStyle`] move the camera of the renderer it owns, and
//! re-renders. A [`Recorder`] captures the input events as text lines which
//! [`play`] feeds back into any interactor.

mod recorder;
mod style;

pub use recorder::{parse_records, play, EventRecord, Recorder, STREAM_HEADER};
pub use style::TrackballCameraStyle;

use crate::object::{CallData, EventId, Object, Observable};
use crate::scene::Renderer;
use crate::utils::impl_observable;
use crate::{Error, Result};

/// Device state at the time of an input event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    /// display position, origin at the lower-left corner
    pub position: [i32; 2],
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub key_code: i32,
    pub repeat_count: i32,
    pub key_sym: Option<String>,
}

impl InputState {
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            position: [x, y],
            ..Self::default()
        }
    }

    pub fn key(key_code: char, key_sym: &str) -> Self {
        Self {
            key_code: key_code as i32,
            key_sym: Some(key_sym.to_string()),
            ..Self::default()
        }
    }
}

/// Event source driving a renderer.
#[derive(Debug)]
pub struct Interactor {
    object: Object,
    renderer: Renderer,
    style: Option<TrackballCameraStyle>,
    state: InputState,
    events_processed: usize,
}

impl_observable!(Interactor);

impl Interactor {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            object: Object::new(),
            renderer,
            style: Some(TrackballCameraStyle::new()),
            state: InputState::default(),
            events_processed: 0,
        }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn into_renderer(self) -> Renderer {
        self.renderer
    }

    /// Replace the interaction style; `None` leaves the camera alone.
    pub fn set_style(&mut self, style: Option<TrackballCameraStyle>) {
        self.style = style;
        self.modified();
    }

    pub fn style(&self) -> Option<&TrackballCameraStyle> {
        self.style.as_ref()
    }

    /// state of the last processed event
    pub fn state(&self) -> &InputState {
        &self.state
    }

    pub fn events_processed(&self) -> usize {
        self.events_processed
    }

    /// Deliver one input event: observers first, then the style, which may
    /// re-render.
    pub fn process(&mut self, event: EventId, state: InputState) -> Result<()> {
        if !event.is_input_event() {
            return Err(Error::invalid_argument(format!("{event} is not an input event")));
        }
        tracing::trace!(%event, x = state.position[0], y = state.position[1], "input event");
        self.state = state;
        self.events_processed += 1;
        let data = CallData::Input(self.state.clone());
        self.invoke_event(event, Some(&data));
        if let Some(style) = self.style.as_mut() {
            if style.handle(event, &self.state, &mut self.renderer) {
                self.renderer.render();
            }
        }
        Ok(())
    }

    pub fn mouse_move(&mut self, x: i32, y: i32) -> Result<()> {
        self.process(EventId::MouseMoveEvent, self.state_at(x, y))
    }

    pub fn left_button_press(&mut self, x: i32, y: i32) -> Result<()> {
        self.process(EventId::LeftButtonPressEvent, self.state_at(x, y))
    }

    pub fn left_button_release(&mut self, x: i32, y: i32) -> Result<()> {
        self.process(EventId::LeftButtonReleaseEvent, self.state_at(x, y))
    }

    pub fn right_button_press(&mut self, x: i32, y: i32) -> Result<()> {
        self.process(EventId::RightButtonPressEvent, self.state_at(x, y))
    }

    pub fn right_button_release(&mut self, x: i32, y: i32) -> Result<()> {
        self.process(EventId::RightButtonReleaseEvent, self.state_at(x, y))
    }

    pub fn mouse_wheel_forward(&mut self) -> Result<()> {
        self.process(EventId::MouseWheelForwardEvent, self.state.clone())
    }

    pub fn mouse_wheel_backward(&mut self) -> Result<()> {
        self.process(EventId::MouseWheelBackwardEvent, self.state.clone())
    }

    /// Key press, char and key release for one key.
    pub fn type_key(&mut self, key_code: char, key_sym: &str) -> Result<()> {
        let state = InputState {
            position: self.state.position,
            ..InputState::key(key_code, key_sym)
        };
        self.process(EventId::KeyPressEvent, state.clone())?;
        self.process(EventId::CharEvent, state.clone())?;
        self.process(EventId::KeyReleaseEvent, state)
    }

    fn state_at(&self, x: i32, y: i32) -> InputState {
        InputState {
            position: [x, y],
            ctrl: self.state.ctrl,
            shift: self.state.shift,
            alt: self.state.alt,
            ..InputState::default()
        }
    }
}
