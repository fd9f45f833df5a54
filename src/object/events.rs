//! # Events
//!
//! Every observable object owns an [`Observers`] table. Observers are registered against
//! an [`EventId`] with a priority and are called synchronously, highest priority first,
//! with equal priorities firing in registration order.
//!
//! Callbacks never own the object they observe. They receive the caller's [`ObjectId`]
//! in the [`Event`] and, if they need to reach back into the object, they hold a
//! [`WeakObservers`] handle or look the object up by id.

use super::ObjectId;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, Weak};

/// Identifier of an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventId {
    /// matches every event when used to register an observer
    AnyEvent,
    ModifiedEvent,
    ErrorEvent,
    WarningEvent,
    BufferChangedEvent,
    StartEvent,
    EndEvent,
    ProgressEvent,
    AbortCheckEvent,
    PickEvent,
    EndPickEvent,
    StartRenderEvent,
    EndRenderEvent,
    MouseMoveEvent,
    LeftButtonPressEvent,
    LeftButtonReleaseEvent,
    MiddleButtonPressEvent,
    MiddleButtonReleaseEvent,
    RightButtonPressEvent,
    RightButtonReleaseEvent,
    MouseWheelForwardEvent,
    MouseWheelBackwardEvent,
    KeyPressEvent,
    KeyReleaseEvent,
    CharEvent,
    EnterEvent,
    LeaveEvent,
    ExposeEvent,
    ConfigureEvent,
    InteractionEvent,
}

const ALL_EVENTS: [EventId; 30] = [
    EventId::AnyEvent,
    EventId::ModifiedEvent,
    EventId::ErrorEvent,
    EventId::WarningEvent,
    EventId::BufferChangedEvent,
    EventId::StartEvent,
    EventId::EndEvent,
    EventId::ProgressEvent,
    EventId::AbortCheckEvent,
    EventId::PickEvent,
    EventId::EndPickEvent,
    EventId::StartRenderEvent,
    EventId::EndRenderEvent,
    EventId::MouseMoveEvent,
    EventId::LeftButtonPressEvent,
    EventId::LeftButtonReleaseEvent,
    EventId::MiddleButtonPressEvent,
    EventId::MiddleButtonReleaseEvent,
    EventId::RightButtonPressEvent,
    EventId::RightButtonReleaseEvent,
    EventId::MouseWheelForwardEvent,
    EventId::MouseWheelBackwardEvent,
    EventId::KeyPressEvent,
    EventId::KeyReleaseEvent,
    EventId::CharEvent,
    EventId::EnterEvent,
    EventId::LeaveEvent,
    EventId::ExposeEvent,
    EventId::ConfigureEvent,
    EventId::InteractionEvent,
];

impl EventId {
    /// the name used for this event in recordings and messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnyEvent => "AnyEvent",
            Self::ModifiedEvent => "ModifiedEvent",
            Self::ErrorEvent => "ErrorEvent",
            Self::WarningEvent => "WarningEvent",
            Self::BufferChangedEvent => "BufferChangedEvent",
            Self::StartEvent => "StartEvent",
            Self::EndEvent => "EndEvent",
            Self::ProgressEvent => "ProgressEvent",
            Self::AbortCheckEvent => "AbortCheckEvent",
            Self::PickEvent => "PickEvent",
            Self::EndPickEvent => "EndPickEvent",
            Self::StartRenderEvent => "StartRenderEvent",
            Self::EndRenderEvent => "EndRenderEvent",
            Self::MouseMoveEvent => "MouseMoveEvent",
            Self::LeftButtonPressEvent => "LeftButtonPressEvent",
            Self::LeftButtonReleaseEvent => "LeftButtonReleaseEvent",
            Self::MiddleButtonPressEvent => "MiddleButtonPressEvent",
            Self::MiddleButtonReleaseEvent => "MiddleButtonReleaseEvent",
            Self::RightButtonPressEvent => "RightButtonPressEvent",
            Self::RightButtonReleaseEvent => "RightButtonReleaseEvent",
            Self::MouseWheelForwardEvent => "MouseWheelForwardEvent",
            Self::MouseWheelBackwardEvent => "MouseWheelBackwardEvent",
            Self::KeyPressEvent => "KeyPressEvent",
            Self::KeyReleaseEvent => "KeyReleaseEvent",
            Self::CharEvent => "CharEvent",
            Self::EnterEvent => "EnterEvent",
            Self::LeaveEvent => "LeaveEvent",
            Self::ExposeEvent => "ExposeEvent",
            Self::ConfigureEvent => "ConfigureEvent",
            Self::InteractionEvent => "InteractionEvent",
        }
    }

    /// true for the events an interactor produces from device input
    pub fn is_input_event(&self) -> bool {
        matches!(
            self,
            Self::MouseMoveEvent
                | Self::LeftButtonPressEvent
                | Self::LeftButtonReleaseEvent
                | Self::MiddleButtonPressEvent
                | Self::MiddleButtonReleaseEvent
                | Self::RightButtonPressEvent
                | Self::RightButtonReleaseEvent
                | Self::MouseWheelForwardEvent
                | Self::MouseWheelBackwardEvent
                | Self::KeyPressEvent
                | Self::KeyReleaseEvent
                | Self::CharEvent
                | Self::EnterEvent
                | Self::LeaveEvent
                | Self::ExposeEvent
                | Self::ConfigureEvent
        )
    }

    /// every input event, in declaration order
    pub fn input_events() -> impl Iterator<Item = EventId> {
        ALL_EVENTS.into_iter().filter(|e| e.is_input_event())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_EVENTS
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidArgument(format!("unknown event name `{s}`")))
    }
}

/// Optional payload delivered with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum CallData {
    /// human readable message (ErrorEvent, WarningEvent)
    Message(String),
    /// fraction of work done (ProgressEvent)
    Progress(f64),
    /// a picked primitive (PickEvent / EndPickEvent)
    Pick(crate::scene::PickResult),
    /// state of the interactor when an input event fired
    Input(crate::interaction::InputState),
}

impl CallData {
    /// the message carried by an error or warning event
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }
}

/// Handle returned by [`Observers::add`], used to remove the registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display(fmt = "observer#{}", _0)]
pub struct ObserverTag(pub u64);

/// What a callback sees when it is invoked.
pub struct Event<'a> {
    pub caller: ObjectId,
    pub id: EventId,
    pub data: Option<&'a CallData>,
    tag: ObserverTag,
    table: &'a Observers,
}

impl<'a> Event<'a> {
    /// the registration currently being invoked
    pub fn tag(&self) -> ObserverTag {
        self.tag
    }

    /// unregister the callback that is currently running
    pub fn remove_self(&self) {
        self.table.remove(self.tag);
    }

    /// unregister any callback on the same object
    pub fn remove_observer(&self, tag: ObserverTag) {
        self.table.remove(tag);
    }

    /// the error/warning message, if any
    pub fn message(&self) -> Option<&str> {
        self.data.and_then(CallData::message)
    }
}

type Callback = Box<dyn FnMut(&Event<'_>) + Send>;

struct Entry {
    tag: ObserverTag,
    event: EventId,
    priority: f64,
    callback: Arc<Mutex<Callback>>,
}

#[derive(Default)]
struct Table {
    next_tag: u64,
    entries: Vec<Entry>,
}

/// Per-object observer table.
///
/// Cloning an `Observers` yields another handle to the same table.
#[derive(Clone, Default)]
pub struct Observers {
    table: Arc<Mutex<Table>>,
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("registered", &self.len())
            .finish()
    }
}

/// Non-owning handle to an observer table. Safe to capture in callbacks.
#[derive(Clone, Default)]
pub struct WeakObservers {
    table: Weak<Mutex<Table>>,
}

impl WeakObservers {
    /// remove a registration if the table is still alive
    pub fn remove(&self, tag: ObserverTag) -> bool {
        match self.table.upgrade() {
            Some(table) => Observers { table }.remove(tag),
            None => false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.table.strong_count() > 0
    }
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    /// register `callback` for `event`; higher `priority` fires first
    pub fn add<F>(&self, event: EventId, priority: f64, callback: F) -> ObserverTag
    where
        F: FnMut(&Event<'_>) + Send + 'static,
    {
        let mut table = lock(&self.table);
        table.next_tag += 1;
        let tag = ObserverTag(table.next_tag);
        table.entries.push(Entry {
            tag,
            event,
            priority,
            callback: Arc::new(Mutex::new(Box::new(callback))),
        });
        tag
    }

    /// remove a registration. Returns false if it was already gone.
    pub fn remove(&self, tag: ObserverTag) -> bool {
        let mut table = lock(&self.table);
        let before = table.entries.len();
        table.entries.retain(|e| e.tag != tag);
        before != table.entries.len()
    }

    /// remove every observer registered for `event`
    pub fn remove_all(&self, event: EventId) {
        lock(&self.table).entries.retain(|e| e.event != event);
    }

    pub fn has_observer(&self, event: EventId) -> bool {
        lock(&self.table)
            .entries
            .iter()
            .any(|e| e.event == event || e.event == EventId::AnyEvent)
    }

    pub fn len(&self) -> usize {
        lock(&self.table).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn downgrade(&self) -> WeakObservers {
        WeakObservers {
            table: Arc::downgrade(&self.table),
        }
    }

    /// Invoke every callback registered for `event`.
    ///
    /// Returns the number of callbacks that ran.
    pub fn invoke(&self, caller: ObjectId, event: EventId, data: Option<&CallData>) -> usize {
        // snapshot the matching registrations so callbacks can add/remove freely
        let mut pending: Vec<(usize, ObserverTag, f64, Arc<Mutex<Callback>>)> = {
            let table = lock(&self.table);
            table
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.event == event || e.event == EventId::AnyEvent)
                .map(|(i, e)| (i, e.tag, e.priority, Arc::clone(&e.callback)))
                .collect()
        };

        pending.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));

        let mut fired = 0;
        for (_, tag, _, callback) in pending {
            // a previous callback may have removed this one
            let still_registered = lock(&self.table).entries.iter().any(|e| e.tag == tag);
            if !still_registered {
                continue;
            }

            // re-entrant invocation of a callback that is already running is skipped
            let Ok(mut callback) = callback.try_lock() else {
                continue;
            };

            let event = Event {
                caller,
                id: event,
                data,
                tag,
                table: self,
            };
            (*callback)(&event);
            fired += 1;
        }

        fired
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // a panicking callback must not disable the table for everyone else
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
