//! # Objects
//!
//! Identity, modification time and observers shared by every observable type in the
//! crate (arrays, algorithms, lookup tables, renderers, interactors...).
//!
//! Modification times come from a single process-wide monotonic clock so that times of
//! unrelated objects can be compared, which is what the pipeline executive relies on.

mod events;

pub use events::{CallData, Event, EventId, ObserverTag, Observers, WeakObservers};

use std::sync::atomic::{AtomicU64, Ordering};

static CLOCK: AtomicU64 = AtomicU64::new(0);
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Advance the global modification clock and return the new time.
pub fn next_time_stamp() -> u64 {
    CLOCK.fetch_add(1, Ordering::SeqCst) + 1
}

/// The current value of the global clock, without advancing it.
pub fn current_time_stamp() -> u64 {
    CLOCK.load(Ordering::SeqCst)
}

/// Process-unique identity of an observable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display(fmt = "object#{}", _0)]
pub struct ObjectId(pub u64);

impl ObjectId {
    pub fn new() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity + modification time + observers.
///
/// Types embed an `Object` and expose it through [`Observable`].
#[derive(Debug)]
pub struct Object {
    id: ObjectId,
    mtime: u64,
    observers: Observers,
    error_occurred: bool,
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Object {
    /// a clone is a new object: fresh id, no observers, same modification time
    fn clone(&self) -> Self {
        Self {
            id: ObjectId::new(),
            mtime: self.mtime,
            observers: Observers::new(),
            error_occurred: false,
        }
    }
}

impl Object {
    pub fn new() -> Self {
        Self {
            id: ObjectId::new(),
            mtime: next_time_stamp(),
            observers: Observers::new(),
            error_occurred: false,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn mtime(&self) -> u64 {
        self.mtime
    }

    /// bump the modification time and fire `ModifiedEvent`
    pub fn modified(&mut self) {
        self.mtime = next_time_stamp();
        self.observers.invoke(self.id, EventId::ModifiedEvent, None);
    }

    pub fn observers(&self) -> &Observers {
        &self.observers
    }

    pub fn invoke(&self, event: EventId, data: Option<&CallData>) -> usize {
        self.observers.invoke(self.id, event, data)
    }

    /// Report an error: log it, fire `ErrorEvent` with the message and remember that
    /// an error happened.
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(object = %self.id, "{message}");
        self.error_occurred = true;
        let data = CallData::Message(message);
        self.observers.invoke(self.id, EventId::ErrorEvent, Some(&data));
    }

    pub fn warning(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(object = %self.id, "warning: {message}");
        let data = CallData::Message(message);
        self.observers.invoke(self.id, EventId::WarningEvent, Some(&data));
    }

    pub fn error_occurred(&self) -> bool {
        self.error_occurred
    }

    pub fn clear_error(&mut self) {
        self.error_occurred = false;
    }
}

/// Implemented by every type that embeds an [`Object`].
pub trait Observable {
    fn object(&self) -> &Object;
    fn object_mut(&mut self) -> &mut Object;

    fn id(&self) -> ObjectId {
        self.object().id()
    }

    fn mtime(&self) -> u64 {
        self.object().mtime()
    }

    fn modified(&mut self) {
        self.object_mut().modified()
    }

    /// `AddObserver(event, callback, priority)`
    fn add_observer<F>(&self, event: EventId, priority: f64, callback: F) -> ObserverTag
    where
        F: FnMut(&Event<'_>) + Send + 'static,
        Self: Sized,
    {
        self.object().observers().add(event, priority, callback)
    }

    fn remove_observer(&self, tag: ObserverTag) -> bool {
        self.object().observers().remove(tag)
    }

    fn invoke_event(&self, event: EventId, data: Option<&CallData>) -> usize {
        self.object().invoke(event, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Thing {
        object: Object,
    }

    impl Observable for Thing {
        fn object(&self) -> &Object {
            &self.object
        }
        fn object_mut(&mut self) -> &mut Object {
            &mut self.object
        }
    }

    #[test]
    fn command_observation_round_trip() {
        let mut thing = Thing {
            object: Object::new(),
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let tag = thing.add_observer(EventId::ModifiedEvent, 0.0, move |event| {
            s.lock().unwrap().push((event.caller, event.id.as_str()));
        });

        thing.modified();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(thing.id(), "ModifiedEvent")]
        );

        assert!(thing.remove_observer(tag));
        thing.modified();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn modification_times_increase() {
        let mut a = Object::new();
        let b = Object::new();
        assert!(b.mtime() > a.mtime());
        a.modified();
        assert!(a.mtime() > b.mtime());
    }

    #[test]
    fn error_sets_flag_and_fires() {
        let mut object = Object::new();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let m = Arc::clone(&messages);
        object.observers().add(EventId::ErrorEvent, 0.0, move |event| {
            m.lock().unwrap().push(event.message().unwrap_or_default().to_string());
        });
        object.error("bad range");
        assert!(object.error_occurred());
        assert_eq!(*messages.lock().unwrap(), vec!["bad range".to_string()]);
    }
}
