//! Text recording and playback of interactor events.
//!
//! One event per line:
//!
//! ```text
//! # StreamVersion 2
//! LeftButtonPressEvent 150 150 0 0 0 0 0 0
//! MouseMoveEvent 160 152 0 0 0 0 0 0
//! KeyPressEvent 160 152 0 0 114 0 r 0
//! ```
//!
//! Fields are `EventName x y ctrl shift keyCode repeatCount keySym alt`; a key sym of
//! `0` means none. Lines starting with `#` are comments.

use super::{InputState, Interactor};
use crate::object::{CallData, EventId, ObserverTag, Observable};
use crate::{Error, Result};

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

pub const STREAM_HEADER: &str = "# StreamVersion 2";

/// One recorded input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub event: EventId,
    pub state: InputState,
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.state;
        write!(
            f,
            "{} {} {} {} {} {} {} {} {}",
            self.event,
            s.position[0],
            s.position[1],
            s.ctrl as u8,
            s.shift as u8,
            s.key_code,
            s.repeat_count,
            s.key_sym.as_deref().unwrap_or("0"),
            s.alt as u8,
        )
    }
}

fn field<T: FromStr>(fields: &[&str], index: usize, line: &str) -> Result<T> {
    fields
        .get(index)
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| Error::file_format(format!("bad field {index} in event line `{line}`")))
}

fn flag(fields: &[&str], index: usize, line: &str) -> Result<bool> {
    Ok(field::<i32>(fields, index, line)? != 0)
}

impl FromStr for EventRecord {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 8 {
            return Err(Error::file_format(format!("short event line `{line}`")));
        }
        let event: EventId = fields[0].parse()?;
        if !event.is_input_event() {
            return Err(Error::file_format(format!("{event} is not an input event")));
        }
        let key_sym = match fields[7] {
            "0" => None,
            sym => Some(sym.to_string()),
        };
        let state = InputState {
            position: [field(&fields, 1, line)?, field(&fields, 2, line)?],
            ctrl: flag(&fields, 3, line)?,
            shift: flag(&fields, 4, line)?,
            key_code: field(&fields, 5, line)?,
            repeat_count: field(&fields, 6, line)?,
            key_sym,
            // older streams end at the key sym
            alt: if fields.len() > 8 { flag(&fields, 8, line)? } else { false },
        };
        Ok(Self { event, state })
    }
}

/// Records of `text`, in order; comments and blank lines are skipped.
pub fn parse_records(text: &str) -> impl Iterator<Item = Result<EventRecord>> + '_ {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::parse)
}

/// Feed `records` to `interactor` in order, stopping at the first bad record.
/// Returns the number of events played.
pub fn play<I>(records: I, interactor: &mut Interactor) -> Result<usize>
where
    I: IntoIterator<Item = Result<EventRecord>>,
{
    records.into_iter().try_fold(0, |played, record| {
        let record = record?;
        interactor.process(record.event, record.state)?;
        Ok(played + 1)
    })
}

/// Captures the input events of the interactors it is attached to.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    lines: Arc<Mutex<Vec<String>>>,
    attached: Vec<(crate::object::ObjectId, ObserverTag)>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start recording the input events of `interactor`.
    pub fn attach(&mut self, interactor: &Interactor) {
        let lines = Arc::clone(&self.lines);
        let tag = interactor.add_observer(EventId::AnyEvent, 0.0, move |event| {
            if !event.id.is_input_event() {
                return;
            }
            if let Some(CallData::Input(state)) = event.data {
                let record = EventRecord {
                    event: event.id,
                    state: state.clone(),
                };
                if let Ok(mut lines) = lines.lock() {
                    lines.push(record.to_string());
                }
            }
        });
        self.attached.push((interactor.id(), tag));
    }

    /// Stop recording `interactor`.
    pub fn detach(&mut self, interactor: &Interactor) {
        let id = interactor.id();
        self.attached.retain(|&(object, tag)| {
            if object == id {
                interactor.remove_observer(tag);
                false
            } else {
                true
            }
        });
    }

    pub fn number_of_events(&self) -> usize {
        self.lines.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }

    /// The recording as text, header included.
    pub fn contents(&self) -> String {
        let mut out = String::from(STREAM_HEADER);
        out.push('\n');
        if let Ok(lines) = self.lines.lock() {
            for line in lines.iter() {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }

    pub fn records(&self) -> Result<Vec<EventRecord>> {
        parse_records(&self.contents()).collect()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.contents())?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Vec<EventRecord>> {
        let text = std::fs::read_to_string(path)?;
        if !text.lines().next().map_or(false, |l| l.trim_start().starts_with("# StreamVersion")) {
            tracing::debug!("event stream without a version header");
        }
        parse_records(&text).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Renderer;

    #[test]
    fn line_format() {
        let record = EventRecord {
            event: EventId::KeyPressEvent,
            state: InputState {
                position: [10, 20],
                shift: true,
                key_code: 'q' as i32,
                key_sym: Some("q".into()),
                ..InputState::default()
            },
        };
        assert_eq!(record.to_string(), "KeyPressEvent 10 20 0 1 113 0 q 0");
        assert_eq!(record.to_string().parse::<EventRecord>().unwrap(), record);

        let legacy: EventRecord = "MouseMoveEvent 5 6 1 0 0 0 0".parse().unwrap();
        assert_eq!(legacy.state.position, [5, 6]);
        assert!(legacy.state.ctrl && !legacy.state.alt);
        assert!(legacy.state.key_sym.is_none());

        assert!("ModifiedEvent 0 0 0 0 0 0 0 0".parse::<EventRecord>().is_err());
        assert!("MouseMoveEvent x 0 0 0 0 0 0 0".parse::<EventRecord>().is_err());
    }

    #[test]
    fn records_only_input_events() {
        let mut interactor = Interactor::new(Renderer::new());
        let mut recorder = Recorder::new();
        recorder.attach(&interactor);
        interactor.left_button_press(1, 2).unwrap();
        interactor.mouse_move(3, 4).unwrap();
        interactor.left_button_release(3, 4).unwrap();
        recorder.detach(&interactor);
        interactor.mouse_move(9, 9).unwrap();

        let text = recorder.contents();
        assert!(text.starts_with(STREAM_HEADER));
        let events: Vec<EventId> = recorder.records().unwrap().into_iter().map(|r| r.event).collect();
        assert_eq!(
            events,
            vec![
                EventId::LeftButtonPressEvent,
                EventId::MouseMoveEvent,
                EventId::LeftButtonReleaseEvent
            ]
        );
    }
}
