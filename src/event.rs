pub(crate) mod event_codes;

use chrono::{DateTime, Local};
use std::fmt;

use event_codes::{EV_KEY, EV_KEY_PRESS, EV_KEY_RELEASE, EV_KEY_REPEAT};

/// The `ctime(3)` layout, without the trailing newline.
const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// A raw event read from the input device, before any layout translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    /// The hardware scan code.
    pub code: u16,
    pub ty: EventType,
    pub value: KeyValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// EV_KEY
    Key,
    /// Any other event type (EV_SYN, EV_MSC, ...).
    Other(u16),
}

/// The `value` of a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyValue {
    Released,
    Pressed,
    Repeat,
    Unknown(i32),
}

impl RawKeyEvent {
    pub fn new(code: u16, ty: EventType, value: KeyValue) -> Self {
        Self { code, ty, value }
    }

    /// A key press of `code`.
    pub fn press(code: u16) -> Self {
        Self::new(code, EventType::Key, KeyValue::Pressed)
    }

    /// Whether this is an EV_KEY event caused by a key being pressed down.
    ///
    /// Releases and autorepeats do not count as presses.
    pub fn is_key_press(&self) -> bool {
        self.ty == EventType::Key && self.value == KeyValue::Pressed
    }
}

impl From<u16> for EventType {
    fn from(ty: u16) -> Self {
        match ty {
            EV_KEY => EventType::Key,
            other => EventType::Other(other),
        }
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        match value {
            EV_KEY_RELEASE => KeyValue::Released,
            EV_KEY_PRESS => KeyValue::Pressed,
            EV_KEY_REPEAT => KeyValue::Repeat,
            n => KeyValue::Unknown(n),
        }
    }
}

impl From<&libc::input_event> for RawKeyEvent {
    fn from(ev: &libc::input_event) -> Self {
        Self {
            code: ev.code,
            ty: ev.type_.into(),
            value: ev.value.into(),
        }
    }
}

/// A timestamped message published on the event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEvent {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl ResolvedEvent {
    /// Create an event stamped with the current wall-clock time.
    pub fn now(message: impl Into<String>) -> Self {
        Self::at(Local::now(), message)
    }

    pub fn at(timestamp: DateTime<Local>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }
}

impl fmt::Display for ResolvedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.message
        )
    }
}
