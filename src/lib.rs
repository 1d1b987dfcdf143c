//! This crate tracks key presses on a Linux input device.
//!
//! A [`Tracker`] reads raw events from an evdev node, resolves the scan code of every key
//! press to its symbolic name with the system keyboard layout, and publishes a timestamped
//! message for it on an [`EventBus`]. Subscribers such as [`LogSink`] and [`ConsoleSink`]
//! receive every message in order. The session ends when the [`QUIT_KEY`] is pressed or the
//! tracker is stopped.
//!
//! # Example
//!
//! Print key presses to stdout until `q` is pressed. Reading input devices usually requires
//! root privileges.
//!
//! ```no_run
//! use keyboard_tracker::{ConsoleSink, Tracker, TrackerConfig, TrackerError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), TrackerError> {
//!     let mut tracker = Tracker::new(TrackerConfig::default())?;
//!     tracker.subscribe(ConsoleSink::stdio());
//!
//!     tracker.start()?;
//!     tracker.join().await?;
//!
//!     Ok(())
//! }
//! ```

#[cfg(not(target_os = "linux"))]
compile_error!("This crate only works on Linux");

mod bus;
mod capture;
mod config;
mod device;
mod error;
mod event;
mod resolver;
mod sink;
#[cfg(test)]
mod test_util;
mod tracker;

pub use bus::{BusState, EventBus, Subscriber, SubscriberId};
pub use capture::{CaptureState, SESSION_STARTED};
pub use config::{TrackerConfig, DEFAULT_DEVICE, LOG_FILE, POLL_INTERVAL, QUIT_KEY};
pub use device::{EventSource, InputDevice};
pub use error::{LayoutStep, TrackerError};
pub use event::{EventType, KeyValue, RawKeyEvent, ResolvedEvent};
pub use resolver::{SymbolResolver, XkbResolver, EVDEV_OFFSET, SYMBOL_NAME_MAX_LEN};
pub use sink::{ConsoleSink, LogSink};
pub use tracker::Tracker;

pub type TrackerResult<T> = Result<T, TrackerError>;
