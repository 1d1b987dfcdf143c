use std::path::PathBuf;
use std::time::Duration;

/// The input node read when no other device is configured.
pub const DEFAULT_DEVICE: &str = "/dev/input/event17";

/// The symbolic key name that ends a capture session.
pub const QUIT_KEY: &str = "q";

/// Where the binary appends its event log.
pub const LOG_FILE: &str = "keyboard_events.log";

/// How often the binary checks whether the tracker is still running.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// The evdev node to capture key presses from.
    pub device: PathBuf,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
        }
    }
}
