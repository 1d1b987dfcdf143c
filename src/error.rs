use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to open log file {}: {source}", path.display())]
    LogFile { path: PathBuf, source: io::Error },
    #[error("failed to open input device {}: {source}", path.display())]
    DeviceOpen { path: PathBuf, source: io::Error },
    #[error("libxkbcommon could not be loaded")]
    LayoutUnavailable,
    #[error("failed to create {0}")]
    Layout(LayoutStep),
    #[error("{sink} sink failed: {source}")]
    Sink { sink: &'static str, source: io::Error },
    #[error("the event bus has already been terminated")]
    BusClosed,
    #[error("the tracker has already been started")]
    AlreadyStarted,
    #[error("capture task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The keyboard layout object that failed to initialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutStep {
    Context,
    Keymap,
    State,
}

impl fmt::Display for LayoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayoutStep::Context => "xkb_context",
            LayoutStep::Keymap => "xkb_keymap",
            LayoutStep::State => "xkb_state",
        };

        f.write_str(name)
    }
}
