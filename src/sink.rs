use std::fs::{File, OpenOptions};
use std::io::{self, Stderr, Stdout, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::bus::Subscriber;
use crate::error::TrackerError;
use crate::event::ResolvedEvent;
use crate::TrackerResult;

/// Appends one line per event to a log file.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: File,
}

impl LogSink {
    /// Open (or create) the log file at `path` in append mode.
    pub fn open(path: impl AsRef<Path>) -> TrackerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| TrackerError::LogFile {
                path: path.clone(),
                source,
            })?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Subscriber for LogSink {
    fn on_event(&mut self, event: &ResolvedEvent) -> TrackerResult<()> {
        writeln!(self.file, "{event}")
            .and_then(|_| self.file.flush())
            .map_err(|source| TrackerError::Sink { sink: "log", source })
    }

    fn on_complete(&mut self) {
        if let Err(e) = self.file.sync_data() {
            debug!("failed to sync {}: {e}", self.path.display());
        }
    }
}

/// Prints events to `out` and the terminal error, if any, to `err`.
#[derive(Debug)]
pub struct ConsoleSink<O = Stdout, E = Stderr> {
    out: O,
    err: E,
}

impl ConsoleSink {
    /// A console sink writing to stdout and stderr.
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> ConsoleSink<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }
}

impl<O, E> Subscriber for ConsoleSink<O, E>
where
    O: Write + Send,
    E: Write + Send,
{
    fn on_event(&mut self, event: &ResolvedEvent) -> TrackerResult<()> {
        writeln!(self.out, "{event}")
            .and_then(|_| self.out.flush())
            .map_err(|source| TrackerError::Sink {
                sink: "console",
                source,
            })
    }

    fn on_error(&mut self, err: &TrackerError) {
        let _ = writeln!(self.err, "error: {err}");
    }

    fn on_complete(&mut self) {
        let _ = writeln!(self.out, "tracker finished.").and_then(|_| self.out.flush());
    }
}
