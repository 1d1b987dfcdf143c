use std::io::{self, Write};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};

use crate::bus::Subscriber;
use crate::device::EventSource;
use crate::error::TrackerError;
use crate::event::{RawKeyEvent, ResolvedEvent};
use crate::TrackerResult;

/// A few scan codes under a US layout.
pub(crate) fn us_layout(code: u16) -> String {
    match code {
        1 => "Escape",
        16 => "q",
        24 => "o",
        30 => "a",
        42 => "Shift_L",
        _ => "NoSymbol",
    }
    .to_string()
}

/// An event source that replays a fixed list of events.
pub(crate) struct Scripted {
    events: Vec<TrackerResult<RawKeyEvent>>,
    hang: bool,
    pulled: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl Scripted {
    pub(crate) fn new(events: Vec<RawKeyEvent>) -> Self {
        Self::from_results(events.into_iter().map(Ok).collect())
    }

    pub(crate) fn from_results(events: Vec<TrackerResult<RawKeyEvent>>) -> Self {
        Self {
            events,
            hang: false,
            pulled: Arc::default(),
            released: Arc::default(),
        }
    }

    /// Block forever once the script is exhausted instead of ending the stream.
    pub(crate) fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    /// How many scripted events the consumer has taken.
    pub(crate) fn pulled(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pulled)
    }

    /// Set once the opened stream has been dropped.
    pub(crate) fn released(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }
}

pub(crate) struct ScriptedEvents {
    inner: BoxStream<'static, TrackerResult<RawKeyEvent>>,
    released: Arc<AtomicBool>,
}

impl Stream for ScriptedEvents {
    type Item = TrackerResult<RawKeyEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for ScriptedEvents {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

impl EventSource for Scripted {
    type Events = ScriptedEvents;

    fn open(self) -> TrackerResult<ScriptedEvents> {
        let pulled = self.pulled;
        let events = stream::iter(self.events).inspect(move |_| {
            pulled.fetch_add(1, Ordering::SeqCst);
        });
        let tail: BoxStream<'static, TrackerResult<RawKeyEvent>> = if self.hang {
            stream::pending().boxed()
        } else {
            stream::empty().boxed()
        };

        Ok(ScriptedEvents {
            inner: events.chain(tail).boxed(),
            released: self.released,
        })
    }
}

/// An event source whose device node does not exist.
pub(crate) struct FailingSource;

impl EventSource for FailingSource {
    type Events = ScriptedEvents;

    fn open(self) -> TrackerResult<ScriptedEvents> {
        Err(TrackerError::DeviceOpen {
            path: PathBuf::from("/dev/input/event99"),
            source: io::Error::from(io::ErrorKind::NotFound),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Delivery {
    Event(String),
    Error(String),
    Complete,
}

/// A subscriber that remembers everything it was sent.
#[derive(Debug, Clone, Default)]
pub(crate) struct Recorder(Arc<Mutex<Vec<Delivery>>>);

impl Recorder {
    pub(crate) fn deliveries(&self) -> Vec<Delivery> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Event(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }
}

impl Subscriber for Recorder {
    fn on_event(&mut self, event: &ResolvedEvent) -> TrackerResult<()> {
        self.0
            .lock()
            .unwrap()
            .push(Delivery::Event(event.message.clone()));
        Ok(())
    }

    fn on_error(&mut self, err: &TrackerError) {
        self.0.lock().unwrap().push(Delivery::Error(err.to_string()));
    }

    fn on_complete(&mut self) {
        self.0.lock().unwrap().push(Delivery::Complete);
    }
}

/// An in-memory writer that can be inspected after being handed to a sink.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
