use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::{Stream, StreamExt};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::bus::EventBus;
use crate::config::QUIT_KEY;
use crate::device::EventSource;
use crate::error::TrackerError;
use crate::event::{RawKeyEvent, ResolvedEvent};
use crate::resolver::SymbolResolver;
use crate::TrackerResult;

pub(crate) type SharedBus = Arc<Mutex<EventBus>>;

/// The first message of every session.
pub const SESSION_STARTED: &str = "=== new tracker session ===";

/// The lifecycle of a single capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Opening,
    Running,
    Stopping,
    Terminated,
    /// The device could not be opened. Absorbing.
    Error,
}

pub(crate) fn lock_bus(bus: &Mutex<EventBus>) -> MutexGuard<'_, EventBus> {
    // A panicking subscriber must not take the rest of the session down with it.
    bus.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reads key presses from an [`EventSource`], resolves them and publishes them on the bus.
pub(crate) struct CaptureLoop<R> {
    resolver: R,
    bus: SharedBus,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    quit_key: &'static str,
    state: CaptureState,
}

impl<R: SymbolResolver> CaptureLoop<R> {
    pub(crate) fn new(
        resolver: R,
        bus: SharedBus,
        running: Arc<AtomicBool>,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            resolver,
            bus,
            running,
            shutdown,
            quit_key: QUIT_KEY,
            state: CaptureState::Idle,
        }
    }

    /// Run one session to completion and return the final state.
    ///
    /// The device is always released before the terminal bus signal is sent.
    pub(crate) async fn run<S: EventSource>(mut self, source: S) -> CaptureState {
        self.transition(CaptureState::Opening);

        let mut events = match source.open() {
            Ok(events) => events,
            Err(e) => {
                warn!("{e}");
                return self.fail(&e);
            }
        };

        self.transition(CaptureState::Running);
        let outcome = self.capture(&mut events).await;
        drop(events);

        match outcome {
            Ok(()) => self.finish(),
            Err(e) => {
                // Sink and read failures end the session, not the process.
                error!("stopping the tracker: {e}");
                self.running.store(false, Ordering::SeqCst);
                self.finish()
            }
        }
    }

    async fn capture<E>(&mut self, events: &mut E) -> TrackerResult<()>
    where
        E: Stream<Item = TrackerResult<RawKeyEvent>> + Unpin,
    {
        self.publish(SESSION_STARTED)?;
        self.publish(format!("tracker started, press '{}' to quit", self.quit_key))?;

        let shutdown = Arc::clone(&self.shutdown);

        while self.running.load(Ordering::SeqCst) {
            let next = tokio::select! {
                next = events.next() => next,
                _ = shutdown.notified() => {
                    debug!("stop requested while waiting for input");
                    break;
                }
            };

            let Some(ev) = next else {
                info!("input device closed");
                self.running.store(false, Ordering::SeqCst);
                break;
            };

            let ev = ev?;
            if !ev.is_key_press() {
                continue;
            }

            let name = self.resolver.resolve(ev.code);
            self.publish(format!("key pressed: {name}"))?;

            if name == self.quit_key {
                self.publish(format!(
                    "quit key '{}' detected, shutting down...",
                    self.quit_key
                ))?;
                self.running.store(false, Ordering::SeqCst);
                break;
            }
        }

        Ok(())
    }

    fn publish(&self, message: impl Into<String>) -> TrackerResult<()> {
        lock_bus(&self.bus).publish(&ResolvedEvent::now(message))
    }

    fn finish(&mut self) -> CaptureState {
        self.transition(CaptureState::Stopping);
        lock_bus(&self.bus).signal_completion();
        self.transition(CaptureState::Terminated)
    }

    fn fail(&mut self, err: &TrackerError) -> CaptureState {
        lock_bus(&self.bus).signal_error(err);
        self.transition(CaptureState::Error)
    }

    fn transition(&mut self, next: CaptureState) -> CaptureState {
        debug!("capture {:?} -> {next:?}", self.state);
        self.state = next;
        next
    }
}
