use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::info;

use crate::bus::{EventBus, Subscriber, SubscriberId};
use crate::capture::{lock_bus, CaptureLoop, CaptureState, SharedBus};
use crate::config::TrackerConfig;
use crate::device::EventSource;
use crate::error::TrackerError;
use crate::resolver::{SymbolResolver, XkbResolver};
use crate::TrackerResult;

/// Owns a capture session: starts it on its own task, stops it, and reports whether it is
/// still running.
pub struct Tracker<R = XkbResolver, S = PathBuf> {
    bus: SharedBus,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    /// The parts handed to the capture task on `start`.
    session: Option<(R, S)>,
    task: Option<JoinHandle<CaptureState>>,
}

impl Tracker {
    /// Create a tracker for `config.device` that resolves key names with the system layout.
    ///
    /// Fails if the keyboard layout cannot be loaded.
    pub fn new(config: TrackerConfig) -> TrackerResult<Self> {
        let resolver = XkbResolver::new()?;

        Ok(Self::with_source(resolver, config.device))
    }
}

impl<R, S> Tracker<R, S>
where
    R: SymbolResolver + 'static,
    S: EventSource,
{
    pub fn with_source(resolver: R, source: S) -> Self {
        Self {
            bus: Arc::new(Mutex::new(EventBus::new())),
            running: Arc::new(AtomicBool::new(true)),
            shutdown: Arc::new(Notify::new()),
            session: Some((resolver, source)),
            task: None,
        }
    }

    /// Spawn the capture task. A tracker can only be started once.
    ///
    /// This must be called from within a tokio runtime.
    pub fn start(&mut self) -> TrackerResult<()> {
        let (resolver, source) = self.session.take().ok_or(TrackerError::AlreadyStarted)?;

        let capture = CaptureLoop::new(
            resolver,
            Arc::clone(&self.bus),
            Arc::clone(&self.running),
            Arc::clone(&self.shutdown),
        );
        let running = Arc::clone(&self.running);

        self.task = Some(tokio::spawn(async move {
            let state = capture.run(source).await;
            // Whatever ended the session, the tracker is done.
            running.store(false, Ordering::SeqCst);
            state
        }));

        info!("tracker started");

        Ok(())
    }
}

impl<R, S> Tracker<R, S> {
    pub fn subscribe(&self, subscriber: impl Subscriber + 'static) -> SubscriberId {
        lock_bus(&self.bus).subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        lock_bus(&self.bus).unsubscribe(id)
    }

    /// Ask the capture task to stop. It finishes the current event, releases the device and
    /// signals completion.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("stopping the tracker");
        }

        self.shutdown.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait for the capture task to exit and return its final state.
    ///
    /// Returns [`CaptureState::Idle`] if the tracker was never started (or was already joined).
    pub async fn join(&mut self) -> TrackerResult<CaptureState> {
        match self.task.take() {
            Some(task) => Ok(task.await?),
            None => Ok(CaptureState::Idle),
        }
    }
}

impl<R, S> Drop for Tracker<R, S> {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SESSION_STARTED;
    use crate::event::RawKeyEvent;
    use crate::sink::{ConsoleSink, LogSink};
    use crate::test_util::{us_layout, Delivery, FailingSource, Recorder, Scripted, SharedBuf};
    use std::fs;
    use std::time::Duration;

    #[tokio::test]
    async fn runs_until_the_quit_key() {
        let mut tracker = Tracker::with_source(
            us_layout,
            Scripted::new(vec![
                RawKeyEvent::press(30),
                RawKeyEvent::press(16),
                RawKeyEvent::press(24),
            ])
            .hang(),
        );
        let recorder = Recorder::default();
        tracker.subscribe(recorder.clone());

        tracker.start().unwrap();
        let state = tracker.join().await.unwrap();

        assert_eq!(state, CaptureState::Terminated);
        assert!(!tracker.is_running());
        assert_eq!(
            recorder.messages(),
            [
                SESSION_STARTED,
                "tracker started, press 'q' to quit",
                "key pressed: a",
                "key pressed: q",
                "quit key 'q' detected, shutting down...",
            ]
        );
        assert_eq!(recorder.deliveries().last(), Some(&Delivery::Complete));
    }

    #[tokio::test]
    async fn starts_only_once() {
        let mut tracker = Tracker::with_source(us_layout, Scripted::new(vec![]).hang());

        tracker.start().unwrap();
        assert!(matches!(tracker.start(), Err(TrackerError::AlreadyStarted)));

        tracker.stop();
        tracker.join().await.unwrap();
    }

    #[tokio::test]
    async fn stop_ends_an_idle_session() {
        let mut tracker = Tracker::with_source(us_layout, Scripted::new(vec![]).hang());
        let recorder = Recorder::default();
        tracker.subscribe(recorder.clone());

        tracker.start().unwrap();
        assert!(tracker.is_running());
        tokio::time::sleep(Duration::from_millis(20)).await;
        tracker.stop();

        let state = tokio::time::timeout(Duration::from_secs(5), tracker.join())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(state, CaptureState::Terminated);
        assert!(!tracker.is_running());
        assert_eq!(recorder.deliveries().last(), Some(&Delivery::Complete));
    }

    #[tokio::test]
    async fn device_failure_still_clears_the_running_flag() {
        let mut tracker = Tracker::with_source(us_layout, FailingSource);
        let recorder = Recorder::default();
        tracker.subscribe(recorder.clone());

        tracker.start().unwrap();

        assert_eq!(tracker.join().await.unwrap(), CaptureState::Error);
        assert!(!tracker.is_running());
        assert!(recorder.messages().is_empty());
        assert_eq!(recorder.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn join_before_start_is_idle() {
        let mut tracker = Tracker::with_source(us_layout, FailingSource);

        assert_eq!(tracker.join().await.unwrap(), CaptureState::Idle);
        assert!(tracker.is_running());
    }

    #[tokio::test]
    async fn log_and_console_receive_identical_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("keyboard_events.log");
        let out = SharedBuf::default();

        let mut tracker = Tracker::with_source(
            us_layout,
            Scripted::new(vec![
                RawKeyEvent::press(42),
                RawKeyEvent::press(30),
                RawKeyEvent::press(16),
            ]),
        );
        tracker.subscribe(LogSink::open(&log_path).unwrap());
        tracker.subscribe(ConsoleSink::new(out.clone(), SharedBuf::default()));

        tracker.start().unwrap();
        tracker.join().await.unwrap();

        let logged = fs::read_to_string(&log_path).unwrap();
        let printed = out.contents();
        let printed = printed
            .strip_suffix("tracker finished.\n")
            .expect("completion notice is printed last");

        assert_eq!(logged, printed);
        assert_eq!(logged.lines().count(), 6);
        assert!(logged.lines().nth(3).unwrap().ends_with(": key pressed: a"));
    }
}
