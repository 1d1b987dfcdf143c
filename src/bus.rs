//! A minimal in-process multicast channel for [`ResolvedEvent`]s.
//!
//! Every subscriber receives every published event synchronously, in subscription order.
//! A session ends with exactly one terminal notification: either an error or completion.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::TrackerError;
use crate::event::ResolvedEvent;
use crate::TrackerResult;

/// A consumer of the events published on an [`EventBus`].
///
/// Callbacks run on the publishing task and must not block for long.
pub trait Subscriber: Send {
    fn on_event(&mut self, event: &ResolvedEvent) -> TrackerResult<()>;

    fn on_error(&mut self, _err: &TrackerError) {}

    fn on_complete(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Open,
    Errored,
    Completed,
}

pub struct EventBus {
    state: BusState,
    next_id: u64,
    subscribers: BTreeMap<SubscriberId, Box<dyn Subscriber>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            state: BusState::Open,
            next_id: 0,
            subscribers: BTreeMap::new(),
        }
    }

    /// Register `subscriber` for all future events.
    ///
    /// Once the bus has been terminated, the subscriber is dropped without receiving anything.
    pub fn subscribe(&mut self, subscriber: impl Subscriber + 'static) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;

        if self.is_terminated() {
            debug!("subscriber {id:?} registered on a terminated bus");
        } else {
            self.subscribers.insert(id, Box::new(subscriber));
        }

        id
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn state(&self) -> BusState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state != BusState::Open
    }

    /// Deliver `event` to every subscriber.
    ///
    /// A failing subscriber does not prevent delivery to the others; the first failure is
    /// returned once everyone has been called.
    pub fn publish(&mut self, event: &ResolvedEvent) -> TrackerResult<()> {
        if self.is_terminated() {
            return Err(TrackerError::BusClosed);
        }

        let mut first_err = None;

        for (id, subscriber) in self.subscribers.iter_mut() {
            if let Err(e) = subscriber.on_event(event) {
                warn!("subscriber {id:?} failed: {e}");
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Terminate the stream with an error. Returns `false` if it was already terminated.
    pub fn signal_error(&mut self, err: &TrackerError) -> bool {
        if self.is_terminated() {
            return false;
        }

        self.state = BusState::Errored;
        self.subscribers.values_mut().for_each(|s| s.on_error(err));
        self.subscribers.clear();

        true
    }

    /// Terminate the stream normally. Returns `false` if it was already terminated.
    pub fn signal_completion(&mut self) -> bool {
        if self.is_terminated() {
            return false;
        }

        self.state = BusState::Completed;
        self.subscribers.values_mut().for_each(|s| s.on_complete());
        self.subscribers.clear();

        true
    }
}
