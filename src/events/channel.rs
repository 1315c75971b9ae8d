//! Progress channel between the library and whoever renders it.
//!
//! Scans, refreshes and organizer runs report through an [`EventSender`].
//! Delivery is best effort: when the listening side is gone the events are
//! dropped and the work carries on.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Event;

/// Producer half, cloned into every worker
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Report one event
    pub fn send(&self, event: Event) {
        // Err only means the listener hung up
        self.inner.send(event).ok();
    }
}

/// Consumer half, usually drained on a dedicated UI thread
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Yields events until every sender has been dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

pub struct EventChannel;

impl EventChannel {
    /// Unbounded so a slow progress bar never stalls the worker pool
    pub fn new() -> (EventSender, EventReceiver) {
        let (tx, rx) = unbounded();
        (EventSender { inner: tx }, EventReceiver { inner: rx })
    }
}

/// Sender whose receiver is already gone
pub fn null_sender() -> EventSender {
    EventChannel::new().0
}
