//! # Event bus for broadcasting task lifecycle events.
//!
//! [`Bus`] is a wrapper around [`tokio::sync::broadcast`] that lets the
//! executor and the scheduler façade publish [`TaskEvent`]s to any number of
//! subscribers simultaneously.
//!
//! ## Key characteristics:
//! - **Broadcast semantics**: all active subscribers receive a clone of each event
//! - **Non-persistent**: events are lost if there are no active subscribers
//! - **Bounded capacity**: old events are dropped when the channel is full
//!
//! ## Usage:
//! - [`Bus::publish`] broadcasts an event to all current subscribers (non-blocking)
//! - [`Bus::subscribe`] creates a new receiver that will receive all future events
//!
//! The scheduler keeps one internal subscription alive to fan events out to
//! registered [`Subscribe`](crate::subscribers::Subscribe) implementors.

use tokio::sync::broadcast;

use super::event::TaskEvent;

/// Broadcast channel for task lifecycle events.
///
/// Wrapper over [`tokio::sync::broadcast`] that provides `publish`/`subscribe`
/// methods for working with [`TaskEvent`]s.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<TaskEvent>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    ///
    /// When capacity is exceeded, the oldest unsent events are dropped for
    /// lagging receivers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no active subscribers, the event is dropped silently.
    /// This is intentional as the scheduler can operate without observers.
    pub fn publish(&self, ev: TaskEvent) {
        let _ = self.tx.send(ev);
    }

    /// Subscribes to the bus and returns a new receiver.
    ///
    /// Each call creates an independent receiver that sees every event
    /// published after this point.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }
}
