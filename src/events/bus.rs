//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that lets the
//! registry, the scheduler loop, and the coordination plumbing broadcast
//! [`Event`]s to any number of subscribers.
//!
//! - **Broadcast semantics**: every active subscriber receives a clone of each event.
//! - **Non-persistent**: events published with no subscribers are dropped.
//! - **Bounded capacity**: slow subscribers observe `Lagged` instead of blocking publishers.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// Dropped silently when nobody listens; the runtime operates without
    /// observers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new subscriber receiving all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
