//! # Runtime events emitted by the registry, the scheduler loop, and the mirror.
//!
//! [`EventKind`] classifies events across four categories:
//! - **Lifecycle**: registry transitions (registered, started, stopping, stopped, removed).
//! - **Group management**: rebalance after membership changes.
//! - **Shutdown**: drain progress and timeout.
//! - **Coordination**: remote commands and publish failures.
//!
//! Each event carries a globally unique, monotonically increasing sequence
//! number (`seq`) so consumers can order events delivered through async
//! channels.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Task lifecycle ===
    /// Task was registered and placed in the stopped registry.
    Registered,
    /// Task was bound and submitted to the worker pool.
    Started,
    /// Close was requested; the task moved to the stopping registry.
    Stopping,
    /// The monitor (or a direct removal) finalized the task as stopped.
    Stopped,
    /// Task was detached from its group for removal.
    Removed,
    /// A hook failed inside the scheduler loop; the loop continues.
    IterationFailed,

    // === Group management ===
    /// Group membership changed; indices and totals were recomputed.
    Rebalanced,

    // === Shutdown ===
    /// Shutdown drain has begun.
    ShutdownRequested,
    /// All tasks drained within the shutdown timeout.
    Drained,
    /// The shutdown timeout elapsed with tasks still running.
    ShutdownTimedOut,

    // === Coordination ===
    /// A remote command was accepted and dispatched to the registry.
    CommandReceived,
    /// A remote command could not be parsed or dispatched.
    CommandRejected,
    /// A mirror publication exhausted its retries.
    PublishFailed,

    // === Subscriber plumbing ===
    /// Subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,
    /// Subscriber panicked during event processing.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Task id, if applicable.
    pub task: Option<String>,
    /// Group name, if applicable.
    pub group: Option<String>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
    /// Whether a `Stopped` finalization also removed the task from its group.
    pub removed: Option<bool>,
    /// Iteration count at the time of the event, if relevant.
    pub iterations: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            group: None,
            error: None,
            removed: None,
            iterations: None,
        }
    }

    /// Attaches a task id.
    pub fn with_task(mut self, id: impl Into<String>) -> Self {
        self.task = Some(id.into());
        self
    }

    /// Attaches a group name.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Attaches the removed flag of a stopped finalization.
    pub fn with_removed(mut self, removed: bool) -> Self {
        self.removed = Some(removed);
        self
    }

    /// Attaches an iteration count.
    pub fn with_iterations(mut self, n: u64) -> Self {
        self.iterations = Some(n);
        self
    }
}
