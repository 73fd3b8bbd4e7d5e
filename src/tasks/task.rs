//! # Task: a worker plus its lifecycle flags.
//!
//! [`Task`] bundles a [`TaskConfig`], a [`Worker`](crate::tasks::Worker), the
//! three lifecycle flags (`close`, `closed`, `remove`), the wake primitive,
//! and the [`Analysis`] counters.
//!
//! ## Flag protocol
//! - `close` is the cooperative stop signal. The loop observes it at every
//!   safe point (before a wait, after a wake); `execute` is never interrupted.
//! - `closed` is set by the loop itself once it has fully terminated. The
//!   status monitor uses it to finalize the `stopping -> stopped` move.
//! - `remove` marks a task detached from its group; the monitor drops such
//!   tasks instead of returning them to the stopped registry.
//!
//! A freshly created task is closed (`close = true`, `closed = true`) and
//! lives in the stopped registry until started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time;

use super::analysis::Analysis;
use super::config::TaskConfig;
use super::worker::WorkerRef;

/// Shared handle to a task.
pub type TaskRef = Arc<Task>;

/// One replica of a task group: worker, descriptor, flags, and counters.
pub struct Task {
    config: TaskConfig,
    worker: WorkerRef,
    close: AtomicBool,
    closed: AtomicBool,
    remove: AtomicBool,
    notify: Notify,
    analysis: Analysis,
}

impl Task {
    /// Creates a task in the stopped state (`close = true`, `closed = true`).
    pub fn new(config: TaskConfig, worker: WorkerRef) -> TaskRef {
        Arc::new(Self {
            config,
            worker,
            close: AtomicBool::new(true),
            closed: AtomicBool::new(true),
            remove: AtomicBool::new(false),
            notify: Notify::new(),
            analysis: Analysis::default(),
        })
    }

    /// Task id (unique across the process).
    pub fn id(&self) -> &str {
        self.config.id()
    }

    /// Group name.
    pub fn group(&self) -> &str {
        self.config.group()
    }

    /// Descriptor; `index`/`total` must be re-read at each use.
    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// The user-supplied worker.
    pub fn worker(&self) -> &WorkerRef {
        &self.worker
    }

    /// Execution counters.
    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    /// Whether a close has been requested.
    pub fn is_close(&self) -> bool {
        self.close.load(Ordering::Acquire)
    }

    pub(crate) fn set_close(&self, close: bool) {
        self.close.store(close, Ordering::Release);
    }

    /// Atomically claims the close transition; false when already requested.
    pub(crate) fn try_close(&self) -> bool {
        self.close
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether the loop has fully terminated.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn set_closed(&self, closed: bool) {
        self.closed.store(closed, Ordering::Release);
    }

    /// Whether the task has been detached from its group for removal.
    pub fn is_remove(&self) -> bool {
        self.remove.load(Ordering::Acquire)
    }

    pub(crate) fn set_remove(&self, remove: bool) {
        self.remove.store(remove, Ordering::Release);
    }

    /// Wakes the task out of a schedule wait or interval sleep immediately.
    ///
    /// Used by close and by the shutdown drain; a wake without a close request
    /// makes the loop re-check its schedule and proceed. A wake delivered
    /// while the task is between waits is stored and consumed by the next
    /// wait, so a close can never be slept through.
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    /// Sleeps up to `dur`, returning early on [`wake`](Self::wake).
    pub(crate) async fn idle(&self, dur: Duration) {
        if dur.is_zero() {
            return;
        }
        tokio::select! {
            _ = time::sleep(dur) => {}
            _ = self.notify.notified() => {}
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("group", &self.group())
            .field("close", &self.is_close())
            .field("closed", &self.is_closed())
            .field("remove", &self.is_remove())
            .finish()
    }
}
