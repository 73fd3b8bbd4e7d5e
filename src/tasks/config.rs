//! # Task descriptor: identity, shard assignment, and loop behavior.
//!
//! [`TaskConfig`] describes one replica of a group. Identity (`id`, `group`)
//! and loop behavior (schedule, interval, run limit, flags) are fixed at
//! construction; the shard assignment (`index`, `total`) is recomputed by the
//! registry's rebalance whenever group membership changes, so those two fields
//! are atomics and readers must re-read them at each use.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::SchedulerError;
use crate::schedule::Schedule;

/// Descriptor for one replica of a task group.
#[derive(Debug)]
pub struct TaskConfig {
    id: String,
    group: String,
    index: AtomicUsize,
    total: AtomicUsize,
    schedule: Option<Schedule>,
    interval: Duration,
    run_limit: u64,
    daemon: bool,
    lazy: bool,
    before_after_only: bool,
}

impl TaskConfig {
    /// Creates a descriptor with the given identity and shard assignment.
    ///
    /// # Errors
    /// Returns [`SchedulerError::Config`] when `group` is empty, `total` is
    /// zero, or `index` is not below `total`.
    pub fn new(
        id: impl Into<String>,
        group: impl Into<String>,
        index: usize,
        total: usize,
    ) -> Result<Self, SchedulerError> {
        let id = id.into();
        let group = group.into();

        if group.is_empty() {
            return Err(SchedulerError::Config {
                reason: format!("task '{id}' has an empty group"),
            });
        }
        if total == 0 || index >= total {
            return Err(SchedulerError::Config {
                reason: format!("task '{id}' has index {index} outside total {total}"),
            });
        }

        Ok(Self {
            id,
            group,
            index: AtomicUsize::new(index),
            total: AtomicUsize::new(total),
            schedule: None,
            interval: Duration::ZERO,
            run_limit: 0,
            daemon: false,
            lazy: false,
            before_after_only: false,
        })
    }

    /// Constructor for runtime-internal tasks whose identity is a known-good
    /// constant (the status monitor).
    pub(crate) fn internal(id: &str, group: &str) -> Self {
        Self {
            id: id.to_string(),
            group: group.to_string(),
            index: AtomicUsize::new(0),
            total: AtomicUsize::new(1),
            schedule: None,
            interval: Duration::ZERO,
            run_limit: 0,
            daemon: true,
            lazy: false,
            before_after_only: false,
        }
    }

    /// Sets the cron schedule. Without one the task runs as a continuous loop
    /// bounded by [`interval`](Self::with_interval).
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Sets the minimum sleep between iterations of an unscheduled task.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stops the task after `limit` iterations. Zero means unbounded.
    pub fn with_run_limit(mut self, limit: u64) -> Self {
        self.run_limit = limit;
        self
    }

    /// Marks the task as a daemon: it does not block the shutdown drain.
    pub fn daemon(mut self, daemon: bool) -> Self {
        self.daemon = daemon;
        self
    }

    /// A lazy task waits for its first scheduled instant instead of firing
    /// immediately on start.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Runs `before`/`after` once per start, surrounding the whole sequence of
    /// `execute` calls, instead of surrounding each iteration.
    pub fn before_after_only(mut self, only: bool) -> Self {
        self.before_after_only = only;
        self
    }

    /// Clones every setting under a new identity and shard assignment.
    ///
    /// Used by `append` when growing a group from its last replica.
    pub(crate) fn clone_as(&self, id: String, index: usize, total: usize) -> Self {
        Self {
            id,
            group: self.group.clone(),
            index: AtomicUsize::new(index),
            total: AtomicUsize::new(total),
            schedule: self.schedule.clone(),
            interval: self.interval,
            run_limit: self.run_limit,
            daemon: self.daemon,
            lazy: self.lazy,
            before_after_only: self.before_after_only,
        }
    }

    /// Unique task id, by convention `group + "-" + sequence`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Group this replica belongs to.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Current 0-based shard index. Re-read at each use; rebalance mutates it.
    pub fn index(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    /// Current group size. Re-read at each use; rebalance mutates it.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    pub(crate) fn set_index(&self, index: usize) {
        self.index.store(index, Ordering::Release);
    }

    pub(crate) fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Release);
    }

    /// Cron schedule, when present.
    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    /// Minimum sleep between iterations of an unscheduled task.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Iteration bound; zero means unbounded.
    pub fn run_limit(&self) -> u64 {
        self.run_limit
    }

    /// Whether the task is excluded from the shutdown drain count.
    pub fn is_daemon(&self) -> bool {
        self.daemon
    }

    /// Whether the first tick waits for its scheduled instant.
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Whether `before`/`after` surround the whole run instead of each iteration.
    pub fn is_before_after_only(&self) -> bool {
        self.before_after_only
    }
}
