//! # Error types used by the taskherd runtime and workers.
//!
//! Three error enums, split by who produces them:
//!
//! - [`SchedulerError`] errors raised by registration and lifecycle operations.
//! - [`WorkError`] errors raised inside worker hooks (`before`/`execute`/`after`/`destroy`).
//! - [`StoreError`] errors raised by the coordination key/value store.
//!
//! [`WorkError`] is always contained by the scheduler loop: it is logged and
//! counted, never propagated. [`StoreError`] is retried by the mirror and never
//! blocks local scheduling. Only [`SchedulerError`] reaches callers.

use thiserror::Error;

/// Errors produced by registration and lifecycle operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Malformed configuration value (parallel property, timeout, regex filter).
    ///
    /// Fatal at load time; aborts registration.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What was malformed and where it came from.
        reason: String,
    },

    /// Cron expression did not parse.
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron {
        /// The offending expression.
        expr: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Attempted to register a task with an id that already exists
    /// in any of the three registries.
    #[error("task '{id}' is already registered")]
    AlreadyRegistered {
        /// The duplicate task id.
        id: String,
    },

    /// Single-id operation referenced an unknown task.
    #[error("task '{id}' not found")]
    NotFound {
        /// The missing task id.
        id: String,
    },
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::Config { .. } => "scheduler_config",
            SchedulerError::InvalidCron { .. } => "scheduler_invalid_cron",
            SchedulerError::AlreadyRegistered { .. } => "scheduler_already_registered",
            SchedulerError::NotFound { .. } => "scheduler_not_found",
        }
    }
}

/// Errors produced inside worker hooks.
///
/// The scheduler loop catches these at every hook boundary: the failure is
/// logged, recorded in the task's analysis block, and the loop continues with
/// the next iteration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkError {
    /// Hook execution failed; the loop continues on the next iteration.
    #[error("execution failed: {reason}")]
    Fail {
        /// Human-readable failure cause.
        reason: String,
    },
}

impl WorkError {
    /// Convenience constructor for the common case.
    pub fn fail(reason: impl Into<String>) -> Self {
        WorkError::Fail {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkError::Fail { .. } => "work_failed",
        }
    }
}

impl From<std::io::Error> for WorkError {
    fn from(e: std::io::Error) -> Self {
        WorkError::Fail {
            reason: e.to_string(),
        }
    }
}

/// Errors produced by the coordination key/value store.
///
/// Publishing is retried by the mirror's backoff policy; watch streams are
/// re-established. These never propagate into registry operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Read or write against the store failed.
    #[error("store operation failed: {reason}")]
    Io {
        /// Transport or backend diagnostic.
        reason: String,
    },

    /// The store (or its watch stream) has been closed.
    #[error("store closed")]
    Closed,
}
