//! # Cron schedule wrapper.
//!
//! [`Schedule`] is an opaque predicate over time: given an instant, it yields
//! the next fire time after it. Parsing and field semantics are delegated to
//! the `cron` crate (Quartz-style expressions with a seconds field, e.g.
//! `"*/5 * * * * *"` for every five seconds).
//!
//! Tasks without a schedule run as a continuous loop bounded by their
//! configured interval instead; see the scheduler loop in `core::runner`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::SchedulerError;

/// Opaque cron-like schedule.
///
/// Cheap to clone; cloning shares nothing mutable.
#[derive(Clone)]
pub struct Schedule {
    inner: cron::Schedule,
    expr: String,
}

impl Schedule {
    /// Parses a cron expression.
    ///
    /// # Errors
    /// Returns [`SchedulerError::InvalidCron`] when the expression does not parse.
    pub fn parse(expr: &str) -> Result<Self, SchedulerError> {
        let inner = cron::Schedule::from_str(expr).map_err(|e| SchedulerError::InvalidCron {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            inner,
            expr: expr.to_string(),
        })
    }

    /// Returns the next fire time strictly after `after`, or `None` when the
    /// schedule yields no further instants.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.inner.after(&after).next()
    }

    /// The original expression, for logs.
    pub fn source(&self) -> &str {
        &self.expr
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Schedule").field(&self.expr).finish()
    }
}
