//! # Registration contract: descriptors and property resolution.
//!
//! A [`TaskDescriptor`] is what application code hands the scheduler: one
//! worker plus the static settings of its group. Loading a descriptor creates
//! `parallel` replicas with consecutive indices and registers them.
//!
//! Parallelism and cron resolve against property files before the static
//! values apply:
//! - `parallel`: host CPU count when `core_parallel`, else the property value
//!   when positive, else the static value; clamped to zero or more. An
//!   unparseable property value aborts registration.
//! - `cron`: last non-blank property value, else the static expression.

use std::thread;
use std::time::Duration;

use crate::config::{last_non_blank, Properties};
use crate::error::SchedulerError;

use super::worker::WorkerRef;

/// Declarative registration request for one task group.
#[derive(Clone)]
pub struct TaskDescriptor {
    /// Group name; also the id prefix of every replica.
    pub group: String,
    /// Worker shared by every replica of the group.
    pub worker: WorkerRef,
    /// Static replica count, used when no property overrides it.
    pub parallel: usize,
    /// Use the host CPU count as the replica count.
    pub core_parallel: bool,
    /// Property key overriding `parallel` when set to a positive integer.
    pub parallel_property: Option<String>,
    /// Static cron expression; empty/absent means interval mode.
    pub cron: Option<String>,
    /// Property key overriding `cron` when set to a non-blank value.
    pub cron_property: Option<String>,
    /// Minimum sleep between iterations in interval mode.
    pub interval: Duration,
    /// Iteration bound; zero means unbounded. Negatives are rejected at load.
    pub run_limit: i64,
    /// See [`TaskConfig::before_after_only`](crate::TaskConfig::is_before_after_only).
    pub before_after_only: bool,
    /// Daemon replicas do not block the shutdown drain.
    pub daemon: bool,
    /// Lazy replicas wait for their first scheduled instant.
    pub lazy: bool,
}

impl TaskDescriptor {
    /// Creates a descriptor with one replica and no schedule.
    pub fn new(group: impl Into<String>, worker: WorkerRef) -> Self {
        Self {
            group: group.into(),
            worker,
            parallel: 1,
            core_parallel: false,
            parallel_property: None,
            cron: None,
            cron_property: None,
            interval: Duration::ZERO,
            run_limit: 0,
            before_after_only: false,
            daemon: false,
            lazy: false,
        }
    }

    /// Sets the static replica count.
    pub fn parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }

    /// Uses the host CPU count as the replica count.
    pub fn core_parallel(mut self, core: bool) -> Self {
        self.core_parallel = core;
        self
    }

    /// Sets the property key overriding the replica count.
    pub fn parallel_property(mut self, key: impl Into<String>) -> Self {
        self.parallel_property = Some(key.into());
        self
    }

    /// Sets the static cron expression.
    pub fn cron(mut self, expr: impl Into<String>) -> Self {
        self.cron = Some(expr.into());
        self
    }

    /// Sets the property key overriding the cron expression.
    pub fn cron_property(mut self, key: impl Into<String>) -> Self {
        self.cron_property = Some(key.into());
        self
    }

    /// Sets the inter-iteration interval for interval mode.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Bounds the number of iterations; zero means unbounded.
    pub fn run_limit(mut self, limit: i64) -> Self {
        self.run_limit = limit;
        self
    }

    /// Runs `before`/`after` once per start instead of per iteration.
    pub fn before_after_only(mut self, only: bool) -> Self {
        self.before_after_only = only;
        self
    }

    /// Marks replicas as daemons.
    pub fn daemon(mut self, daemon: bool) -> Self {
        self.daemon = daemon;
        self
    }

    /// Makes replicas wait for their first scheduled instant.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Rejects descriptors that cannot be registered.
    ///
    /// # Errors
    /// Returns [`SchedulerError::Config`] for an empty group name or a
    /// negative run limit.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.group.trim().is_empty() {
            return Err(SchedulerError::Config {
                reason: "descriptor has an empty group name".to_string(),
            });
        }
        if self.run_limit < 0 {
            return Err(SchedulerError::Config {
                reason: format!(
                    "group '{}' has negative run limit {}",
                    self.group, self.run_limit
                ),
            });
        }
        Ok(())
    }

    /// Resolves the effective replica count against property files.
    ///
    /// # Errors
    /// Returns [`SchedulerError::Config`] on an unparseable property value.
    pub fn resolved_parallel(&self, props: &Properties) -> Result<usize, SchedulerError> {
        let mut from_property: i64 = 0;
        if let Some(key) = &self.parallel_property {
            if let Some(value) = last_non_blank(props, key) {
                from_property = value.parse().map_err(|_| SchedulerError::Config {
                    reason: format!(
                        "parallel property '{key}' for group '{}' must be an integer, got '{value}'",
                        self.group
                    ),
                })?;
            }
        }

        let parallel = if self.core_parallel {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1) as i64
        } else if from_property > 0 {
            from_property
        } else {
            self.parallel as i64
        };

        Ok(parallel.max(0) as usize)
    }

    /// Resolves the effective cron expression against property files.
    pub fn resolved_cron(&self, props: &Properties) -> Option<String> {
        if let Some(key) = &self.cron_property {
            if let Some(value) = last_non_blank(props, key) {
                return Some(value);
            }
        }
        self.cron
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkError;
    use crate::tasks::worker::WorkerFn;
    use std::collections::HashMap;

    fn noop() -> WorkerRef {
        WorkerFn::arc(|| async { Ok::<_, WorkError>(()) })
    }

    fn file(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn static_parallel_when_no_property() {
        let d = TaskDescriptor::new("sync", noop()).parallel(3);
        assert_eq!(d.resolved_parallel(&Vec::new()).unwrap(), 3);
    }

    #[test]
    fn positive_property_beats_static() {
        let d = TaskDescriptor::new("sync", noop())
            .parallel(3)
            .parallel_property("sync.parallel");
        let props = vec![
            file(&[("sync.parallel", "2")]),
            file(&[("sync.parallel", "5")]),
        ];
        assert_eq!(d.resolved_parallel(&props).unwrap(), 5);
    }

    #[test]
    fn non_positive_property_falls_back_to_static() {
        let d = TaskDescriptor::new("sync", noop())
            .parallel(3)
            .parallel_property("sync.parallel");
        let props = vec![file(&[("sync.parallel", "0")])];
        assert_eq!(d.resolved_parallel(&props).unwrap(), 3);
    }

    #[test]
    fn core_parallel_uses_cpu_count() {
        let d = TaskDescriptor::new("sync", noop()).parallel(3).core_parallel(true);
        assert!(d.resolved_parallel(&Vec::new()).unwrap() >= 1);
    }

    #[test]
    fn malformed_parallel_property_is_config_error() {
        let d = TaskDescriptor::new("sync", noop()).parallel_property("sync.parallel");
        let props = vec![file(&[("sync.parallel", "many")])];
        let err = d.resolved_parallel(&props).unwrap_err();
        assert_eq!(err.as_label(), "scheduler_config");
    }

    #[test]
    fn negative_run_limit_is_rejected() {
        let d = TaskDescriptor::new("sync", noop()).run_limit(-1);
        assert!(d.validate().is_err());
        assert!(TaskDescriptor::new("sync", noop()).validate().is_ok());
    }

    #[test]
    fn cron_property_beats_static_expression() {
        let d = TaskDescriptor::new("sync", noop())
            .cron("0 0 * * * *")
            .cron_property("sync.cron");
        let props = vec![file(&[("sync.cron", "*/5 * * * * *")])];
        assert_eq!(d.resolved_cron(&props).as_deref(), Some("*/5 * * * * *"));
        assert_eq!(d.resolved_cron(&Vec::new()).as_deref(), Some("0 0 * * * *"));
    }

    #[test]
    fn blank_cron_means_interval_mode() {
        let d = TaskDescriptor::new("sync", noop()).cron("  ");
        assert_eq!(d.resolved_cron(&Vec::new()), None);
    }
}
