//! # Per-task execution statistics.
//!
//! [`Analysis`] is a lock-free counter block updated by the scheduler loop
//! after every iteration. [`AnalysisSnapshot`] is the serializable view
//! attached to every lifecycle publication to the coordination store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Lock-free execution counters for one task.
#[derive(Debug, Default)]
pub struct Analysis {
    executions: AtomicU64,
    failures: AtomicU64,
    last_run_ms: AtomicU64,
    last_elapsed_ms: AtomicU64,
    total_elapsed_ms: AtomicU64,
}

impl Analysis {
    /// Records one completed iteration.
    pub(crate) fn record(&self, started_at: SystemTime, elapsed: Duration, failed: bool) {
        let epoch_ms = started_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        let elapsed_ms = elapsed.as_millis() as u64;

        self.executions.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.last_run_ms.store(epoch_ms, Ordering::Relaxed);
        self.last_elapsed_ms.store(elapsed_ms, Ordering::Relaxed);
        self.total_elapsed_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
    }

    /// Number of completed iterations.
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Number of iterations in which a hook failed.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Consistent-enough copy of the counters for publication.
    pub fn snapshot(&self) -> AnalysisSnapshot {
        AnalysisSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_run_ms: self.last_run_ms.load(Ordering::Relaxed),
            last_elapsed_ms: self.last_elapsed_ms.load(Ordering::Relaxed),
            total_elapsed_ms: self.total_elapsed_ms.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`Analysis`], published with every state transition.
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisSnapshot {
    /// Completed iterations.
    pub executions: u64,
    /// Iterations with a contained hook failure.
    pub failures: u64,
    /// Epoch milliseconds of the last iteration start.
    pub last_run_ms: u64,
    /// Duration of the last iteration, milliseconds.
    pub last_elapsed_ms: u64,
    /// Cumulative runtime across iterations, milliseconds.
    pub total_elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates() {
        let a = Analysis::default();
        a.record(SystemTime::now(), Duration::from_millis(10), false);
        a.record(SystemTime::now(), Duration::from_millis(30), true);

        let snap = a.snapshot();
        assert_eq!(snap.executions, 2);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.last_elapsed_ms, 30);
        assert_eq!(snap.total_elapsed_ms, 40);
        assert!(snap.last_run_ms > 0);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let a = Analysis::default();
        a.record(SystemTime::now(), Duration::from_millis(5), false);
        let json = serde_json::to_string(&a.snapshot()).unwrap();
        assert!(json.contains("\"executions\":1"));
    }
}
