//! # Shutdown drain.
//!
//! Orderly termination of the task fleet:
//!
//! 1. Poll any external work gate until it reports empty.
//! 2. Request a close on every started task.
//! 3. Snapshot `started + stopping` and wake every task out of its wait.
//! 4. Poll the remaining non-daemon count, re-waking the snapshot each cycle,
//!    until drained or the shutdown timeout elapses.
//! 5. Report the outcome; a timeout is logged with the leaked ids, never
//!    raised to the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time;
use tracing::{info, warn};

use crate::events::{Bus, Event, EventKind};

use super::registry::Registry;

/// Poll cadence while waiting on the external work gate.
const GATE_POLL: Duration = Duration::from_millis(10);
/// Poll cadence while waiting for tasks to drain.
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Callback reporting outstanding external work that must finish before the
/// task fleet is closed.
pub type DrainGate = dyn Fn() -> usize + Send + Sync;

/// Outcome of a shutdown drain.
#[derive(Debug)]
pub struct ShutdownReport {
    /// Whether every non-daemon task reached `closed` in time.
    pub drained: bool,
    /// Wall time the drain took.
    pub elapsed: Duration,
    /// Ids of non-daemon tasks still running when the timeout elapsed.
    pub leaked: Vec<String>,
}

/// Runs the drain sequence against the registry.
pub(crate) async fn drain(
    registry: &Arc<Registry>,
    bus: &Bus,
    timeout: Duration,
    gate: Option<&DrainGate>,
) -> ShutdownReport {
    bus.publish(Event::now(EventKind::ShutdownRequested));

    if let Some(gate) = gate {
        info!("waiting for external work queues to drain");
        while gate() > 0 {
            time::sleep(GATE_POLL).await;
        }
        info!("external work queues drained");
    }

    let clock = Instant::now();
    info!("shutdown drain started");
    registry.close_all();

    let snapshot = {
        let mut tasks = registry.started_tasks();
        tasks.extend(registry.stopping_tasks());
        tasks
    };
    for task in &snapshot {
        task.wake();
    }

    while !registry.draining_tasks().is_empty() && clock.elapsed() < timeout {
        time::sleep(DRAIN_POLL).await;
        for task in &snapshot {
            task.wake();
        }
    }

    let elapsed = clock.elapsed();
    let leaked: Vec<String> = registry
        .draining_tasks()
        .iter()
        .map(|t| t.id().to_string())
        .collect();

    if leaked.is_empty() {
        info!(elapsed_ms = elapsed.as_millis() as u64, "shutdown drain complete");
        bus.publish(Event::now(EventKind::Drained));
    } else {
        warn!(
            elapsed_ms = elapsed.as_millis() as u64,
            leaked = ?leaked,
            "shutdown timeout exceeded with tasks still running"
        );
        bus.publish(Event::now(EventKind::ShutdownTimedOut));
    }

    ShutdownReport {
        drained: leaked.is_empty(),
        elapsed,
        leaked,
    }
}
