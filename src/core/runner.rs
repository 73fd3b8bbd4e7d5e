//! # The scheduler loop: one worker's life on the pool.
//!
//! [`run_loop`] is what the registry submits to the worker pool when a task
//! starts. It drives the task's schedule, contains hook failures, honors the
//! cooperative close flag at every safe point, and retires the task when the
//! loop ends.
//!
//! ```text
//! loop while close not set:
//!   schedule set   -> wait for next fire time (or a wake), re-check close
//!   before/execute/after  (failures logged + counted, never propagated)
//!   run limit reached     -> set close
//!   no schedule           -> sleep interval (or until woken)
//! after_only hook (if deferred), retire to stopping, closed = true, destroy
//! ```
//!
//! Suspension points are the schedule wait and the interval sleep; both are
//! interruptible by [`Task::wake`](crate::tasks::Task::wake). `execute` itself
//! is opaque and never interrupted.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::WorkError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::TaskRef;

use super::registry::Registry;

/// Runs one task's scheduler loop to completion.
pub(crate) async fn run_loop(task: TaskRef, registry: Arc<Registry>) {
    let bus = registry.bus().clone();
    let worker = task.worker().clone();
    let before_after_only = task.config().is_before_after_only();

    debug!(task = %task.id(), "scheduler loop entered");

    let mut iterations: u64 = 0;
    let mut ran_before = false;
    // A non-lazy scheduled task fires immediately on start; a lazy one waits
    // for its first scheduled instant like every later iteration.
    let mut immediate_tick = !task.config().is_lazy();

    while !task.is_close() {
        if let Some(schedule) = task.config().schedule() {
            if immediate_tick {
                immediate_tick = false;
            } else {
                let now = Utc::now();
                let Some(next) = schedule.next_after(now) else {
                    task.set_close(true);
                    break;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                task.idle(wait).await;
                if task.is_close() {
                    break;
                }
            }
        }

        let started_at = SystemTime::now();
        let clock = Instant::now();
        let mut failed = false;

        if !before_after_only || !ran_before {
            if let Err(e) = worker.before().await {
                failed = true;
                report_failure(&bus, &task, iterations, "before", &e);
            }
            ran_before = true;
        }

        if let Err(e) = worker.execute().await {
            failed = true;
            report_failure(&bus, &task, iterations, "execute", &e);
        }

        if !before_after_only {
            if let Err(e) = worker.after().await {
                failed = true;
                report_failure(&bus, &task, iterations, "after", &e);
            }
        }

        iterations += 1;
        task.analysis().record(started_at, clock.elapsed(), failed);

        let limit = task.config().run_limit();
        if limit > 0 && iterations >= limit {
            task.set_close(true);
        }

        if task.config().schedule().is_none() && !task.is_close() {
            let interval = task.config().interval();
            if interval.is_zero() {
                // Keep a zero-interval loop cooperative on the runtime.
                tokio::task::yield_now().await;
            } else {
                task.idle(interval).await;
            }
        }
    }

    // Deferred closing bracket of a before/after-only task.
    if before_after_only && ran_before {
        if let Err(e) = worker.after().await {
            report_failure(&bus, &task, iterations, "after", &e);
        }
    }

    registry.retire(&task);
    task.set_closed(true);

    if let Err(e) = worker.destroy().await {
        warn!(task = %task.id(), error = %e, "destroy hook failed");
    }

    debug!(task = %task.id(), iterations, "scheduler loop exited");
}

fn report_failure(bus: &Bus, task: &TaskRef, iterations: u64, hook: &str, err: &WorkError) {
    warn!(task = %task.id(), hook, error = %err, "hook failed inside scheduler loop");
    bus.publish(
        Event::now(EventKind::IterationFailed)
            .with_task(task.id())
            .with_group(task.group())
            .with_iterations(iterations)
            .with_error(format!("{hook}: {err}")),
    );
}
