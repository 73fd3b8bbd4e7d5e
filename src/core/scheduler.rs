//! # Scheduler: the public facade over the runtime.
//!
//! [`Scheduler`] owns the pieces the builder wired together: the event bus,
//! the registry, the subscriber fan-out, the status monitor, and the
//! coordination services' cancellation token. Applications register task
//! descriptors through [`load`](Scheduler::load), drive lifecycle through the
//! [`registry`](Scheduler::registry), and terminate through
//! [`shutdown`](Scheduler::shutdown) or [`run_until_signal`](Scheduler::run_until_signal).
//!
//! A process that wants a conventional global can park the built scheduler in
//! a `OnceLock`; construction itself is explicit and injectable.

use std::io;
use std::sync::Arc;

use regex::Regex;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, Properties};
use crate::error::SchedulerError;
use crate::events::Bus;
use crate::schedule::Schedule;
use crate::signals;
use crate::subscribers::SubscriberSet;
use crate::tasks::{TaskConfig, TaskDescriptor, TaskRef};

use super::lifecycle::{self, DrainGate, ShutdownReport};
use super::registry::Registry;

/// Facade owning the scheduler runtime.
pub struct Scheduler {
    pub(crate) cfg: Config,
    pub(crate) bus: Bus,
    pub(crate) registry: Arc<Registry>,
    pub(crate) subscribers: Arc<SubscriberSet>,
    pub(crate) runtime_token: CancellationToken,
    pub(crate) monitor: TaskRef,
    pub(crate) drain_gate: Option<Arc<DrainGate>>,
}

impl Scheduler {
    /// The task registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The event bus; subscribe for runtime events.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The effective configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Loads task descriptors: applies the include/exclusion filters, resolves
    /// parallelism and cron against the property files, and registers the
    /// resulting replicas. Returns the number of replicas registered.
    ///
    /// # Errors
    /// Fails on an invalid filter regex, an unresolvable descriptor
    /// ([`SchedulerError::Config`]), an invalid cron expression, or a
    /// duplicate id. Registration aborts at the first failure.
    pub fn load(
        &self,
        descriptors: &[TaskDescriptor],
        props: &Properties,
    ) -> Result<usize, SchedulerError> {
        let includes = compile_filters(&self.cfg.includes)?;
        let exclusions = compile_filters(&self.cfg.exclusions)?;
        let mut registered = 0;

        for descriptor in descriptors {
            let group = descriptor.group.as_str();
            let included = includes.is_empty() || includes.iter().any(|r| r.is_match(group));
            let excluded = exclusions.iter().any(|r| r.is_match(group));
            if !included || excluded {
                warn!(group, "task group filtered out by include/exclusion rules");
                continue;
            }

            descriptor.validate()?;
            let parallel = descriptor.resolved_parallel(props)?;
            let schedule = descriptor
                .resolved_cron(props)
                .map(|expr| Schedule::parse(&expr))
                .transpose()?;

            info!(group, parallel, "loading task group");
            for _ in 0..parallel {
                let seq = self.registry.next_index(group);
                let mut config = TaskConfig::new(format!("{group}-{seq}"), group, 0, 1)?
                    .with_interval(descriptor.interval)
                    .with_run_limit(descriptor.run_limit.max(0) as u64)
                    .daemon(descriptor.daemon)
                    .lazy(descriptor.lazy)
                    .before_after_only(descriptor.before_after_only);
                if let Some(schedule) = &schedule {
                    config = config.with_schedule(schedule.clone());
                }

                self.registry.register(config, descriptor.worker.clone())?;
                registered += 1;
            }
        }

        Ok(registered)
    }

    /// Reloads the fleet: detaches every stopped task, closes the rest, and,
    /// once the started table drains, registers the given descriptors anew.
    /// Returns immediately; the re-registration happens in the background.
    pub fn reload(self: &Arc<Self>, descriptors: Vec<TaskDescriptor>, props: Properties) {
        self.registry.clear_stopped();
        self.registry.close_all();

        let me = Arc::clone(self);
        tokio::spawn(async move {
            while me.registry.started_len() > 0 || me.registry.stopping_len() > 0 {
                time::sleep(std::time::Duration::from_millis(100)).await;
            }
            // Closed tasks re-entered the stopped table through the monitor;
            // detach them too before registering the new fleet.
            me.registry.clear_stopped();
            info!("all tasks closed, reloading descriptors");

            if let Err(e) = me.load(&descriptors, &props) {
                error!(error = %e, "reload failed");
            }
        });
    }

    /// Drains the fleet and stops the runtime services.
    ///
    /// A drain timeout is reported, not raised; the report lists leaked ids.
    pub async fn shutdown(&self) -> ShutdownReport {
        let report = lifecycle::drain(
            &self.registry,
            &self.bus,
            self.cfg.shutdown_timeout,
            self.drain_gate.as_deref(),
        )
        .await;

        // Stop the monitor and the coordination services; the fleet is down.
        self.monitor.set_close(true);
        self.monitor.wake();
        self.runtime_token.cancel();
        self.subscribers.close();

        report
    }

    /// Blocks until a termination signal arrives, then drains.
    pub async fn run_until_signal(&self) -> io::Result<ShutdownReport> {
        signals::wait_for_shutdown_signal().await?;
        Ok(self.shutdown().await)
    }
}

fn compile_filters(patterns: &[String]) -> Result<Vec<Regex>, SchedulerError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| SchedulerError::Config {
                reason: format!("invalid filter regex '{p}': {e}"),
            })
        })
        .collect()
}
