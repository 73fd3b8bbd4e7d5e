//! # Builder wiring the scheduler runtime together.
//!
//! Construction order: bus, coordination port (mirror over the store when
//! enabled, no-op otherwise), registry, subscriber fan-out, status monitor,
//! and finally the inbound coordination services (command watcher and TTL
//! refresher). Everything observable hangs off the bus; everything remote
//! hangs off the port.
//!
//! Must be called from within a tokio runtime: the monitor, fan-out listener,
//! and coordination services are spawned during `build`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::Config;
use crate::coordination::{
    spawn_ttl_refresher, CommandWatcher, Coordination, KvMirror, KvStore, NoopCoordination,
};
use crate::events::Bus;
use crate::policies::BackoffPolicy;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{Task, TaskConfig};

use super::lifecycle::DrainGate;
use super::monitor::StatusMonitor;
use super::registry::Registry;
use super::runner;
use super::scheduler::Scheduler;

/// Id of the runtime-owned status monitor task.
const MONITOR_ID: &str = "status-monitor-0";
/// Group of the status monitor task.
const MONITOR_GROUP: &str = "status-monitor";
/// Lease TTL for the coordination root key.
const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(30);

/// Builder for a [`Scheduler`].
pub struct SchedulerBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    store: Option<Arc<dyn KvStore>>,
    coordination: Option<Arc<dyn Coordination>>,
    backoff: BackoffPolicy,
    lease_ttl: Duration,
    drain_gate: Option<Arc<DrainGate>>,
}

impl SchedulerBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            store: None,
            coordination: None,
            backoff: BackoffPolicy::default(),
            lease_ttl: DEFAULT_LEASE_TTL,
            drain_gate: None,
        }
    }

    /// Sets event subscribers for observability.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the coordination store backing the mirror and command watcher.
    /// Only used when the configuration enables coordination.
    pub fn with_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the coordination port directly, bypassing the store-backed
    /// mirror. The inbound services are not started for an overridden port.
    pub fn with_coordination(mut self, port: Arc<dyn Coordination>) -> Self {
        self.coordination = Some(port);
        self
    }

    /// Sets the retry backoff for mirror publications.
    pub fn with_publish_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the TTL of the coordination root lease.
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Installs a gate polled before the shutdown drain closes any task;
    /// it reports the number of outstanding external work items.
    pub fn with_drain_gate(mut self, gate: Arc<DrainGate>) -> Self {
        self.drain_gate = Some(gate);
        self
    }

    /// Builds the scheduler and spawns its runtime services.
    pub fn build(self) -> Arc<Scheduler> {
        let bus = Bus::new(self.cfg.bus_capacity);
        let runtime_token = CancellationToken::new();

        let mirror_active = self.coordination.is_none() && self.cfg.coordination;
        let port: Arc<dyn Coordination> = match self.coordination {
            Some(port) => port,
            None if self.cfg.coordination => match &self.store {
                Some(store) => KvMirror::spawn(
                    store.clone(),
                    self.cfg.root.clone(),
                    self.backoff,
                    bus.clone(),
                    runtime_token.child_token(),
                ),
                None => {
                    warn!("coordination enabled without a store, falling back to no-op");
                    Arc::new(NoopCoordination)
                }
            },
            None => Arc::new(NoopCoordination),
        };

        let registry = Registry::new(bus.clone(), port);
        let subscribers = Arc::new(SubscriberSet::new(self.subscribers));
        spawn_fanout(&bus, &subscribers, &runtime_token);

        // The monitor lives outside the registries: a daemon task the runtime
        // owns and never closes during normal operation.
        let monitor_config = TaskConfig::internal(MONITOR_ID, MONITOR_GROUP)
            .with_interval(self.cfg.monitor_interval);
        let monitor = Task::new(
            monitor_config,
            Arc::new(StatusMonitor::new(Arc::clone(&registry))),
        );
        monitor.set_close(false);
        monitor.set_closed(false);
        tokio::spawn(runner::run_loop(monitor.clone(), Arc::clone(&registry)));

        if mirror_active {
            if let Some(store) = self.store {
                CommandWatcher::spawn(
                    store.clone(),
                    self.cfg.root.clone(),
                    Arc::downgrade(&registry),
                    bus.clone(),
                    runtime_token.child_token(),
                );
                spawn_ttl_refresher(
                    store,
                    self.cfg.root.clone(),
                    self.lease_ttl,
                    runtime_token.child_token(),
                );
            }
        }

        Arc::new(Scheduler {
            cfg: self.cfg,
            bus,
            registry,
            subscribers,
            runtime_token,
            monitor,
            drain_gate: self.drain_gate,
        })
    }
}

/// Forwards every bus event to the subscriber set until the runtime stops.
fn spawn_fanout(bus: &Bus, subscribers: &Arc<SubscriberSet>, token: &CancellationToken) {
    let mut rx = bus.subscribe();
    let subs = Arc::clone(subscribers);
    let token = token.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => subs.emit(&ev),
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        }
    });
}
