//! # Inbound coordination services.
//!
//! Two background loops run while coordination is enabled:
//!
//! - [`CommandWatcher`] drains ordered command entries under
//!   `<root>/_commands/` in FIFO order and dispatches them into the registry.
//!   The backlog present at startup is consumed first; a high-water mark over
//!   the sequence keys keeps backlog and live watch from double-dispatching.
//! - [`spawn_ttl_refresher`] keeps the root lease alive so peers can tell a
//!   live process from a dead one.
//!
//! Both loops hold the registry weakly and exit when the runtime token is
//! cancelled or the registry is gone.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::Registry;
use crate::error::SchedulerError;
use crate::events::{Bus, Event, EventKind};

use super::command::{commands_prefix, Command};
use super::kv::KvStore;

/// Delay before re-establishing a broken watch stream.
const REWATCH_DELAY: Duration = Duration::from_secs(1);

/// Watches the command queue and dispatches into the registry.
pub(crate) struct CommandWatcher {
    store: Arc<dyn KvStore>,
    root: String,
    registry: Weak<Registry>,
    bus: Bus,
}

impl CommandWatcher {
    /// Spawns the watch loop.
    pub(crate) fn spawn(
        store: Arc<dyn KvStore>,
        root: impl Into<String>,
        registry: Weak<Registry>,
        bus: Bus,
        token: CancellationToken,
    ) {
        let watcher = Self {
            store,
            root: root.into(),
            registry,
            bus,
        };
        tokio::spawn(async move { watcher.run(token).await });
    }

    async fn run(self, token: CancellationToken) {
        let prefix = commands_prefix(&self.root);
        // High-water mark over the zero-padded sequence keys. The watch is
        // established before the backlog listing, so an entry written in
        // between shows up in both; anything at or below the mark has already
        // been consumed.
        let mut last_key: Option<String> = None;

        loop {
            if token.is_cancelled() {
                return;
            }

            let mut stream = match self.store.watch(&prefix).await {
                Ok(rx) => rx,
                Err(e) => {
                    warn!(error = %e, "command watch failed, retrying");
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = time::sleep(REWATCH_DELAY) => continue,
                    }
                }
            };

            // Drain the backlog that accumulated before this stream existed.
            match self.store.list(&prefix).await {
                Ok(pending) => {
                    for (key, value) in pending {
                        if last_key.as_deref() < Some(key.as_str()) {
                            self.consume(&key, &value).await;
                            last_key = Some(key);
                        }
                    }
                }
                Err(e) => warn!(error = %e, "command backlog listing failed"),
            }

            loop {
                let ev = tokio::select! {
                    _ = token.cancelled() => return,
                    ev = stream.recv() => match ev {
                        Some(ev) => ev,
                        None => break, // stream closed; re-watch and re-list
                    },
                };

                if last_key.as_deref() >= Some(ev.key.as_str()) {
                    continue;
                }
                if let Some(value) = ev.value {
                    self.consume(&ev.key, &value).await;
                    last_key = Some(ev.key);
                }
            }
        }
    }

    /// Handles one queue entry, then deletes it so peers see it consumed.
    async fn consume(&self, key: &str, value: &str) {
        self.dispatch(value);
        if let Err(e) = self.store.delete(key).await {
            warn!(key, error = %e, "consumed command could not be deleted");
        }
    }

    fn dispatch(&self, input: &str) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };

        let command = match Command::parse(input) {
            Ok(c) => c,
            Err(e) => {
                warn!(command = input, error = %e, "rejected remote command");
                self.bus
                    .publish(Event::now(EventKind::CommandRejected).with_error(e.to_string()));
                return;
            }
        };

        info!(command = input, "remote command received");
        let mut received = Event::now(EventKind::CommandReceived);
        match &command {
            Command::Start { group, id } | Command::Stop { group, id } => {
                received = received.with_group(group).with_task(id);
            }
            Command::Append { group, .. } | Command::Remove { group } => {
                received = received.with_group(group);
            }
        }
        self.bus.publish(received);

        match command {
            Command::Start { id, .. } => {
                if let Err(e) = registry.start_checked(&id) {
                    self.reject(&id, &e);
                }
            }
            Command::Stop { id, .. } => {
                if let Err(e) = registry.close_checked(&id) {
                    self.reject(&id, &e);
                }
            }
            Command::Append { group, size } => {
                if let Err(e) = registry.append(&group, size, true) {
                    warn!(group, error = %e, "remote append failed");
                }
            }
            Command::Remove { group } => {
                registry.remove_replica(&group);
            }
        }
    }

    fn reject(&self, id: &str, err: &SchedulerError) {
        warn!(task = id, error = %err, "remote command targeted an unknown task");
        self.bus.publish(
            Event::now(EventKind::CommandRejected)
                .with_task(id)
                .with_error(err.to_string()),
        );
    }
}

/// Keeps the root lease alive by re-putting it at half the TTL.
pub(crate) fn spawn_ttl_refresher(
    store: Arc<dyn KvStore>,
    root: String,
    ttl: Duration,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        let period = (ttl / 2).max(Duration::from_millis(100));
        loop {
            if let Err(e) = store.put_with_ttl(&root, "alive", ttl).await {
                warn!(error = %e, "root lease refresh failed");
            } else {
                debug!(root = %root, "root lease refreshed");
            }

            tokio::select! {
                _ = token.cancelled() => return,
                _ = time::sleep(period) => {}
            }
        }
    });
}
