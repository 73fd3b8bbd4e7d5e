//! # Store-backed coordination mirror.
//!
//! [`KvMirror`] implements the [`Coordination`](super::Coordination) port over
//! any [`KvStore`]. Publications are queued on a bounded channel and written
//! by a background worker, so the registry never waits on the store.
//!
//! ## Key layout
//! ```text
//! <root>/<group>/<id>/state      STARTED | STOPPING | STOPPED | REMOVED
//! <root>/<group>/<id>/analysis   JSON counters (see AnalysisSnapshot)
//! ```
//!
//! Failed writes are retried with the configured backoff; a publication that
//! exhausts its attempts is dropped with a `PublishFailed` event. The dropped
//! state converges on the next transition of the same task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::StoreError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;
use crate::tasks::AnalysisSnapshot;

use super::kv::KvStore;
use super::port::Coordination;

/// Write attempts per publication before it is dropped.
const MAX_PUBLISH_ATTEMPTS: u32 = 3;

struct Publication {
    group: String,
    id: String,
    state: &'static str,
    analysis: AnalysisSnapshot,
}

/// [`Coordination`] implementation publishing to a [`KvStore`].
pub struct KvMirror {
    tx: mpsc::Sender<Publication>,
}

impl KvMirror {
    /// Spawns the publisher worker and returns the mirror handle.
    ///
    /// The worker drains queued publications until `token` is cancelled.
    pub fn spawn(
        store: Arc<dyn KvStore>,
        root: impl Into<String>,
        backoff: BackoffPolicy,
        bus: Bus,
        token: CancellationToken,
    ) -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel::<Publication>(1024);
        let root = root.into();

        tokio::spawn(async move {
            loop {
                let publication = tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Some(p) => p,
                        None => break,
                    },
                };
                publish_with_retry(&*store, &root, &backoff, &bus, publication).await;
            }
        });

        Arc::new(Self { tx })
    }

    fn enqueue(&self, publication: Publication) {
        if let Err(e) = self.tx.try_send(publication) {
            let p = match e {
                mpsc::error::TrySendError::Full(p) => p,
                mpsc::error::TrySendError::Closed(p) => p,
            };
            warn!(task = %p.id, state = p.state, "coordination queue unavailable, publication dropped");
        }
    }
}

impl Coordination for KvMirror {
    fn task_started(&self, group: &str, id: &str, analysis: &AnalysisSnapshot) {
        self.enqueue(Publication {
            group: group.to_string(),
            id: id.to_string(),
            state: "STARTED",
            analysis: analysis.clone(),
        });
    }

    fn task_stopping(&self, group: &str, id: &str, analysis: &AnalysisSnapshot) {
        self.enqueue(Publication {
            group: group.to_string(),
            id: id.to_string(),
            state: "STOPPING",
            analysis: analysis.clone(),
        });
    }

    fn task_stopped(&self, group: &str, id: &str, removed: bool, analysis: &AnalysisSnapshot) {
        self.enqueue(Publication {
            group: group.to_string(),
            id: id.to_string(),
            state: if removed { "REMOVED" } else { "STOPPED" },
            analysis: analysis.clone(),
        });
    }
}

async fn publish_with_retry(
    store: &dyn KvStore,
    root: &str,
    backoff: &BackoffPolicy,
    bus: &Bus,
    publication: Publication,
) {
    let mut prev_delay: Option<Duration> = None;

    for attempt in 1..=MAX_PUBLISH_ATTEMPTS {
        match publish(store, root, &publication).await {
            Ok(()) => return,
            Err(e) if attempt < MAX_PUBLISH_ATTEMPTS => {
                let delay = backoff.next(prev_delay);
                prev_delay = Some(delay);
                warn!(
                    task = %publication.id,
                    state = publication.state,
                    attempt,
                    error = %e,
                    "coordination publish failed, retrying"
                );
                time::sleep(delay).await;
            }
            Err(e) => {
                warn!(
                    task = %publication.id,
                    state = publication.state,
                    error = %e,
                    "coordination publish dropped after retries"
                );
                bus.publish(
                    Event::now(EventKind::PublishFailed)
                        .with_task(&publication.id)
                        .with_group(&publication.group)
                        .with_error(e.to_string()),
                );
            }
        }
    }
}

async fn publish(store: &dyn KvStore, root: &str, p: &Publication) -> Result<(), StoreError> {
    let base = format!("{root}/{}/{}", p.group, p.id);
    store.put(&format!("{base}/state"), p.state).await?;

    let analysis = serde_json::to_string(&p.analysis).map_err(|e| StoreError::Io {
        reason: e.to_string(),
    })?;
    store.put(&format!("{base}/analysis"), &analysis).await
}
