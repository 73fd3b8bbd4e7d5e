//! # Built-in tracing subscriber.
//!
//! Emits one structured log line per runtime event: bind, close, stop,
//! rebalance, remote commands, and the shutdown stages. Install it through
//! [`SchedulerBuilder::with_subscribers`](crate::SchedulerBuilder::with_subscribers)
//! when the host application does not bring its own observer.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};

use super::subscriber::Subscribe;

/// Subscriber logging every event through `tracing`.
pub struct TraceSubscriber;

#[async_trait]
impl Subscribe for TraceSubscriber {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let group = e.group.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::Registered => info!(task, group, "task registered"),
            EventKind::Started => info!(task, group, "task started"),
            EventKind::Stopping => info!(task, group, "task stopping"),
            EventKind::Stopped => {
                info!(task, group, removed = e.removed.unwrap_or(false), "task stopped")
            }
            EventKind::Removed => info!(task, group, "replica removed"),
            EventKind::Rebalanced => info!(group, "group rebalanced"),
            EventKind::IterationFailed => {
                warn!(task, group, error = e.error.as_deref().unwrap_or("-"), "iteration failed")
            }
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::Drained => info!("all tasks drained"),
            EventKind::ShutdownTimedOut => warn!("shutdown timed out"),
            EventKind::CommandReceived => info!(task, group, "remote command received"),
            EventKind::CommandRejected => {
                warn!(error = e.error.as_deref().unwrap_or("-"), "remote command rejected")
            }
            EventKind::PublishFailed => {
                warn!(task, group, error = e.error.as_deref().unwrap_or("-"), "publish failed")
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                warn!(error = e.error.as_deref().unwrap_or("-"), "subscriber trouble")
            }
        }
    }

    fn name(&self) -> &'static str {
        "trace"
    }
}
