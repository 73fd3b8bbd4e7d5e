//! # Coordination port: the outbound seam between registry and store.
//!
//! The registry publishes every lifecycle transition through a
//! [`Coordination`] implementation and never branches on whether coordination
//! is actually enabled: when it is not, [`NoopCoordination`] absorbs the
//! calls.
//!
//! Publication is fire-and-forget by contract. Implementations must not block
//! the caller; the provided mirror queues publications and retries them on a
//! background worker.

use crate::tasks::AnalysisSnapshot;

/// Outbound lifecycle publication port.
pub trait Coordination: Send + Sync + 'static {
    /// The task was bound and submitted to the worker pool.
    fn task_started(&self, group: &str, id: &str, analysis: &AnalysisSnapshot);

    /// A close was requested; the loop has not finished yet.
    fn task_stopping(&self, group: &str, id: &str, analysis: &AnalysisSnapshot);

    /// The task was finalized as stopped; `removed` marks a replica that was
    /// detached from its group and will not restart.
    fn task_stopped(&self, group: &str, id: &str, removed: bool, analysis: &AnalysisSnapshot);
}

/// No-op implementation used when coordination is disabled.
pub struct NoopCoordination;

impl Coordination for NoopCoordination {
    fn task_started(&self, _group: &str, _id: &str, _analysis: &AnalysisSnapshot) {}

    fn task_stopping(&self, _group: &str, _id: &str, _analysis: &AnalysisSnapshot) {}

    fn task_stopped(&self, _group: &str, _id: &str, _removed: bool, _analysis: &AnalysisSnapshot) {}
}
