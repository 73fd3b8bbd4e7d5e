//! # Task abstractions: workers, descriptors, and lifecycle state.
//!
//! - [`Worker`] the four user-supplied hooks; [`WorkerFn`] wraps a closure
//! - [`TaskConfig`] per-replica descriptor with the mutable shard assignment
//! - [`Task`] a worker bound to a config, with lifecycle flags and counters
//! - [`TaskDescriptor`] the registration contract resolved at load time
//! - [`Analysis`] / [`AnalysisSnapshot`] execution statistics

mod analysis;
mod config;
mod descriptor;
mod task;
mod worker;

pub use analysis::{Analysis, AnalysisSnapshot};
pub use config::TaskConfig;
pub use descriptor::TaskDescriptor;
pub use task::{Task, TaskRef};
pub use worker::{Worker, WorkerFn, WorkerRef};
