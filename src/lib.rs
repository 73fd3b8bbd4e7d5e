//! # taskherd
//!
//! **Taskherd** is a process-local, cluster-aware task scheduler.
//!
//! Long-lived worker tasks run on a cron schedule (or as a continuous
//! interval-bounded loop), organized into named groups whose parallelism is
//! elastic. Each replica knows its `(index, total)` shard assignment, which
//! is recomputed whenever group membership changes. Every lifecycle
//! transition can be mirrored to a shared coordination store so peer
//! processes observe the fleet and steer it with remote commands.
//!
//! ## Features
//!
//! | Area              | Description                                                    | Key types / traits                       |
//! |-------------------|----------------------------------------------------------------|------------------------------------------|
//! | **Workers**       | Define tasks as `before/execute/after/destroy` hooks.          | [`Worker`], [`WorkerFn`], [`WorkerRef`]  |
//! | **Registry**      | Tri-state lifecycle tables, elastic groups, rebalance.         | [`Registry`]                             |
//! | **Scheduling**    | Cron-driven or interval-bounded loops on a shared pool.        | [`Schedule`], [`TaskConfig`]             |
//! | **Registration**  | Descriptor loading with property resolution and filters.       | [`TaskDescriptor`], [`Config`]           |
//! | **Coordination**  | Mirror transitions to a store; obey remote commands.           | [`Coordination`], [`KvStore`], [`KvMirror`] |
//! | **Observability** | Event bus with pluggable, isolated subscribers.                | [`Event`], [`Subscribe`], [`TraceSubscriber`] |
//! | **Shutdown**      | Orderly drain with bounded wait and leak reporting.            | [`Scheduler`], [`ShutdownReport`]        |
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskherd::{
//!     Config, SchedulerBuilder, Subscribe, TaskDescriptor, TraceSubscriber, WorkerFn, WorkError,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scheduler = SchedulerBuilder::new(Config::default())
//!         .with_subscribers(vec![Arc::new(TraceSubscriber) as Arc<dyn Subscribe>])
//!         .build();
//!
//!     let sweep = TaskDescriptor::new(
//!         "sweep",
//!         WorkerFn::arc(|| async {
//!             // one unit of work per tick
//!             Ok::<_, WorkError>(())
//!         }),
//!     )
//!     .parallel(3)
//!     .cron("*/5 * * * * *");
//!
//!     scheduler.load(&[sweep], &Vec::new())?;
//!     scheduler.registry().start_all();
//!
//!     scheduler.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod schedule;

pub mod coordination;
pub mod policies;
pub mod signals;
pub mod subscribers;
pub mod tasks;

// ---- Public re-exports ----

pub use config::{
    Config, Properties, PROP_COORDINATION_ENABLE, PROP_EXCLUSIONS, PROP_INCLUDES,
    PROP_SHUTDOWN_TIMEOUT,
};
pub use coordination::{Coordination, KvMirror, KvStore, MemoryKv, NoopCoordination};
pub use self::core::{DrainGate, Registry, Scheduler, SchedulerBuilder, ShutdownReport};
pub use error::{SchedulerError, StoreError, WorkError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use schedule::Schedule;
pub use subscribers::{Subscribe, SubscriberSet, TraceSubscriber};
pub use tasks::{
    Analysis, AnalysisSnapshot, Task, TaskConfig, TaskDescriptor, TaskRef, Worker, WorkerFn,
    WorkerRef,
};
