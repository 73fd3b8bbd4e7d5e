//! Runtime core: the registry, the scheduler loop, and lifecycle.
//!
//! ## Files & responsibilities
//! - **registry.rs**: tri-state task tables (`started`/`stopping`/`stopped`),
//!   the insertion-ordered group index, rebalance, and every lifecycle
//!   operation; forwards transitions to the coordination port.
//! - **runner.rs**: the scheduler loop one task runs on the worker pool:
//!   schedule waits, hook containment, run limit, retire-on-exit.
//! - **monitor.rs**: the 1 Hz sweep staging `stopping` tasks whose loop has
//!   terminated and finalizing them as `stopped`.
//! - **lifecycle.rs**: the shutdown drain (gate, close-all, wake, bounded
//!   poll) and its report.
//! - **scheduler.rs**: public facade; descriptor loading, reload, shutdown.
//! - **builder.rs**: wires bus, port, registry, monitor, fan-out, and the
//!   coordination services together.
//!
//! ## Data flow
//! ```text
//! register ──► stopped ──start──► started ──close──► stopping ──monitor──► stopped
//!                 ▲                                                           │
//!                 └────────────────────── restart ◄──────────────────────────┘
//! ```
//! Every transition is published to the bus (observability) and the
//! coordination port (remote mirror). Remote commands arrive through the
//! command watcher and call back into the registry.

mod builder;
mod lifecycle;
mod monitor;
mod registry;
mod runner;
mod scheduler;

pub use builder::SchedulerBuilder;
pub use lifecycle::{DrainGate, ShutdownReport};
pub use registry::Registry;
pub use scheduler::Scheduler;
