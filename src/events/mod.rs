//! # Event plane: bus and event types.
//!
//! Producers publish to [`Bus`]; the scheduler's fan-out listener forwards
//! events to [`Subscribe`](crate::subscribers::Subscribe) implementations.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
