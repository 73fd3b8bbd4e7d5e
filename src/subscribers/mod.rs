//! # Subscribers: pluggable event observers.
//!
//! Events reach subscribers through [`SubscriberSet`], a non-blocking fan-out
//! with per-subscriber bounded queues and panic isolation.

mod log;
mod set;
mod subscriber;

pub use log::TraceSubscriber;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
