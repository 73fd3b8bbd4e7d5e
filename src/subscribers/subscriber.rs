//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging custom event handlers
//! into the runtime. Each subscriber gets a dedicated worker task and a
//! bounded queue; a slow or panicking subscriber only affects itself.

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for runtime observability.
///
/// ### Rules
/// - `on_event` runs on a dedicated worker task, never in publisher context.
/// - Events are processed sequentially in queue order.
/// - Queue overflow drops events for this subscriber only.
/// - Panics are caught and logged; the runtime continues.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    async fn on_event(&self, event: &Event);

    /// Subscriber name for logging.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity for this subscriber.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
