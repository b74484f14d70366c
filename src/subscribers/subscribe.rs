//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging event consumers (dashboards,
//! audit trails, metrics) into the engine. Each subscriber is driven by a dedicated
//! worker loop fed by a bounded queue owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they do **not** block supervisors nor other subscribers.
//! - A panic inside `on_event` is caught and logged; the worker keeps running.
//! - If the queue overflows, events for that subscriber are **dropped** (warn).
//! - Events may reference job ids the subscriber has never seen; handle them defensively.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
