use std::sync::Arc;

use async_trait::async_trait;

use crate::{DomainEvent, Result};

/// Core trait for event bus implementations.
///
/// `publish` returns once the bus has acknowledged the entry. Delivery to
/// subscribers is the bus's concern: no ordering is guaranteed across event
/// types and an event may be delivered more than once.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Sends one event to the bus.
    async fn publish(&self, event: DomainEvent) -> Result<()>;
}

#[async_trait]
impl<B: EventBus + ?Sized> EventBus for Arc<B> {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        (**self).publish(event).await
    }
}
