use tokio::task::JoinHandle;

use crate::{DomainEvent, EventBus, EventDetail, Result};

/// Publishes one service's events to the bus.
///
/// Every call picks its failure contract:
///
/// - [`publish`](Self::publish) is for events whose delivery the caller's
///   correctness depends on; failures propagate.
/// - [`publish_advisory`](Self::publish_advisory) awaits the bus but logs and
///   swallows failures.
/// - [`publish_detached`](Self::publish_detached) hands the publish to a
///   spawned task with no ordering relative to the caller's result; failures
///   are logged by the task.
#[derive(Debug, Clone)]
pub struct EventPublisher<B: EventBus> {
    bus: B,
    source: String,
    bus_name: String,
}

impl<B: EventBus> EventPublisher<B> {
    /// Creates a publisher that stamps every event with `source` and
    /// addresses it to `bus_name`.
    pub fn new(bus: B, source: impl Into<String>, bus_name: impl Into<String>) -> Self {
        Self {
            bus,
            source: source.into(),
            bus_name: bus_name.into(),
        }
    }

    /// Returns the source this publisher stamps on events.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the underlying bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Publishes an event and propagates any failure.
    #[tracing::instrument(skip(self, detail), fields(source = %self.source, detail_type = detail.detail_type()))]
    pub async fn publish<E: EventDetail>(&self, detail: &E) -> Result<()> {
        let event = DomainEvent::new(&self.source, &self.bus_name, detail)?;
        send(&self.bus, event).await
    }

    /// Publishes an event, logging and swallowing any failure.
    ///
    /// Returns true if the bus acknowledged the event.
    pub async fn publish_advisory<E: EventDetail>(&self, detail: &E) -> bool {
        match self.publish(detail).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    source = %self.source,
                    detail_type = detail.detail_type(),
                    error = %e,
                    "advisory event publish failed"
                );
                false
            }
        }
    }
}

impl<B: EventBus + Clone + 'static> EventPublisher<B> {
    /// Publishes an event on a detached task.
    ///
    /// The envelope is built before returning, so the payload reflects the
    /// caller's state at the call. The returned handle never needs to be
    /// awaited; it resolves to whether the bus acknowledged the event.
    pub fn publish_detached<E: EventDetail>(&self, detail: &E) -> JoinHandle<bool> {
        let detail_type = detail.detail_type();
        let envelope = DomainEvent::new(&self.source, &self.bus_name, detail);
        let bus = self.bus.clone();
        let source = self.source.clone();

        tokio::spawn(async move {
            let result = match envelope {
                Ok(event) => send(&bus, event).await,
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(
                        source = %source,
                        detail_type,
                        error = %e,
                        "detached event publish failed"
                    );
                    false
                }
            }
        })
    }
}

async fn send<B: EventBus>(bus: &B, event: DomainEvent) -> Result<()> {
    let detail_type = event.detail_type.clone();
    match bus.publish(event).await {
        Ok(()) => {
            metrics::counter!("events_published_total", "detail_type" => detail_type.clone())
                .increment(1);
            tracing::debug!(detail_type, "event published");
            Ok(())
        }
        Err(e) => {
            metrics::counter!("event_publish_failures_total", "detail_type" => detail_type)
                .increment(1);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryEventBus;
    use serde::Serialize;
    use std::time::Duration;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct OrderPlaced {
        order_id: String,
    }

    impl EventDetail for OrderPlaced {
        fn detail_type(&self) -> &'static str {
            "OrderPlaced"
        }
    }

    fn placed() -> OrderPlaced {
        OrderPlaced {
            order_id: "o-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_stamps_source_and_bus() {
        let bus = InMemoryEventBus::new();
        let publisher = EventPublisher::new(bus.clone(), "ecommerce.orders", "orders-bus");

        publisher.publish(&placed()).await.unwrap();

        let events = bus.published();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, "ecommerce.orders");
        assert_eq!(events[0].bus_name, "orders-bus");
        assert_eq!(events[0].detail_type, "OrderPlaced");
        assert_eq!(events[0].detail["orderId"], "o-1");
    }

    #[tokio::test]
    async fn test_required_publish_propagates_failure() {
        let bus = InMemoryEventBus::new();
        bus.set_unreachable(true);
        let publisher = EventPublisher::new(bus, "ecommerce.orders", "default");

        assert!(publisher.publish(&placed()).await.is_err());
    }

    #[tokio::test]
    async fn test_advisory_publish_swallows_failure() {
        let bus = InMemoryEventBus::new();
        bus.set_unreachable(true);
        let publisher = EventPublisher::new(bus.clone(), "ecommerce.orders", "default");

        assert!(!publisher.publish_advisory(&placed()).await);
        assert_eq!(bus.failed_attempts(), 1);
    }

    #[tokio::test]
    async fn test_detached_publish_reports_outcome() {
        let bus = InMemoryEventBus::new();
        let publisher = EventPublisher::new(bus.clone(), "ecommerce.orders", "default");

        assert!(publisher.publish_detached(&placed()).await.unwrap());
        assert!(
            bus.wait_for_event("OrderPlaced", Duration::from_secs(1))
                .await
                .is_some()
        );

        bus.set_unreachable(true);
        assert!(!publisher.publish_detached(&placed()).await.unwrap());
    }
}
