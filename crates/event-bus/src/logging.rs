use async_trait::async_trait;

use crate::{DomainEvent, EventBus, Result};

/// Event bus that writes every event to the `events` tracing target.
///
/// Used by the host when no external bus is wired in. Always acknowledges.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventBus;

impl LogEventBus {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventBus for LogEventBus {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        let detail = serde_json::to_string(&event.detail)?;
        tracing::info!(
            target: "events",
            event_id = %event.id,
            source = %event.source,
            detail_type = %event.detail_type,
            bus_name = %event.bus_name,
            %detail,
            "event published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventDetail;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Ping {
        count: u32,
    }

    impl EventDetail for Ping {
        fn detail_type(&self) -> &'static str {
            "Ping"
        }
    }

    #[tokio::test]
    async fn test_always_acknowledges() {
        let bus = LogEventBus::new();
        let event = DomainEvent::new("test", "default", &Ping { count: 1 }).unwrap();
        assert!(bus.publish(event).await.is_ok());
    }
}
