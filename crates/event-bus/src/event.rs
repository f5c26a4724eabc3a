use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed event payload that knows its own detail type.
///
/// Implemented by each service's event enum; the publisher uses
/// `detail_type` to label the envelope and serializes the value as the
/// envelope's `detail`.
pub trait EventDetail: Serialize + Send + Sync {
    /// The event's detail type, e.g. `"OrderCreated"`.
    fn detail_type(&self) -> &'static str;
}

/// An event as it travels over the bus.
///
/// Immutable once constructed. The publisher builds it and hands it to the
/// bus; nothing in the core retains it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Unique identifier for this event.
    pub id: EventId,

    /// The emitting service, e.g. `"ecommerce.orders"`.
    pub source: String,

    /// The event type, e.g. `"OrderCreated"`.
    pub detail_type: String,

    /// The event payload as JSON.
    pub detail: serde_json::Value,

    /// The bus the event is addressed to.
    pub bus_name: String,

    /// When the event was constructed.
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent {
    /// Builds an envelope around a typed event detail.
    pub fn new<E: EventDetail>(
        source: impl Into<String>,
        bus_name: impl Into<String>,
        detail: &E,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: EventId::new(),
            source: source.into(),
            detail_type: detail.detail_type().to_string(),
            detail: serde_json::to_value(detail)?,
            bus_name: bus_name.into(),
            timestamp: Utc::now(),
        })
    }

    /// Deserializes the detail into a typed payload.
    pub fn detail_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.detail.clone())
    }
}
