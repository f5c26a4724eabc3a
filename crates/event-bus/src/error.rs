use common::ErrorKind;
use thiserror::Error;

/// Errors that can occur when publishing to the event bus.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// The bus could not be reached.
    #[error("Event bus unreachable: {0}")]
    Unreachable(String),

    /// The bus accepted the request but refused the entry.
    #[error("Event {detail_type} rejected by bus: {reason}")]
    Rejected { detail_type: String, reason: String },

    /// The event detail could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventBusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventBusError::Unreachable(_) | EventBusError::Rejected { .. } => ErrorKind::Transient,
            EventBusError::Serialization(_) => ErrorKind::Validation,
        }
    }
}

/// Result type for event bus operations.
pub type Result<T> = std::result::Result<T, EventBusError>;
