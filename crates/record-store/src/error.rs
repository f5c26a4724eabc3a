use common::ErrorKind;
use thiserror::Error;

use crate::Item;

/// Errors that can occur when interacting with the record store.
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// The write condition did not hold when the write was evaluated.
    ///
    /// `current` is the item as it was at evaluation time (`None` if the key
    /// was absent), so callers can classify the failure without a second read.
    #[error("Conditional check failed for {table}/{key}")]
    ConditionalCheckFailed {
        table: String,
        key: String,
        current: Option<Item>,
    },

    /// The update expression cannot be applied to the stored item.
    #[error("Invalid update for {table}/{key}: {reason}")]
    InvalidUpdate {
        table: String,
        key: String,
        reason: String,
    },

    /// The store could not be reached.
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RecordStoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordStoreError::ConditionalCheckFailed { .. } => ErrorKind::Conflict,
            RecordStoreError::InvalidUpdate { .. } => ErrorKind::Validation,
            RecordStoreError::Unavailable(_)
            | RecordStoreError::Database(_)
            | RecordStoreError::Migration(_)
            | RecordStoreError::Serialization(_) => ErrorKind::Transient,
        }
    }

    /// Returns true if this is a failed write condition.
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, RecordStoreError::ConditionalCheckFailed { .. })
    }
}

/// Result type for record store operations.
pub type Result<T> = std::result::Result<T, RecordStoreError>;
