use common::{ErrorKind, ProductId};
use record_store::RecordStoreError;
use thiserror::Error;

/// Errors that can occur in inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The request is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No inventory record exists for the product.
    #[error("Inventory record not found: {0}")]
    NotFound(ProductId),

    /// The stock guard rejected a decrement.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// A record for the product already exists.
    #[error("Inventory record already exists: {0}")]
    AlreadyExists(ProductId),

    /// The record store failed.
    #[error("Record store error: {0}")]
    Store(#[from] RecordStoreError),
}

impl InventoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::Validation(_) => ErrorKind::Validation,
            InventoryError::NotFound(_) => ErrorKind::NotFound,
            InventoryError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            InventoryError::AlreadyExists(_) => ErrorKind::Conflict,
            InventoryError::Store(e) => e.kind(),
        }
    }
}

/// Convenience type alias for inventory results.
pub type Result<T> = std::result::Result<T, InventoryError>;
