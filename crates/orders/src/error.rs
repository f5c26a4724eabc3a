use common::{ErrorKind, OrderId, ProductId};
use inventory::InventoryError;
use record_store::RecordStoreError;
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors that can occur in order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Order not found.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// An ordered product has no inventory record.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The feasibility check found too little stock.
    #[error("Insufficient stock for product: {product_id} (requested {requested}, available {available})")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// An order with this ID already exists.
    #[error("Order already exists: {0}")]
    AlreadyExists(OrderId),

    /// The requested status change is not allowed from the current status.
    #[error("Invalid status transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Inventory lookup failed.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// The record store failed.
    #[error("Record store error: {0}")]
    Store(#[from] RecordStoreError),
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::Validation(_) => ErrorKind::Validation,
            OrderError::NotFound(_) | OrderError::ProductNotFound(_) => ErrorKind::NotFound,
            OrderError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            OrderError::AlreadyExists(_) | OrderError::InvalidTransition { .. } => {
                ErrorKind::Conflict
            }
            OrderError::Inventory(e) => e.kind(),
            OrderError::Store(e) => e.kind(),
        }
    }
}

/// Convenience type alias for order results.
pub type Result<T> = std::result::Result<T, OrderError>;
