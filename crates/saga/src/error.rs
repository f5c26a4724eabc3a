//! Saga error types.

use common::{ErrorKind, OrderId, SagaId};
use inventory::InventoryError;
use orders::{OrderError, OrderStatus};
use record_store::RecordStoreError;
use thiserror::Error;

use crate::state::SagaStatus;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// No saga record exists under this ID.
    #[error("Saga not found: {0}")]
    NotFound(SagaId),

    /// Saga is in an invalid state for the requested operation.
    #[error("Invalid saga state for {saga_id}: {actual}")]
    InvalidState { saga_id: SagaId, actual: SagaStatus },

    /// A non-terminal saga already exists for the order.
    #[error("Saga has already been started: {0}")]
    AlreadyStarted(SagaId),

    /// Another writer saved the saga since it was loaded.
    #[error("Saga was modified concurrently: {0}")]
    ConcurrentModification(SagaId),

    /// Order is not in the expected state for saga execution.
    #[error("Order {order_id} is {status}, expected CREATED")]
    OrderNotReady {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// The order passed in does not belong to the saga.
    #[error("Saga {saga_id} does not belong to order {order_id}")]
    OrderMismatch { saga_id: SagaId, order_id: OrderId },

    /// Order error.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Inventory error raised while restocking a reservation.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Record store error.
    #[error("Record store error: {0}")]
    Store(#[from] RecordStoreError),
}

impl SagaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::NotFound(_) => ErrorKind::NotFound,
            SagaError::OrderMismatch { .. } => ErrorKind::Validation,
            SagaError::InvalidState { .. }
            | SagaError::AlreadyStarted(_)
            | SagaError::ConcurrentModification(_)
            | SagaError::OrderNotReady { .. } => ErrorKind::Conflict,
            SagaError::Order(e) => e.kind(),
            SagaError::Inventory(e) => e.kind(),
            SagaError::Store(e) => e.kind(),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
