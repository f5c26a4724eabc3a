//! Saga pattern implementation for order fulfillment.
//!
//! The order fulfillment saga follows these steps:
//! 1. Reserve inventory
//! 2. Process payment
//!
//! Each step is announced by a start event. If a step fails, steps already
//! started are compensated in reverse order and the order is failed. Saga
//! instances are persisted with optimistic versioning so that stalled sagas
//! can be found and compensated by a reconciliation sweep.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod fulfillment;
pub mod instance;
pub mod repository;
pub mod state;

pub use coordinator::{ReconcileReport, SagaCoordinator};
pub use error::{Result, SagaError};
pub use events::{SOURCE, SagaEvent, SagaOrderFailed, SagaStepPayload};
pub use fulfillment::{OrderFulfillment, PlacedOrder};
pub use instance::{SagaFailure, SagaInstance, SagaStep, StepRecord};
pub use repository::{SagaRepository, TABLE};
pub use state::{SagaStatus, StepStatus};
