//! Orders service core.
//!
//! [`OrderWorkflow`] validates and persists new orders; [`OrderRepository`]
//! is the order record store and the only place order status changes.

pub mod error;
pub mod events;
pub mod order;
pub mod repository;
pub mod workflow;

pub use error::{OrderError, Result};
pub use events::{FailureReason, OrderCreated, OrderEvent, OrderFailed, OrderUpdated, SOURCE};
pub use order::{CreateOrderRequest, Order, OrderStatus};
pub use repository::{OrderRepository, TABLE};
pub use workflow::OrderWorkflow;
