//! Shared types used across the orders, inventory and saga crates.

pub mod error;
pub mod money;
pub mod types;

pub use error::ErrorKind;
pub use money::Money;
pub use types::{LineItem, OrderId, ProductId, SagaId, UserId};
