//! Key-value record store with conditional writes.
//!
//! Items are JSON objects grouped into named tables. Every write can carry a
//! [`Condition`] that is evaluated atomically with the mutation, which is the
//! compare-and-swap primitive the inventory ledger and the saga repository
//! build on.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{RecordStoreError, Result};
pub use memory::InMemoryRecordStore;
pub use postgres::PostgresRecordStore;
pub use store::{
    Condition, Item, RecordStore, RecordStoreExt, UpdateAction, UpdateExpression, from_item,
    to_item,
};
