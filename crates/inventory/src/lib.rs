//! Inventory service core.
//!
//! The [`InventoryLedger`] owns per-product quantities and exposes a single
//! atomic conditional adjustment. The [`InventoryUpdateCoordinator`] applies
//! an order's line items through that primitive, one independent write per
//! item, and announces the result.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod handler;
pub mod ledger;
pub mod record;

pub use coordinator::{AppliedItems, InventoryUpdateCoordinator, UpdateMode};
pub use error::{InventoryError, Result};
pub use events::{InventoryEvent, InventoryUpdated, LowStockWarning, SOURCE};
pub use handler::{InventoryTrigger, TriggerFailure, TriggerOutcome, handle_inventory_trigger};
pub use ledger::{InventoryLedger, TABLE};
pub use record::{InventoryRecord, NewInventoryItem};
