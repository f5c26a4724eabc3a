//! Events emitted by the inventory service.

use chrono::{DateTime, Utc};
use common::ProductId;
use event_bus::EventDetail;
use serde::{Deserialize, Serialize};

use crate::coordinator::UpdateMode;
use crate::record::InventoryRecord;

/// Event source stamped on every inventory event.
pub const SOURCE: &str = "ecommerce.inventory";

/// An order's line items were applied to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryUpdated {
    pub items: Vec<InventoryRecord>,
    pub operation: UpdateMode,
    pub timestamp: DateTime<Utc>,
}

/// A deduction left a product at or below the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockWarning {
    pub product_id: ProductId,
    pub quantity: i64,
    pub threshold: i64,
    pub timestamp: DateTime<Utc>,
}

/// Events emitted by the inventory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InventoryEvent {
    Updated(InventoryUpdated),
    LowStockWarning(LowStockWarning),
}

impl EventDetail for InventoryEvent {
    fn detail_type(&self) -> &'static str {
        match self {
            InventoryEvent::Updated(_) => "InventoryUpdated",
            InventoryEvent::LowStockWarning(_) => "LowStockWarning",
        }
    }
}
