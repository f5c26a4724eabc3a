//! Applies an order's line items to the ledger.

use chrono::Utc;
use common::LineItem;
use event_bus::{EventBus, EventPublisher};
use futures_util::future::join_all;
use record_store::RecordStore;
use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};
use crate::events::{InventoryEvent, InventoryUpdated, LowStockWarning};
use crate::ledger::InventoryLedger;
use crate::record::InventoryRecord;

/// Direction of an inventory update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateMode {
    /// Remove the ordered quantities from stock.
    Deduct,
    /// Return the quantities to stock.
    Restock,
}

impl UpdateMode {
    /// Returns the signed ledger delta for an ordered quantity.
    pub fn delta(&self, quantity: i64) -> i64 {
        match self {
            UpdateMode::Deduct => -quantity,
            UpdateMode::Restock => quantity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::Deduct => "DEDUCT",
            UpdateMode::Restock => "RESTOCK",
        }
    }
}

impl std::fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a multi-item update committed.
#[derive(Debug, Default)]
pub struct AppliedItems {
    /// Lines whose ledger write committed, in item order.
    pub lines: Vec<LineItem>,
    /// Records as left by the committed writes, parallel to `lines`.
    pub updated: Vec<InventoryRecord>,
    /// Error of the first failing line, in item order.
    pub error: Option<InventoryError>,
}

impl AppliedItems {
    fn failed(error: InventoryError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Vec<InventoryRecord>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.updated),
        }
    }
}

/// Applies a list of per-product changes through the ledger.
///
/// Per-item writes are issued concurrently and independently. A multi-item
/// update is not atomic: when one item fails, items that already succeeded
/// stay applied and are not reverted here. Undoing a partial application is
/// the caller's job.
#[derive(Debug, Clone)]
pub struct InventoryUpdateCoordinator<S: RecordStore, B: EventBus> {
    ledger: InventoryLedger<S>,
    publisher: EventPublisher<B>,
    low_stock_threshold: Option<i64>,
}

impl<S: RecordStore, B: EventBus> InventoryUpdateCoordinator<S, B> {
    pub fn new(ledger: InventoryLedger<S>, publisher: EventPublisher<B>) -> Self {
        Self {
            ledger,
            publisher,
            low_stock_threshold: None,
        }
    }

    /// Emits a `LowStockWarning` for every deducted product left at or below
    /// `threshold`.
    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = Some(threshold);
        self
    }

    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    /// Applies every item with `delta = mode.delta(quantity)`.
    ///
    /// Returns the updated records in item order. On failure returns the
    /// error of the first failing item (in item order) and leaves every
    /// successful write in place. `InventoryUpdated` is published only when
    /// all items succeed, and its publication failure is logged, never
    /// returned.
    pub async fn apply_order_items(
        &self,
        items: &[LineItem],
        mode: UpdateMode,
    ) -> Result<Vec<InventoryRecord>> {
        self.try_apply_order_items(items, mode).await.into_result()
    }

    /// Like [`apply_order_items`](Self::apply_order_items), but reports
    /// which lines committed when a later line fails, so the caller can
    /// undo a partial application.
    #[tracing::instrument(skip(self, items, mode), fields(item_count = items.len(), mode = %mode))]
    pub async fn try_apply_order_items(&self, items: &[LineItem], mode: UpdateMode) -> AppliedItems {
        if let Err(e) = validate_items(items) {
            return AppliedItems::failed(e);
        }

        let results = join_all(items.iter().map(|item| {
            self.ledger
                .adjust_quantity(&item.product_id, mode.delta(item.quantity))
        }))
        .await;

        let mut applied = AppliedItems::default();
        for (item, result) in items.iter().zip(results) {
            match result {
                Ok(record) => {
                    applied.lines.push(item.clone());
                    applied.updated.push(record);
                }
                Err(e) => {
                    if applied.error.is_none() {
                        applied.error = Some(e);
                    }
                }
            }
        }

        match &applied.error {
            Some(error) => {
                let committed: Vec<&str> = applied
                    .lines
                    .iter()
                    .map(|line| line.product_id.as_str())
                    .collect();
                tracing::warn!(?committed, error = %error, "inventory update partially applied");
            }
            None => {
                tracing::info!("inventory update applied");
                self.announce(&applied.updated, mode).await;
            }
        }
        applied
    }

    async fn announce(&self, updated: &[InventoryRecord], mode: UpdateMode) {
        let timestamp = Utc::now();
        self.publisher
            .publish_advisory(&InventoryEvent::Updated(InventoryUpdated {
                items: updated.to_vec(),
                operation: mode,
                timestamp,
            }))
            .await;

        let Some(threshold) = self.low_stock_threshold else {
            return;
        };
        if mode != UpdateMode::Deduct {
            return;
        }
        for record in updated.iter().filter(|r| r.quantity <= threshold) {
            tracing::info!(
                product_id = %record.product_id,
                quantity = record.quantity,
                threshold,
                "low stock"
            );
            self.publisher
                .publish_advisory(&InventoryEvent::LowStockWarning(LowStockWarning {
                    product_id: record.product_id.clone(),
                    quantity: record.quantity,
                    threshold,
                    timestamp,
                }))
                .await;
        }
    }
}

fn validate_items(items: &[LineItem]) -> Result<()> {
    if items.is_empty() {
        return Err(InventoryError::Validation(
            "items must not be empty".to_string(),
        ));
    }
    for item in items {
        if item.product_id.is_blank() {
            return Err(InventoryError::Validation(
                "every item needs a productId".to_string(),
            ));
        }
        if item.quantity <= 0 {
            return Err(InventoryError::Validation(format!(
                "quantity for {} must be positive, got {}",
                item.product_id, item.quantity
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NewInventoryItem;
    use common::{ErrorKind, ProductId};
    use event_bus::InMemoryEventBus;
    use record_store::InMemoryRecordStore;

    async fn setup(
        stock: &[(&str, i64)],
    ) -> (
        InventoryUpdateCoordinator<InMemoryRecordStore, InMemoryEventBus>,
        InMemoryEventBus,
    ) {
        let ledger = InventoryLedger::new(InMemoryRecordStore::new());
        for (product, quantity) in stock {
            ledger
                .create_item(NewInventoryItem::new(*product, *quantity))
                .await
                .unwrap();
        }
        let bus = InMemoryEventBus::new();
        let publisher = EventPublisher::new(bus.clone(), crate::SOURCE, "default");
        (InventoryUpdateCoordinator::new(ledger, publisher), bus)
    }

    async fn quantity_of<S: RecordStore, B: EventBus>(
        coordinator: &InventoryUpdateCoordinator<S, B>,
        product: &str,
    ) -> i64 {
        coordinator
            .ledger()
            .get_item(&ProductId::new(product))
            .await
            .unwrap()
            .unwrap()
            .quantity
    }

    #[tokio::test]
    async fn test_deduct_all_items() {
        let (coordinator, bus) = setup(&[("A", 10), ("B", 10)]).await;

        let updated = coordinator
            .apply_order_items(
                &[LineItem::new("A", 2), LineItem::new("B", 3)],
                UpdateMode::Deduct,
            )
            .await
            .unwrap();

        assert_eq!(updated.len(), 2);
        assert_eq!(updated[0].quantity, 8);
        assert_eq!(updated[1].quantity, 7);

        let events = bus.published_of("InventoryUpdated");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].detail["operation"], "DEDUCT");
        assert_eq!(events[0].detail["items"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_restock_adds_quantity() {
        let (coordinator, bus) = setup(&[("A", 1)]).await;

        coordinator
            .apply_order_items(&[LineItem::new("A", 4)], UpdateMode::Restock)
            .await
            .unwrap();

        assert_eq!(quantity_of(&coordinator, "A").await, 5);
        let events = bus.published_of("InventoryUpdated");
        assert_eq!(events[0].detail["operation"], "RESTOCK");
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_applied_items() {
        let (coordinator, bus) = setup(&[("A", 10), ("B", 5)]).await;

        let err = coordinator
            .apply_order_items(
                &[LineItem::new("A", 5), LineItem::new("B", 1000)],
                UpdateMode::Deduct,
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(quantity_of(&coordinator, "A").await, 5);
        assert_eq!(quantity_of(&coordinator, "B").await, 5);
        assert!(bus.published_of("InventoryUpdated").is_empty());
    }

    #[tokio::test]
    async fn test_try_apply_reports_committed_lines() {
        let (coordinator, _bus) = setup(&[("A", 10), ("B", 5)]).await;

        let applied = coordinator
            .try_apply_order_items(
                &[LineItem::new("A", 5), LineItem::new("B", 1000)],
                UpdateMode::Deduct,
            )
            .await;

        assert!(!applied.is_complete());
        assert_eq!(applied.lines, vec![LineItem::new("A", 5)]);
        assert_eq!(applied.updated[0].quantity, 5);
        assert_eq!(
            applied.error.as_ref().map(InventoryError::kind),
            Some(ErrorKind::InsufficientStock)
        );
    }

    #[tokio::test]
    async fn test_first_error_in_item_order_is_returned() {
        let (coordinator, _bus) = setup(&[("A", 1)]).await;

        let err = coordinator
            .apply_order_items(
                &[LineItem::new("MISSING", 1), LineItem::new("A", 5)],
                UpdateMode::Deduct,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_invalid_items_touch_nothing() {
        let (coordinator, _bus) = setup(&[("A", 10)]).await;

        let err = coordinator
            .apply_order_items(&[], UpdateMode::Deduct)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = coordinator
            .apply_order_items(
                &[LineItem::new("A", 1), LineItem::new("A", 0)],
                UpdateMode::Deduct,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(quantity_of(&coordinator, "A").await, 10);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_roll_back() {
        let (coordinator, bus) = setup(&[("A", 10)]).await;
        bus.set_unreachable(true);

        let updated = coordinator
            .apply_order_items(&[LineItem::new("A", 3)], UpdateMode::Deduct)
            .await
            .unwrap();

        assert_eq!(updated[0].quantity, 7);
        assert_eq!(quantity_of(&coordinator, "A").await, 7);
        assert_eq!(bus.failed_attempts(), 1);
    }

    #[tokio::test]
    async fn test_low_stock_warning_on_deduct() {
        let (coordinator, bus) = setup(&[("A", 10), ("B", 10)]).await;
        let coordinator = coordinator.with_low_stock_threshold(3);

        coordinator
            .apply_order_items(
                &[LineItem::new("A", 8), LineItem::new("B", 1)],
                UpdateMode::Deduct,
            )
            .await
            .unwrap();

        let warnings = bus.published_of("LowStockWarning");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].detail["productId"], "A");
        assert_eq!(warnings[0].detail["quantity"], 2);
        assert_eq!(warnings[0].detail["threshold"], 3);

        coordinator
            .apply_order_items(&[LineItem::new("A", 1)], UpdateMode::Restock)
            .await
            .unwrap();
        assert_eq!(bus.published_of("LowStockWarning").len(), 1);
    }
}
