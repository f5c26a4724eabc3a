//! Per-product quantity ledger.

use chrono::Utc;
use common::ProductId;
use record_store::{Condition, RecordStore, RecordStoreError, RecordStoreExt, UpdateExpression};

use crate::error::{InventoryError, Result};
use crate::record::{InventoryRecord, NewInventoryItem};

/// Record store table holding inventory records, keyed by product ID.
pub const TABLE: &str = "inventory";

/// Authoritative per-product quantity store.
///
/// Every quantity change goes through [`adjust_quantity`](Self::adjust_quantity),
/// which pushes the existence and stock checks into the conditional write
/// itself. Concurrent adjustments of one product serialize in the store;
/// adjustments of different products do not contend.
#[derive(Debug, Clone)]
pub struct InventoryLedger<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> InventoryLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Creates the record for a product.
    ///
    /// Fails with `AlreadyExists` if the product already has a record; the
    /// existing quantity is left untouched.
    #[tracing::instrument(skip(self, item), fields(product_id = %item.product_id))]
    pub async fn create_item(&self, item: NewInventoryItem) -> Result<InventoryRecord> {
        if item.product_id.is_blank() {
            return Err(InventoryError::Validation(
                "productId is required".to_string(),
            ));
        }
        if item.quantity < 0 {
            return Err(InventoryError::Validation(format!(
                "quantity must be non-negative, got {}",
                item.quantity
            )));
        }

        let now = Utc::now();
        let record = InventoryRecord {
            product_id: item.product_id,
            quantity: item.quantity,
            created_at: now,
            updated_at: now,
        };

        match self
            .store
            .put_record(
                TABLE,
                record.product_id.as_str(),
                &record,
                Some(Condition::attribute_not_exists("productId")),
            )
            .await
        {
            Ok(()) => {
                tracing::info!(quantity = record.quantity, "inventory item created");
                Ok(record)
            }
            Err(e) if e.is_conditional_check_failed() => {
                Err(InventoryError::AlreadyExists(record.product_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the record for a product. No side effects.
    pub async fn get_item(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>> {
        Ok(self.store.get_record(TABLE, product_id.as_str()).await?)
    }

    /// Atomically applies `quantity += delta`.
    ///
    /// The write only commits if the record exists and, for a negative delta,
    /// `quantity >= |delta|`. A rejected write is classified from the item the
    /// store saw at evaluation time: absent means `NotFound`, present means
    /// `InsufficientStock`.
    #[tracing::instrument(skip(self, product_id), fields(product_id = %product_id))]
    pub async fn adjust_quantity(
        &self,
        product_id: &ProductId,
        delta: i64,
    ) -> Result<InventoryRecord> {
        if product_id.is_blank() {
            return Err(InventoryError::Validation(
                "productId is required".to_string(),
            ));
        }
        if delta == 0 {
            return Err(InventoryError::Validation(
                "delta must be non-zero".to_string(),
            ));
        }

        let mut condition = Condition::attribute_exists("productId");
        if delta < 0 {
            condition = condition.and(Condition::at_least("quantity", delta.saturating_abs()));
        }
        let update = UpdateExpression::new()
            .add("quantity", delta)
            .set("updatedAt", Utc::now().to_rfc3339());

        match self
            .store
            .update(TABLE, product_id.as_str(), update, Some(condition))
            .await
        {
            Ok(item) => {
                let record: InventoryRecord = record_store::from_item(item)?;
                metrics::counter!("inventory_adjustments_total", "outcome" => "applied")
                    .increment(1);
                tracing::debug!(delta, quantity = record.quantity, "inventory adjusted");
                Ok(record)
            }
            Err(RecordStoreError::ConditionalCheckFailed { current, .. }) => {
                let Some(current) = current else {
                    metrics::counter!("inventory_adjustments_total", "outcome" => "not_found")
                        .increment(1);
                    return Err(InventoryError::NotFound(product_id.clone()));
                };
                let available = current
                    .get("quantity")
                    .and_then(serde_json::Value::as_i64)
                    .unwrap_or_default();
                metrics::counter!("inventory_adjustments_total", "outcome" => "insufficient_stock")
                    .increment(1);
                metrics::counter!("inventory_insufficient_stock_total").increment(1);
                tracing::warn!(delta, available, "insufficient stock");
                Err(InventoryError::InsufficientStock {
                    product_id: product_id.clone(),
                    requested: delta.saturating_abs(),
                    available,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ErrorKind;
    use record_store::InMemoryRecordStore;

    async fn ledger_with(product: &str, quantity: i64) -> InventoryLedger<InMemoryRecordStore> {
        let ledger = InventoryLedger::new(InMemoryRecordStore::new());
        ledger
            .create_item(NewInventoryItem::new(product, quantity))
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_create_and_get_item() {
        let ledger = ledger_with("SKU-1", 5).await;

        let record = ledger
            .get_item(&ProductId::new("SKU-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.quantity, 5);
        assert_eq!(record.created_at, record.updated_at);

        assert!(
            ledger
                .get_item(&ProductId::new("SKU-2"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let ledger = InventoryLedger::new(InMemoryRecordStore::new());

        let err = ledger
            .create_item(NewInventoryItem::new("", 5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = ledger
            .create_item(NewInventoryItem::new("SKU-1", -1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_create_twice_fails_with_already_exists() {
        let ledger = ledger_with("SKU-1", 5).await;

        let err = ledger
            .create_item(NewInventoryItem::new("SKU-1", 500))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::AlreadyExists(_)));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let record = ledger
            .get_item(&ProductId::new("SKU-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.quantity, 5);
    }

    #[tokio::test]
    async fn test_decrement_then_insufficient_stock() {
        let ledger = ledger_with("sku-1", 5).await;
        let sku = ProductId::new("sku-1");

        let record = ledger.adjust_quantity(&sku, -3).await.unwrap();
        assert_eq!(record.quantity, 2);

        let err = ledger.adjust_quantity(&sku, -3).await.unwrap_err();
        match err {
            InventoryError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }

        let record = ledger.get_item(&sku).await.unwrap().unwrap();
        assert_eq!(record.quantity, 2);
    }

    #[tokio::test]
    async fn test_decrement_to_exactly_zero() {
        let ledger = ledger_with("SKU-1", 4).await;
        let record = ledger
            .adjust_quantity(&ProductId::new("SKU-1"), -4)
            .await
            .unwrap();
        assert_eq!(record.quantity, 0);
    }

    #[tokio::test]
    async fn test_increment_restocks() {
        let ledger = ledger_with("SKU-1", 0).await;
        let record = ledger
            .adjust_quantity(&ProductId::new("SKU-1"), 7)
            .await
            .unwrap();
        assert_eq!(record.quantity, 7);
        assert!(record.updated_at >= record.created_at);
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let ledger = InventoryLedger::new(InMemoryRecordStore::new());
        let sku = ProductId::new("SKU-404");

        let err = ledger.adjust_quantity(&sku, -1).await.unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));

        // increments must not create records either
        let err = ledger.adjust_quantity(&sku, 5).await.unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
        assert!(ledger.get_item(&sku).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_delta_is_rejected() {
        let ledger = ledger_with("SKU-1", 4).await;
        let err = ledger
            .adjust_quantity(&ProductId::new("SKU-1"), 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_store_outage_is_transient() {
        let store = InMemoryRecordStore::new();
        let ledger = InventoryLedger::new(store.clone());
        store.set_unavailable(true);

        let err = ledger
            .adjust_quantity(&ProductId::new("SKU-1"), -1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }
}
