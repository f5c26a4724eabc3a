//! Entry point for the inventory-consuming trigger.
//!
//! The trigger is redelivered by its invoker when the handler returns an
//! error, so only transient failures are returned as errors. Permanent
//! failures become a structured [`TriggerOutcome::Failed`] that the invoker
//! acknowledges.
//!
//! Every handled order is remembered in [`APPLIED_TABLE`]: a redelivered
//! trigger gets the recorded outcome back without touching stock, and a
//! retry after a transient failure only deducts the lines the failed attempt
//! did not commit.

use chrono::{DateTime, Utc};
use common::{ErrorKind, LineItem};
use event_bus::EventBus;
use record_store::{Condition, RecordStore, RecordStoreExt};
use serde::{Deserialize, Serialize};

use crate::coordinator::{AppliedItems, InventoryUpdateCoordinator, UpdateMode};
use crate::error::{InventoryError, Result};
use crate::record::InventoryRecord;

/// Record store table of handled triggers, keyed by order ID.
pub const APPLIED_TABLE: &str = "inventory_applied";

/// Payload of the inventory-consuming trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTrigger {
    pub order_id: String,
    pub items: Vec<LineItem>,
}

/// A permanent failure reported back to the invoker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// Result of handling one trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        order_id: String,
        updated_items: Vec<InventoryRecord>,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        order_id: String,
        error: TriggerFailure,
    },
}

/// What has been done for one order's trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerRecord {
    order_id: String,
    /// Lines already deducted.
    applied: Vec<LineItem>,
    /// Set once the trigger reached a final outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    outcome: Option<TriggerOutcome>,
    updated_at: DateTime<Utc>,
}

/// Deducts a trigger's items from stock.
///
/// Returns `Err` only for transient failures, which the invoker retries.
/// Handling the same `orderId` again returns the first final outcome and
/// writes nothing.
#[tracing::instrument(skip(coordinator, trigger), fields(order_id = %trigger.order_id))]
pub async fn handle_inventory_trigger<S: RecordStore, B: EventBus>(
    coordinator: &InventoryUpdateCoordinator<S, B>,
    trigger: InventoryTrigger,
) -> Result<TriggerOutcome> {
    if let Err(e) = validate(&trigger) {
        tracing::warn!(error = %e, "inventory trigger rejected");
        return Ok(failed(trigger.order_id, ErrorKind::Validation, &e));
    }

    let store = coordinator.ledger().store();
    let previous: Option<TriggerRecord> = store
        .get_record(APPLIED_TABLE, &trigger.order_id)
        .await?;
    let mut applied = match previous {
        Some(TriggerRecord {
            outcome: Some(outcome),
            ..
        }) => {
            tracing::info!("inventory trigger already handled");
            metrics::counter!("inventory_trigger_duplicates_total").increment(1);
            return Ok(outcome);
        }
        Some(record) => record.applied,
        None => Vec::new(),
    };

    let pending = remaining_lines(&trigger.items, &applied);
    let attempt = if pending.is_empty() {
        AppliedItems::default()
    } else {
        coordinator
            .try_apply_order_items(&pending, UpdateMode::Deduct)
            .await
    };
    let committed_now = !attempt.lines.is_empty();
    applied.extend(attempt.lines.iter().cloned());

    let outcome = match attempt.into_result() {
        Ok(updated_items) => TriggerOutcome::Success {
            order_id: trigger.order_id.clone(),
            updated_items,
        },
        Err(e) => match e.kind() {
            ErrorKind::Transient => {
                tracing::error!(error = %e, "inventory trigger failed, retryable");
                if committed_now {
                    let progress = TriggerRecord {
                        order_id: trigger.order_id.clone(),
                        applied,
                        outcome: None,
                        updated_at: Utc::now(),
                    };
                    if let Err(save_err) = store
                        .put_record(APPLIED_TABLE, &trigger.order_id, &progress, None)
                        .await
                    {
                        tracing::error!(error = %save_err, "failed to record partial inventory trigger");
                    }
                }
                return Err(e);
            }
            kind @ (ErrorKind::Validation
            | ErrorKind::NotFound
            | ErrorKind::InsufficientStock
            | ErrorKind::Conflict) => {
                tracing::warn!(%kind, error = %e, "inventory trigger rejected");
                failed(trigger.order_id.clone(), kind, &e)
            }
        },
    };

    let record = TriggerRecord {
        order_id: trigger.order_id.clone(),
        applied,
        outcome: Some(outcome.clone()),
        updated_at: Utc::now(),
    };
    match store
        .put_record(
            APPLIED_TABLE,
            &trigger.order_id,
            &record,
            Some(Condition::attribute_not_exists("outcome")),
        )
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_conditional_check_failed() => {
            tracing::warn!("inventory trigger recorded by a concurrent delivery");
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to record inventory trigger outcome");
        }
    }

    Ok(outcome)
}

fn failed(order_id: String, kind: ErrorKind, error: &InventoryError) -> TriggerOutcome {
    TriggerOutcome::Failed {
        order_id,
        error: TriggerFailure {
            kind,
            message: error.to_string(),
        },
    }
}

/// `items` minus the lines in `applied`, each applied line matched once.
fn remaining_lines(items: &[LineItem], applied: &[LineItem]) -> Vec<LineItem> {
    let mut committed = applied.to_vec();
    items
        .iter()
        .filter(|item| match committed.iter().position(|line| line == *item) {
            Some(index) => {
                committed.swap_remove(index);
                false
            }
            None => true,
        })
        .cloned()
        .collect()
}

fn validate(trigger: &InventoryTrigger) -> Result<()> {
    if trigger.order_id.trim().is_empty() {
        return Err(InventoryError::Validation(
            "orderId is required".to_string(),
        ));
    }
    if trigger.items.is_empty() {
        return Err(InventoryError::Validation(
            "items must not be empty".to_string(),
        ));
    }
    Ok(())
}
