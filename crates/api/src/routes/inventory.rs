//! Inventory endpoints, including the inventory-consuming trigger.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ProductId;
use event_bus::EventBus;
use inventory::{InventoryRecord, InventoryTrigger, NewInventoryItem, TriggerOutcome};
use record_store::RecordStore;
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta: i64,
}

/// POST /inventory: create a stock record.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    payload: Result<Json<NewInventoryItem>, JsonRejection>,
) -> Result<(StatusCode, Json<InventoryRecord>), ApiError>
where
    S: RecordStore + Clone + 'static,
    B: EventBus + Clone + 'static,
{
    let Json(item) = payload?;
    let record = state.inventory.ledger().create_item(item).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /inventory/{product_id}: load a stock record.
#[tracing::instrument(skip(state))]
pub async fn get<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(product_id): Path<String>,
) -> Result<Json<InventoryRecord>, ApiError>
where
    S: RecordStore + Clone + 'static,
    B: EventBus + Clone + 'static,
{
    state
        .inventory
        .ledger()
        .get_item(&ProductId::new(product_id.as_str()))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Inventory record {product_id} not found")))
}

/// POST /inventory/{product_id}/adjust: apply a signed quantity delta.
#[tracing::instrument(skip(state, payload))]
pub async fn adjust<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(product_id): Path<String>,
    payload: Result<Json<AdjustRequest>, JsonRejection>,
) -> Result<Json<InventoryRecord>, ApiError>
where
    S: RecordStore + Clone + 'static,
    B: EventBus + Clone + 'static,
{
    let Json(request) = payload?;
    let record = state
        .inventory
        .ledger()
        .adjust_quantity(&ProductId::new(product_id), request.delta)
        .await?;
    Ok(Json(record))
}

/// POST /inventory/order-updates: deduct an order's items.
///
/// Permanent failures answer 200 with a `FAILED` outcome so the invoker
/// does not redeliver; transient failures answer 503.
#[tracing::instrument(skip(state, payload))]
pub async fn order_updates<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    payload: Result<Json<InventoryTrigger>, JsonRejection>,
) -> Result<Json<TriggerOutcome>, ApiError>
where
    S: RecordStore + Clone + 'static,
    B: EventBus + Clone + 'static,
{
    let Json(trigger) = payload?;
    let outcome = inventory::handle_inventory_trigger(&state.inventory, trigger).await?;
    Ok(Json(outcome))
}
