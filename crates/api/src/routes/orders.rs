//! Order placement and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, SagaId};
use event_bus::EventBus;
use orders::{CreateOrderRequest, Order};
use record_store::RecordStore;
use saga::SagaStatus;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub order: Order,
    pub saga_id: SagaId,
    pub saga_status: SagaStatus,
}

/// POST /orders: create an order and run its fulfillment saga.
///
/// A saga that fails and is compensated still answers 201; the order in
/// the body is `FAILED`.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>), ApiError>
where
    S: RecordStore + Clone + 'static,
    B: EventBus + Clone + 'static,
{
    let Json(request) = payload?;
    let placed = state.fulfillment.place_order(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(PlaceOrderResponse {
            order: placed.order,
            saga_id: placed.saga.saga_id,
            saga_status: placed.saga.status,
        }),
    ))
}

/// GET /orders/{id}: load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError>
where
    S: RecordStore + Clone + 'static,
    B: EventBus + Clone + 'static,
{
    let order_id = OrderId::parse(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))?;

    state
        .fulfillment
        .workflow()
        .get_order(order_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))
}
