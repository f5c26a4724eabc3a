//! Saga inspection and reconciliation endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::SagaId;
use event_bus::EventBus;
use record_store::RecordStore;
use saga::{ReconcileReport, SagaInstance};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileParams {
    /// Overrides the configured staleness threshold.
    pub stale_after_secs: Option<u64>,
}

/// GET /sagas/{id}: load a saga instance.
#[tracing::instrument(skip(state))]
pub async fn get<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaInstance>, ApiError>
where
    S: RecordStore + Clone + 'static,
    B: EventBus + Clone + 'static,
{
    state
        .fulfillment
        .coordinator()
        .get_saga(&SagaId::new(id.as_str()))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Saga {id} not found")))
}

/// POST /sagas/reconcile: compensate stalled sagas.
#[tracing::instrument(skip(state))]
pub async fn reconcile<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Query(params): Query<ReconcileParams>,
) -> Result<Json<ReconcileReport>, ApiError>
where
    S: RecordStore + Clone + 'static,
    B: EventBus + Clone + 'static,
{
    let stale_after = params
        .stale_after_secs
        .map(Duration::from_secs)
        .unwrap_or(state.saga_stale_after);
    let report = state
        .fulfillment
        .coordinator()
        .reconcile(stale_after)
        .await?;
    Ok(Json(report))
}
