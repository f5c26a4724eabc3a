//! HTTP API host for the order consistency core.
//!
//! Composition root: builds the record store, event bus, inventory, orders
//! and saga components once and serves them over REST, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use event_bus::{EventBus, EventPublisher};
use inventory::{InventoryLedger, InventoryUpdateCoordinator};
use metrics_exporter_prometheus::PrometheusHandle;
use orders::{OrderRepository, OrderWorkflow};
use record_store::RecordStore;
use saga::{OrderFulfillment, SagaCoordinator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: RecordStore, B: EventBus> {
    pub fulfillment: OrderFulfillment<S, B>,
    pub inventory: InventoryUpdateCoordinator<S, B>,
    pub saga_stale_after: Duration,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, B>(state: Arc<AppState<S, B>>, metrics_handle: PrometheusHandle) -> Router
where
    S: RecordStore + Clone + 'static,
    B: EventBus + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S, B>))
        .route("/orders/{id}", get(routes::orders::get::<S, B>))
        .route("/inventory", post(routes::inventory::create::<S, B>))
        .route(
            "/inventory/order-updates",
            post(routes::inventory::order_updates::<S, B>),
        )
        .route(
            "/inventory/{product_id}",
            get(routes::inventory::get::<S, B>),
        )
        .route(
            "/inventory/{product_id}/adjust",
            post(routes::inventory::adjust::<S, B>),
        )
        .route("/sagas/reconcile", post(routes::sagas::reconcile::<S, B>))
        .route("/sagas/{id}", get(routes::sagas::get::<S, B>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires every component over one store and one bus.
pub fn create_default_state<S, B>(store: S, bus: B, config: &Config) -> Arc<AppState<S, B>>
where
    S: RecordStore + Clone + 'static,
    B: EventBus + Clone + 'static,
{
    let bus_name = config.event_bus_name.as_str();

    let ledger = InventoryLedger::new(store.clone());
    let mut inventory = InventoryUpdateCoordinator::new(
        ledger.clone(),
        EventPublisher::new(bus.clone(), inventory::SOURCE, bus_name),
    );
    if let Some(threshold) = config.low_stock_threshold {
        inventory = inventory.with_low_stock_threshold(threshold);
    }

    let order_publisher = EventPublisher::new(bus.clone(), orders::SOURCE, bus_name);
    let order_repository = OrderRepository::new(store.clone(), order_publisher.clone());
    let workflow = OrderWorkflow::new(order_repository.clone(), ledger, order_publisher);
    let coordinator = SagaCoordinator::new(
        store,
        order_repository,
        inventory.clone(),
        EventPublisher::new(bus, saga::SOURCE, bus_name),
    );

    Arc::new(AppState {
        fulfillment: OrderFulfillment::new(workflow, coordinator),
        inventory,
        saga_stale_after: config.saga_stale_after,
    })
}
