//! Order placement: create the order, then drive its saga.

use event_bus::EventBus;
use orders::{CreateOrderRequest, Order, OrderWorkflow};
use record_store::RecordStore;
use serde::Serialize;

use crate::coordinator::SagaCoordinator;
use crate::error::Result;
use crate::instance::SagaInstance;

/// An order together with the saga that fulfilled it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order: Order,
    pub saga: SagaInstance,
}

/// Places orders and runs their fulfillment saga.
#[derive(Debug, Clone)]
pub struct OrderFulfillment<S: RecordStore, B: EventBus> {
    workflow: OrderWorkflow<S, B>,
    coordinator: SagaCoordinator<S, B>,
}

impl<S, B> OrderFulfillment<S, B>
where
    S: RecordStore,
    B: EventBus + Clone + 'static,
{
    pub fn new(workflow: OrderWorkflow<S, B>, coordinator: SagaCoordinator<S, B>) -> Self {
        Self {
            workflow,
            coordinator,
        }
    }

    pub fn workflow(&self) -> &OrderWorkflow<S, B> {
        &self.workflow
    }

    pub fn coordinator(&self) -> &SagaCoordinator<S, B> {
        &self.coordinator
    }

    /// Creates the order and runs its saga to a terminal status.
    ///
    /// Order rejections surface as errors. A saga that fails and is
    /// compensated is not an error: the returned order is `FAILED`.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn place_order(&self, request: CreateOrderRequest) -> Result<PlacedOrder> {
        let order = self.workflow.create_order(request).await?;
        let saga = self.coordinator.start_saga(&order).await?;
        let order = self.workflow.get_order(order.id).await?.unwrap_or(order);
        Ok(PlacedOrder { order, saga })
    }
}
