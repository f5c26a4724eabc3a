//! Order record store.

use chrono::Utc;
use common::OrderId;
use event_bus::{EventBus, EventPublisher};
use record_store::{Condition, RecordStore, RecordStoreError, RecordStoreExt, UpdateExpression};

use crate::error::{OrderError, Result};
use crate::events::{OrderEvent, OrderUpdated};
use crate::order::{Order, OrderStatus};

/// Record store table holding orders, keyed by order ID.
pub const TABLE: &str = "orders";

/// Persists orders and applies status transitions.
///
/// Status changes are conditional writes on the current status, so two
/// concurrent transitions of the same order cannot both win.
#[derive(Debug, Clone)]
pub struct OrderRepository<S: RecordStore, B: EventBus> {
    store: S,
    publisher: EventPublisher<B>,
}

impl<S: RecordStore, B: EventBus> OrderRepository<S, B> {
    pub fn new(store: S, publisher: EventPublisher<B>) -> Self {
        Self { store, publisher }
    }

    /// Persists a new order. Fails with `AlreadyExists` if the ID is taken.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn create(&self, order: &Order) -> Result<()> {
        match self
            .store
            .put_record(
                TABLE,
                &order.id.to_string(),
                order,
                Some(Condition::attribute_not_exists("id")),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_conditional_check_failed() => Err(OrderError::AlreadyExists(order.id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads an order by ID.
    pub async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.store.get_record(TABLE, &order_id.to_string()).await?)
    }

    /// Moves an order from `CREATED` to a terminal status.
    ///
    /// Repeating a transition the order already made returns the order
    /// unchanged and publishes nothing. Any other move out of a terminal
    /// status fails with `InvalidTransition`.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        if !OrderStatus::Created.can_transition_to(status) {
            return Err(OrderError::Validation(format!(
                "cannot set order status to {status}"
            )));
        }

        let updated_at = Utc::now();
        let update = UpdateExpression::new()
            .set("status", status.as_str())
            .set("updatedAt", updated_at.to_rfc3339());
        let condition = Condition::attribute_exists("id")
            .and(Condition::equals("status", OrderStatus::Created.as_str()));

        let order: Order = match self
            .store
            .update(TABLE, &order_id.to_string(), update, Some(condition))
            .await
        {
            Ok(item) => record_store::from_item(item)?,
            Err(RecordStoreError::ConditionalCheckFailed { current, .. }) => {
                let Some(current) = current else {
                    return Err(OrderError::NotFound(order_id));
                };
                let current: Order = record_store::from_item(current)?;
                if current.status == status {
                    tracing::debug!(%status, "order already in requested status");
                    return Ok(current);
                }
                return Err(OrderError::InvalidTransition {
                    order_id,
                    from: current.status,
                    to: status,
                });
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(%status, "order status updated");
        self.publisher
            .publish_advisory(&OrderEvent::Updated(OrderUpdated {
                order_id,
                status,
                updated_at,
            }))
            .await;
        Ok(order)
    }
}
