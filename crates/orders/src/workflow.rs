//! Order creation workflow.

use common::{LineItem, OrderId, ProductId};
use event_bus::{EventBus, EventPublisher};
use inventory::InventoryLedger;
use record_store::RecordStore;

use crate::error::{OrderError, Result};
use crate::events::{FailureReason, OrderCreated, OrderEvent, OrderFailed};
use crate::order::{CreateOrderRequest, Order};
use crate::repository::OrderRepository;

/// Validates and persists new orders.
///
/// The stock check here is a non-binding pre-flight read. Stock can change
/// between this check and the ledger's conditional decrement; only the
/// decrement is authoritative.
#[derive(Debug, Clone)]
pub struct OrderWorkflow<S: RecordStore, B: EventBus> {
    repository: OrderRepository<S, B>,
    ledger: InventoryLedger<S>,
    publisher: EventPublisher<B>,
}

impl<S, B> OrderWorkflow<S, B>
where
    S: RecordStore,
    B: EventBus + Clone + 'static,
{
    pub fn new(
        repository: OrderRepository<S, B>,
        ledger: InventoryLedger<S>,
        publisher: EventPublisher<B>,
    ) -> Self {
        Self {
            repository,
            ledger,
            publisher,
        }
    }

    pub fn repository(&self) -> &OrderRepository<S, B> {
        &self.repository
    }

    /// Creates an order in `CREATED` status.
    ///
    /// `OrderCreated` is published on a detached task after the order is
    /// persisted; its failure never fails the create. A stock shortfall
    /// raises `InsufficientStock` and detaches an `OrderFailed`. Other
    /// rejections publish nothing.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        validate(&request)?;

        let order_id = OrderId::new();
        if let Err(e) = self.check_stock(&request.items).await {
            metrics::counter!("orders_rejected_total", "reason" => e.kind().as_str())
                .increment(1);
            if let OrderError::InsufficientStock { .. } = e {
                self.publisher
                    .publish_detached(&OrderEvent::Failed(OrderFailed {
                        order_id,
                        user_id: request.user_id.clone(),
                        reason: FailureReason::InsufficientStock,
                        error: e.to_string(),
                    }));
            }
            tracing::warn!(%order_id, error = %e, "order rejected");
            return Err(e);
        }

        let order = Order::new(order_id, request);
        self.repository.create(&order).await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(%order_id, total = %order.total_amount, "order created");

        self.publisher
            .publish_detached(&OrderEvent::Created(OrderCreated {
                order_id,
                user_id: order.user_id.clone(),
                items: order.items.clone(),
                total_amount: order.total_amount,
                created_at: order.created_at,
            }));

        Ok(order)
    }

    /// Loads an order by ID.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.repository.get(order_id).await
    }

    async fn check_stock(&self, items: &[LineItem]) -> Result<()> {
        for (product_id, requested) in requested_totals(items) {
            let record = self
                .ledger
                .get_item(&product_id)
                .await?
                .ok_or_else(|| OrderError::ProductNotFound(product_id.clone()))?;
            if record.quantity < requested {
                return Err(OrderError::InsufficientStock {
                    product_id,
                    requested,
                    available: record.quantity,
                });
            }
        }
        Ok(())
    }
}

/// Sums quantities per product, keeping first-appearance order.
fn requested_totals(items: &[LineItem]) -> Vec<(ProductId, i64)> {
    let mut totals: Vec<(ProductId, i64)> = Vec::new();
    for item in items {
        match totals.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, total)) => *total = total.saturating_add(item.quantity),
            None => totals.push((item.product_id.clone(), item.quantity)),
        }
    }
    totals
}

fn validate(request: &CreateOrderRequest) -> Result<()> {
    if request.user_id.is_blank() {
        return Err(OrderError::Validation("userId is required".to_string()));
    }
    if request.items.is_empty() {
        return Err(OrderError::Validation("items must not be empty".to_string()));
    }
    for item in &request.items {
        if item.product_id.is_blank() {
            return Err(OrderError::Validation(
                "every item needs a productId".to_string(),
            ));
        }
        if item.quantity <= 0 {
            return Err(OrderError::Validation(format!(
                "quantity for {} must be positive, got {}",
                item.product_id, item.quantity
            )));
        }
    }
    if request.total_amount.is_negative() {
        return Err(OrderError::Validation(
            "totalAmount must not be negative".to_string(),
        ));
    }
    Ok(())
}
