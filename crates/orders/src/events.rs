//! Events emitted by the orders service.

use chrono::{DateTime, Utc};
use common::{LineItem, Money, OrderId, UserId};
use event_bus::EventDetail;
use serde::{Deserialize, Serialize};

use crate::order::OrderStatus;

/// Event source stamped on every order event.
pub const SOURCE: &str = "ecommerce.orders";

/// Why an order was rejected at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    InsufficientStock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFailed {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub reason: FailureReason,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdated {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

/// Events emitted by the orders service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderEvent {
    Created(OrderCreated),
    Failed(OrderFailed),
    Updated(OrderUpdated),
}

impl EventDetail for OrderEvent {
    fn detail_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "OrderCreated",
            OrderEvent::Failed(_) => "OrderFailed",
            OrderEvent::Updated(_) => "OrderUpdated",
        }
    }
}
