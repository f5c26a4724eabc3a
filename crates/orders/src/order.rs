//! Order entity and status state machine.

use chrono::{DateTime, Utc};
use common::{LineItem, Money, OrderId, UserId};
use serde::{Deserialize, Serialize};

/// The status of an order.
///
/// State transitions:
/// ```text
/// Created ──┬──► Completed
///           └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Persisted, fulfillment pending.
    #[default]
    Created,

    /// Fulfillment failed and was compensated (terminal state).
    Failed,

    /// Every fulfillment step succeeded (terminal state).
    Completed,
}

impl OrderStatus {
    /// Returns true if the order may move from this status to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Created, OrderStatus::Completed)
                | (OrderStatus::Created, OrderStatus::Failed)
        )
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a new order in `CREATED` status.
    pub fn new(id: OrderId, request: CreateOrderRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: request.user_id,
            items: request.items,
            total_amount: request.total_amount,
            status: OrderStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Inbound order-creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub total_amount: Money,
}

impl CreateOrderRequest {
    pub fn new(user_id: impl Into<String>, items: Vec<LineItem>, total_amount: Money) -> Self {
        Self {
            user_id: UserId::new(user_id),
            items,
            total_amount,
        }
    }
}
