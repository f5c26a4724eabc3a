//! Events published by the saga coordinator.

use chrono::{DateTime, Utc};
use common::{LineItem, Money, OrderId, SagaId, UserId};
use event_bus::EventDetail;
use orders::Order;
use serde::Serialize;

use crate::instance::SagaStep;

/// Event source stamped on every saga event.
pub const SOURCE: &str = "ecommerce.saga";

/// Payload shared by step and compensation events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaStepPayload {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub total_amount: Money,
    pub timestamp: DateTime<Utc>,
}

impl SagaStepPayload {
    pub fn new(saga_id: &SagaId, order: &Order) -> Self {
        Self {
            saga_id: saga_id.clone(),
            order_id: order.id,
            user_id: order.user_id.clone(),
            items: order.items.clone(),
            total_amount: order.total_amount,
            timestamp: Utc::now(),
        }
    }
}

/// Terminal event of a failed saga.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaOrderFailed {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Events that can occur during saga execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SagaEvent {
    InventoryReservationStarted(SagaStepPayload),
    PaymentProcessingStarted(SagaStepPayload),
    PaymentCompensationStarted(SagaStepPayload),
    InventoryCompensationStarted(SagaStepPayload),
    OrderFailed(SagaOrderFailed),
}

impl SagaEvent {
    /// The event announcing that a forward step started.
    pub fn step_started(step: SagaStep, payload: SagaStepPayload) -> Self {
        match step {
            SagaStep::ReserveInventory => SagaEvent::InventoryReservationStarted(payload),
            SagaStep::ProcessPayment => SagaEvent::PaymentProcessingStarted(payload),
        }
    }

    /// The event announcing that a step is being compensated.
    pub fn compensation_started(step: SagaStep, payload: SagaStepPayload) -> Self {
        match step {
            SagaStep::ReserveInventory => SagaEvent::InventoryCompensationStarted(payload),
            SagaStep::ProcessPayment => SagaEvent::PaymentCompensationStarted(payload),
        }
    }
}

impl EventDetail for SagaEvent {
    fn detail_type(&self) -> &'static str {
        match self {
            SagaEvent::InventoryReservationStarted(_) => "InventoryReservationStarted",
            SagaEvent::PaymentProcessingStarted(_) => "PaymentProcessingStarted",
            SagaEvent::PaymentCompensationStarted(_) => "PaymentCompensationStarted",
            SagaEvent::InventoryCompensationStarted(_) => "InventoryCompensationStarted",
            SagaEvent::OrderFailed(_) => "OrderFailed",
        }
    }
}
