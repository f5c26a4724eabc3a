//! Persisted saga instance.

use chrono::{DateTime, Utc};
use common::{LineItem, OrderId, SagaId};
use serde::{Deserialize, Serialize};

use crate::state::{SagaStatus, StepStatus};

/// Forward steps of the order fulfillment saga, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStep {
    ReserveInventory,
    ProcessPayment,
}

impl SagaStep {
    /// Every step in forward order.
    pub const ALL: [SagaStep; 2] = [SagaStep::ReserveInventory, SagaStep::ProcessPayment];

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::ReserveInventory => "RESERVE_INVENTORY",
            SagaStep::ProcessPayment => "PROCESS_PAYMENT",
        }
    }
}

impl std::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The recorded state of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub step: SagaStep,
    pub status: StepStatus,
}

/// Why a saga is being compensated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaFailure {
    pub reason: String,
    /// Set when the payment step actually charged the customer. Payment
    /// compensation is only published when this is true.
    pub payment_processed: bool,
}

impl SagaFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            payment_processed: false,
        }
    }

    pub fn with_payment_processed(mut self) -> Self {
        self.payment_processed = true;
        self
    }
}

/// Durable record of one order's fulfillment saga.
///
/// `steps` holds the steps in the order they were started. `version` is
/// bumped on every save and guards against concurrent writers.
/// `reserved_items` lists the lines the reservation step deducted from
/// stock that compensation has not yet restocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaInstance {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub steps: Vec<StepRecord>,
    pub status: SagaStatus,
    pub version: u64,
    pub failure_reason: Option<String>,
    pub payment_processed: bool,
    #[serde(default)]
    pub reserved_items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaInstance {
    /// Creates a running saga with no steps.
    pub fn new(saga_id: SagaId, order_id: OrderId) -> Self {
        let now = Utc::now();
        Self {
            saga_id,
            order_id,
            steps: Vec::new(),
            status: SagaStatus::Running,
            version: 0,
            failure_reason: None,
            payment_processed: false,
            reserved_items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the recorded status of a step, if it was started.
    pub fn step_status(&self, step: SagaStep) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|record| record.step == step)
            .map(|record| record.status)
    }

    pub fn record_step_started(&mut self, step: SagaStep) {
        self.set_step(step, StepStatus::Started);
    }

    pub fn mark_step_succeeded(&mut self, step: SagaStep) {
        self.set_step(step, StepStatus::Succeeded);
    }

    pub fn mark_step_compensated(&mut self, step: SagaStep) {
        self.set_step(step, StepStatus::Compensated);
    }

    pub fn record_reserved(&mut self, lines: &[LineItem]) {
        self.reserved_items.extend_from_slice(lines);
    }

    /// Forgets restocked lines, each matched once.
    pub fn release_reserved(&mut self, lines: &[LineItem]) {
        for line in lines {
            if let Some(index) = self.reserved_items.iter().position(|r| r == line) {
                self.reserved_items.remove(index);
            }
        }
    }

    /// Steps still awaiting compensation, most recently started first.
    pub fn steps_to_compensate(&self) -> Vec<SagaStep> {
        self.steps
            .iter()
            .rev()
            .filter(|record| record.status != StepStatus::Compensated)
            .map(|record| record.step)
            .collect()
    }

    /// Enters compensation.
    ///
    /// A saga resumed mid-compensation keeps its original failure reason;
    /// the payment flag is sticky once set.
    pub fn begin_compensation(&mut self, failure: &SagaFailure) {
        self.status = SagaStatus::Compensating;
        if self.failure_reason.is_none() {
            self.failure_reason = Some(failure.reason.clone());
        }
        self.payment_processed |= failure.payment_processed;
    }

    fn set_step(&mut self, step: SagaStep, status: StepStatus) {
        match self.steps.iter_mut().find(|record| record.step == step) {
            Some(record) => record.status = status,
            None => self.steps.push(StepRecord { step, status }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saga() -> SagaInstance {
        let order_id = OrderId::new();
        SagaInstance::new(SagaId::for_order(order_id), order_id)
    }

    #[test]
    fn test_new_saga_is_running_without_steps() {
        let saga = saga();
        assert_eq!(saga.status, SagaStatus::Running);
        assert!(saga.steps.is_empty());
        assert_eq!(saga.version, 0);
        assert!(saga.saga_id.as_str().starts_with("saga-"));
    }

    #[test]
    fn test_step_lifecycle() {
        let mut saga = saga();
        saga.record_step_started(SagaStep::ReserveInventory);
        saga.mark_step_succeeded(SagaStep::ReserveInventory);
        saga.record_step_started(SagaStep::ProcessPayment);

        assert_eq!(saga.steps.len(), 2);
        assert_eq!(
            saga.step_status(SagaStep::ReserveInventory),
            Some(StepStatus::Succeeded)
        );
        assert_eq!(
            saga.step_status(SagaStep::ProcessPayment),
            Some(StepStatus::Started)
        );
    }

    #[test]
    fn test_steps_to_compensate_are_reversed_and_skip_compensated() {
        let mut saga = saga();
        saga.record_step_started(SagaStep::ReserveInventory);
        saga.record_step_started(SagaStep::ProcessPayment);
        assert_eq!(
            saga.steps_to_compensate(),
            vec![SagaStep::ProcessPayment, SagaStep::ReserveInventory]
        );

        saga.mark_step_compensated(SagaStep::ProcessPayment);
        assert_eq!(
            saga.steps_to_compensate(),
            vec![SagaStep::ReserveInventory]
        );
    }

    #[test]
    fn test_begin_compensation_keeps_first_reason() {
        let mut saga = saga();
        saga.begin_compensation(&SagaFailure::new("payment declined").with_payment_processed());
        saga.begin_compensation(&SagaFailure::new("stalled"));

        assert_eq!(saga.status, SagaStatus::Compensating);
        assert_eq!(saga.failure_reason.as_deref(), Some("payment declined"));
        assert!(saga.payment_processed);
    }

    #[test]
    fn test_release_reserved_matches_each_line_once() {
        let mut saga = saga();
        saga.record_reserved(&[
            LineItem::new("SKU-001", 2),
            LineItem::new("SKU-001", 2),
            LineItem::new("SKU-002", 1),
        ]);

        saga.release_reserved(&[LineItem::new("SKU-001", 2), LineItem::new("SKU-003", 1)]);

        assert_eq!(
            saga.reserved_items,
            vec![LineItem::new("SKU-001", 2), LineItem::new("SKU-002", 1)]
        );
    }

    #[test]
    fn test_reserved_items_default_when_absent() {
        let mut json = serde_json::to_value(saga()).unwrap();
        json.as_object_mut().unwrap().remove("reservedItems");

        let saga: SagaInstance = serde_json::from_value(json).unwrap();
        assert!(saga.reserved_items.is_empty());
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut saga = saga();
        saga.record_step_started(SagaStep::ReserveInventory);
        let json = serde_json::to_value(&saga).unwrap();

        assert_eq!(json["status"], "RUNNING");
        assert_eq!(json["steps"][0]["step"], "RESERVE_INVENTORY");
        assert_eq!(json["steps"][0]["status"], "STARTED");
        assert!(json.get("sagaId").is_some());
        assert!(json.get("paymentProcessed").is_some());
    }
}
