//! Saga coordinator for the order fulfillment saga.

use std::time::{Duration, Instant};

use chrono::{TimeDelta, Utc};
use common::{ErrorKind, SagaId};
use event_bus::{EventBus, EventPublisher};
use inventory::{InventoryUpdateCoordinator, UpdateMode};
use orders::{Order, OrderRepository, OrderStatus};
use record_store::RecordStore;
use serde::Serialize;

use crate::error::{Result, SagaError};
use crate::events::{SagaEvent, SagaOrderFailed, SagaStepPayload};
use crate::instance::{SagaFailure, SagaInstance, SagaStep};
use crate::repository::SagaRepository;
use crate::state::SagaStatus;

/// Outcome of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Saga records scanned.
    pub examined: usize,
    /// Stale sagas driven to `FAILED`.
    pub compensated: usize,
    /// Stale sagas that could not be compensated this sweep.
    pub skipped: usize,
}

/// How a forward step ended.
enum StepResult {
    Done,
    /// The step failed and the saga must compensate.
    Failed(String),
}

/// Orchestrates the order fulfillment saga.
///
/// The reservation step deducts the order's items from stock through the
/// [`InventoryUpdateCoordinator`]; the payment step is announced by its
/// start event. On failure, started steps are undone in reverse order:
/// reserved stock is restocked and payment compensation is requested.
/// Every step transition is saved before the next one begins, so a crashed
/// saga can be found and compensated by [`reconcile`].
///
/// [`reconcile`]: SagaCoordinator::reconcile
#[derive(Debug, Clone)]
pub struct SagaCoordinator<S: RecordStore, B: EventBus> {
    sagas: SagaRepository<S>,
    orders: OrderRepository<S, B>,
    inventory: InventoryUpdateCoordinator<S, B>,
    publisher: EventPublisher<B>,
}

impl<S: RecordStore, B: EventBus> SagaCoordinator<S, B> {
    /// Creates a new saga coordinator.
    ///
    /// `publisher` should stamp events with [`crate::SOURCE`].
    pub fn new(
        store: S,
        orders: OrderRepository<S, B>,
        inventory: InventoryUpdateCoordinator<S, B>,
        publisher: EventPublisher<B>,
    ) -> Self {
        Self {
            sagas: SagaRepository::new(store),
            orders,
            inventory,
            publisher,
        }
    }

    /// Runs the saga for a freshly created order.
    ///
    /// Returns the saga in `COMPLETED` or, after compensation, `FAILED`
    /// status. The order is only marked `COMPLETED` once its items were
    /// deducted from stock. A failing step short-circuits the remaining
    /// steps. Re-running a finished saga returns it unchanged.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id, saga_type = "OrderFulfillment"))]
    pub async fn start_saga(&self, order: &Order) -> Result<SagaInstance> {
        let saga_start = Instant::now();
        let saga_id = SagaId::for_order(order.id);

        if let Some(existing) = self.sagas.get(&saga_id).await? {
            if existing.status.is_terminal() {
                tracing::debug!(%saga_id, status = %existing.status, "saga already finished");
                return Ok(existing);
            }
            return Err(SagaError::AlreadyStarted(saga_id));
        }

        if order.status != OrderStatus::Created {
            return Err(SagaError::OrderNotReady {
                order_id: order.id,
                status: order.status,
            });
        }

        let mut saga = SagaInstance::new(saga_id.clone(), order.id);
        self.sagas.create(&saga).await?;
        metrics::counter!("saga_started_total").increment(1);

        for step in SagaStep::ALL {
            saga.record_step_started(step);
            self.sagas.save(&mut saga).await?;
            tracing::info!(%saga_id, %step, "saga step started");

            if let StepResult::Failed(reason) = self.run_step(&mut saga, step, order).await? {
                tracing::warn!(%saga_id, %step, %reason, "saga step failed");
                let failure = SagaFailure::new(format!("{step} failed: {reason}"));
                self.run_compensation(&mut saga, order, failure).await?;
                metrics::histogram!("saga_duration_seconds")
                    .record(saga_start.elapsed().as_secs_f64());
                return Ok(saga);
            }

            saga.mark_step_succeeded(step);
            self.sagas.save(&mut saga).await?;
        }

        self.orders
            .update_status(order.id, OrderStatus::Completed)
            .await?;
        saga.status = SagaStatus::Completed;
        self.sagas.save(&mut saga).await?;

        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(duration);
        metrics::counter!("saga_completed").increment(1);
        tracing::info!(%saga_id, duration, "saga completed successfully");

        Ok(saga)
    }

    /// Compensates a saga and fails its order.
    ///
    /// Steps are compensated in reverse order of when they started. Reserved
    /// stock is restocked; if the restock fails the error is returned and
    /// the saga stays `COMPENSATING` for a later attempt. Payment
    /// compensation is published only if `failure` says payment was
    /// processed, and a payment compensation event that cannot be published
    /// is logged and left uncompensated. Compensating a `FAILED` saga is a
    /// no-op.
    #[tracing::instrument(skip(self, order, failure), fields(order_id = %order.id, reason = %failure.reason))]
    pub async fn compensate(
        &self,
        saga_id: &SagaId,
        order: &Order,
        failure: SagaFailure,
    ) -> Result<SagaInstance> {
        let mut saga = self
            .sagas
            .get(saga_id)
            .await?
            .ok_or_else(|| SagaError::NotFound(saga_id.clone()))?;
        self.run_compensation(&mut saga, order, failure).await?;
        Ok(saga)
    }

    /// Compensates every non-terminal saga not saved within `stale_after`.
    ///
    /// Steps compensated by an earlier, interrupted attempt are skipped.
    /// Failures are logged per saga and counted as skipped.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self, stale_after: Duration) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let Some(cutoff) = TimeDelta::from_std(stale_after)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(report);
        };

        for mut saga in self.sagas.list().await? {
            report.examined += 1;
            if saga.status.is_terminal() || saga.updated_at > cutoff {
                continue;
            }

            let saga_id = saga.saga_id.clone();
            let order = match self.orders.get(saga.order_id).await {
                Ok(Some(order)) => order,
                Ok(None) => {
                    tracing::warn!(%saga_id, order_id = %saga.order_id, "stale saga has no order");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(%saga_id, error = %e, "failed to load order for stale saga");
                    report.skipped += 1;
                    continue;
                }
            };

            let failure = SagaFailure {
                reason: format!("saga stalled in {} status", saga.status),
                payment_processed: saga.payment_processed,
            };
            match self.run_compensation(&mut saga, &order, failure).await {
                Ok(()) => report.compensated += 1,
                Err(e) => {
                    tracing::warn!(%saga_id, error = %e, "failed to compensate stale saga");
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            compensated = report.compensated,
            skipped = report.skipped,
            "saga reconciliation finished"
        );
        Ok(report)
    }

    /// Loads a saga instance by ID.
    pub async fn get_saga(&self, saga_id: &SagaId) -> Result<Option<SagaInstance>> {
        self.sagas.get(saga_id).await
    }

    /// Announces a step and performs its work.
    ///
    /// Lines deducted by the reservation are saved on the saga before any
    /// failure is reported, so compensation restocks exactly what was taken.
    async fn run_step(
        &self,
        saga: &mut SagaInstance,
        step: SagaStep,
        order: &Order,
    ) -> Result<StepResult> {
        let event = SagaEvent::step_started(step, SagaStepPayload::new(&saga.saga_id, order));
        if let Err(e) = self.publisher.publish(&event).await {
            return Ok(StepResult::Failed(e.to_string()));
        }

        match step {
            SagaStep::ReserveInventory => {
                let reserved = self
                    .inventory
                    .try_apply_order_items(&order.items, UpdateMode::Deduct)
                    .await;
                if !reserved.lines.is_empty() {
                    saga.record_reserved(&reserved.lines);
                    self.sagas.save(saga).await?;
                }
                match reserved.error {
                    None => Ok(StepResult::Done),
                    Some(e) => {
                        tracing::warn!(
                            saga_id = %saga.saga_id,
                            kind = %e.kind(),
                            reserved = reserved.lines.len(),
                            error = %e,
                            "inventory reservation failed"
                        );
                        Ok(StepResult::Failed(e.to_string()))
                    }
                }
            }
            SagaStep::ProcessPayment => Ok(StepResult::Done),
        }
    }

    /// Returns the saga's reserved lines to stock.
    async fn restock(&self, saga: &mut SagaInstance) -> Result<()> {
        if saga.reserved_items.is_empty() {
            return Ok(());
        }

        let reserved = saga.reserved_items.clone();
        let restocked = self
            .inventory
            .try_apply_order_items(&reserved, UpdateMode::Restock)
            .await;
        if !restocked.lines.is_empty() {
            saga.release_reserved(&restocked.lines);
            self.sagas.save(saga).await?;
        }

        match restocked.error {
            None => {
                tracing::info!(saga_id = %saga.saga_id, lines = reserved.len(), "reserved inventory restocked");
                Ok(())
            }
            Some(e) => {
                metrics::counter!("saga_restock_failures_total").increment(1);
                tracing::error!(
                    saga_id = %saga.saga_id,
                    remaining = saga.reserved_items.len(),
                    error = %e,
                    "failed to restock reserved inventory"
                );
                Err(e.into())
            }
        }
    }

    /// Publishes a compensation event, logging and counting a failure.
    async fn announce_compensation(&self, saga_id: &SagaId, step: SagaStep, order: &Order) -> bool {
        let event = SagaEvent::compensation_started(step, SagaStepPayload::new(saga_id, order));
        match self.publisher.publish(&event).await {
            Ok(()) => true,
            Err(e) => {
                metrics::counter!("saga_compensation_publish_failures_total", "step" => step.as_str())
                    .increment(1);
                tracing::error!(%saga_id, %step, error = %e, "saga compensation step failed");
                false
            }
        }
    }

    async fn run_compensation(
        &self,
        saga: &mut SagaInstance,
        order: &Order,
        failure: SagaFailure,
    ) -> Result<()> {
        let saga_id = saga.saga_id.clone();
        if saga.order_id != order.id {
            return Err(SagaError::OrderMismatch {
                saga_id,
                order_id: order.id,
            });
        }
        if saga.status == SagaStatus::Failed {
            tracing::debug!(%saga_id, "saga already compensated");
            return Ok(());
        }
        if !saga.status.can_compensate() {
            return Err(SagaError::InvalidState {
                saga_id,
                actual: saga.status,
            });
        }

        tracing::warn!(%saga_id, order_id = %order.id, reason = %failure.reason, "starting saga compensation");
        saga.begin_compensation(&failure);
        // A resumed saga keeps the reason it first failed with.
        let reason = saga.failure_reason.clone().unwrap_or(failure.reason);
        self.sagas.save(saga).await?;

        for step in saga.steps_to_compensate() {
            match step {
                SagaStep::ProcessPayment if !saga.payment_processed => {
                    tracing::debug!(%saga_id, %step, "payment not processed, nothing to compensate");
                }
                SagaStep::ProcessPayment => {
                    if self.announce_compensation(&saga_id, step, order).await {
                        saga.mark_step_compensated(step);
                        self.sagas.save(saga).await?;
                    }
                }
                SagaStep::ReserveInventory => {
                    self.announce_compensation(&saga_id, step, order).await;
                    self.restock(saga).await?;
                    saga.mark_step_compensated(step);
                    self.sagas.save(saga).await?;
                }
            }
        }

        let order_failed = SagaEvent::OrderFailed(SagaOrderFailed {
            saga_id: saga_id.clone(),
            order_id: order.id,
            reason: reason.clone(),
            timestamp: Utc::now(),
        });
        if let Err(e) = self.publisher.publish(&order_failed).await {
            metrics::counter!("saga_compensation_publish_failures_total", "step" => "ORDER_FAILED")
                .increment(1);
            tracing::error!(%saga_id, error = %e, "failed to publish saga OrderFailed");
        }

        match self.orders.update_status(order.id, OrderStatus::Failed).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::Conflict => {
                tracing::warn!(%saga_id, order_id = %order.id, error = %e, "order could not be marked failed");
            }
            Err(e) => return Err(e.into()),
        }

        saga.status = SagaStatus::Failed;
        self.sagas.save(saga).await?;

        metrics::counter!("saga_failed").increment(1);
        tracing::warn!(%saga_id, order_id = %order.id, %reason, "saga failed");
        Ok(())
    }
}
