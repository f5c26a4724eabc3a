use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{DomainEvent, EventBus, EventBusError, Result};

#[derive(Debug, Default)]
struct InMemoryBusState {
    published: Vec<DomainEvent>,
    unreachable: bool,
    failing_types: HashSet<String>,
    failed_attempts: usize,
}

/// In-memory event bus for testing and local runs.
///
/// Records every acknowledged event in publication order. Failures can be
/// injected for the whole bus or per detail type, and failed attempts are
/// counted so tests can wait for a detached publish to settle.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventBus {
    state: Arc<Mutex<InMemoryBusState>>,
    notify: Arc<Notify>,
}

impl InMemoryEventBus {
    /// Creates a new empty in-memory event bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryBusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every publish fail with `Unreachable` until reset.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Rejects every event of the given detail type.
    pub fn fail_on(&self, detail_type: impl Into<String>) {
        self.state().failing_types.insert(detail_type.into());
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.unreachable = false;
        state.failing_types.clear();
    }

    /// Returns every acknowledged event in publication order.
    pub fn published(&self) -> Vec<DomainEvent> {
        self.state().published.clone()
    }

    /// Returns the acknowledged events of one detail type.
    pub fn published_of(&self, detail_type: &str) -> Vec<DomainEvent> {
        self.state()
            .published
            .iter()
            .filter(|e| e.detail_type == detail_type)
            .cloned()
            .collect()
    }

    /// Returns the detail types of all acknowledged events in order.
    pub fn detail_types(&self) -> Vec<String> {
        self.state()
            .published
            .iter()
            .map(|e| e.detail_type.clone())
            .collect()
    }

    /// Returns the number of publish attempts that failed.
    pub fn failed_attempts(&self) -> usize {
        self.state().failed_attempts
    }

    /// Waits until an event of the given detail type has been acknowledged.
    ///
    /// Returns the first such event, or `None` if none arrived in time.
    pub async fn wait_for_event(
        &self,
        detail_type: &str,
        timeout: Duration,
    ) -> Option<DomainEvent> {
        let found = self
            .wait_until(timeout, |state| {
                state.published.iter().any(|e| e.detail_type == detail_type)
            })
            .await;
        if !found {
            return None;
        }
        self.published_of(detail_type).into_iter().next()
    }

    /// Waits until at least `count` publish attempts have failed.
    pub async fn wait_for_failures(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| state.failed_attempts >= count)
            .await
    }

    async fn wait_until<F>(&self, timeout: Duration, predicate: F) -> bool
    where
        F: Fn(&InMemoryBusState) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if predicate(&self.state()) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return predicate(&self.state());
            }
        }
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        let result = {
            let mut state = self.state();
            if state.unreachable {
                state.failed_attempts += 1;
                Err(EventBusError::Unreachable(
                    "in-memory bus marked unreachable".to_string(),
                ))
            } else if state.failing_types.contains(&event.detail_type) {
                state.failed_attempts += 1;
                Err(EventBusError::Rejected {
                    detail_type: event.detail_type.clone(),
                    reason: "injected failure".to_string(),
                })
            } else {
                state.published.push(event);
                Ok(())
            }
        };
        self.notify.notify_waiters();
        result
    }
}
