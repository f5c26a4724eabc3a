//! Saga record store with optimistic versioning.

use chrono::Utc;
use common::SagaId;
use record_store::{Condition, RecordStore, RecordStoreExt};

use crate::error::{Result, SagaError};
use crate::instance::SagaInstance;

/// Record store table holding saga instances, keyed by saga ID.
pub const TABLE: &str = "sagas";

/// Loads and saves saga instances.
///
/// Every save is conditional on the version the caller loaded, so two
/// coordinators driving the same saga cannot overwrite each other.
#[derive(Debug, Clone)]
pub struct SagaRepository<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> SagaRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Persists a new saga. Fails with `AlreadyStarted` if one exists.
    #[tracing::instrument(skip(self, saga), fields(saga_id = %saga.saga_id))]
    pub async fn create(&self, saga: &SagaInstance) -> Result<()> {
        match self
            .store
            .put_record(
                TABLE,
                saga.saga_id.as_str(),
                saga,
                Some(Condition::attribute_not_exists("sagaId")),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_conditional_check_failed() => {
                Err(SagaError::AlreadyStarted(saga.saga_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Saves the saga if nobody else saved it since it was loaded.
    ///
    /// On success the in-memory instance carries the new version and
    /// `updatedAt`.
    pub async fn save(&self, saga: &mut SagaInstance) -> Result<()> {
        let mut next = saga.clone();
        next.version = saga.version + 1;
        next.updated_at = Utc::now();

        match self
            .store
            .put_record(
                TABLE,
                saga.saga_id.as_str(),
                &next,
                Some(Condition::equals("version", saga.version)),
            )
            .await
        {
            Ok(()) => {
                *saga = next;
                Ok(())
            }
            Err(e) if e.is_conditional_check_failed() => {
                Err(SagaError::ConcurrentModification(saga.saga_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, saga_id: &SagaId) -> Result<Option<SagaInstance>> {
        Ok(self.store.get_record(TABLE, saga_id.as_str()).await?)
    }

    /// Lists every saga, ordered by saga ID.
    pub async fn list(&self) -> Result<Vec<SagaInstance>> {
        Ok(self.store.scan_records(TABLE).await?)
    }
}
