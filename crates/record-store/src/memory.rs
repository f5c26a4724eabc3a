use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::{
    Condition, Item, RecordStoreError, Result,
    store::{RecordStore, UpdateExpression, check_condition},
};

type Slot = Arc<Mutex<Option<Item>>>;

/// In-memory record store implementation for testing and local runs.
///
/// Each key owns its own slot mutex: a conditional write locks only that
/// slot for the evaluate-and-apply step, so writes to one key serialize while
/// writes to different keys proceed in parallel.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<RwLock<HashMap<String, BTreeMap<String, Slot>>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryRecordStore {
    /// Creates a new empty in-memory record store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the number of items stored in a table.
    pub async fn item_count(&self, table: &str) -> usize {
        let slots: Vec<Slot> = match self.tables.read().await.get(table) {
            Some(rows) => rows.values().cloned().collect(),
            None => return 0,
        };
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    async fn existing_slot(&self, table: &str, key: &str) -> Option<Slot> {
        self.tables
            .read()
            .await
            .get(table)
            .and_then(|rows| rows.get(key))
            .cloned()
    }

    async fn slot(&self, table: &str, key: &str) -> Slot {
        if let Some(slot) = self.existing_slot(table, key).await {
            return slot;
        }
        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Removes `slot` from its table if it holds no item and no other
    /// operation has a handle to it.
    async fn discard_if_empty(&self, table: &str, key: &str, slot: Slot) {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return;
        };
        if !rows.get(key).is_some_and(|stored| Arc::ptr_eq(stored, &slot)) {
            return;
        }
        // One handle in the map, one here.
        if Arc::strong_count(&slot) > 2 {
            return;
        }
        let empty = slot.try_lock().map(|item| item.is_none()).unwrap_or(false);
        if empty {
            rows.remove(key);
            if rows.is_empty() {
                tables.remove(table);
            }
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, table: &str, key: &str) -> Result<Option<Item>> {
        self.check_available()?;
        match self.existing_slot(table, key).await {
            Some(slot) => Ok(slot.lock().await.clone()),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        table: &str,
        key: &str,
        item: Item,
        condition: Option<Condition>,
    ) -> Result<()> {
        self.check_available()?;
        let slot = self.slot(table, key).await;
        let result = {
            let mut current = slot.lock().await;
            check_condition(table, key, &current, condition.as_ref()).map(|()| {
                *current = Some(item);
            })
        };
        if result.is_err() {
            self.discard_if_empty(table, key, slot).await;
        }
        result
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        update: UpdateExpression,
        condition: Option<Condition>,
    ) -> Result<Item> {
        self.check_available()?;
        let slot = self.slot(table, key).await;
        let result = {
            let mut current = slot.lock().await;
            check_condition(table, key, &current, condition.as_ref()).and_then(|()| {
                let mut next = current.clone().unwrap_or_default();
                update.apply(table, key, &mut next)?;
                *current = Some(next.clone());
                Ok(next)
            })
        };
        if result.is_err() {
            self.discard_if_empty(table, key, slot).await;
        }
        result
    }

    async fn scan(&self, table: &str) -> Result<Vec<Item>> {
        self.check_available()?;
        let slots: Vec<Slot> = match self.tables.read().await.get(table) {
            Some(rows) => rows.values().cloned().collect(),
            None => return Ok(Vec::new()),
        };

        let mut items = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(item) = slot.lock().await.clone() {
                items.push(item);
            }
        }
        Ok(items)
    }
}
