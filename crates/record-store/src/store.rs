use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{RecordStoreError, Result};

/// A stored record: a JSON object of named attributes.
pub type Item = serde_json::Map<String, Value>;

/// A predicate evaluated against the stored item at write time.
///
/// The write only commits if the condition holds. A missing item is treated
/// as an item with no attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The item exists and carries the attribute.
    AttributeExists(String),
    /// The item is absent or lacks the attribute.
    AttributeNotExists(String),
    /// The attribute is an integer greater than or equal to `value`.
    AtLeast { attribute: String, value: i64 },
    /// The attribute equals `value`.
    Equals { attribute: String, value: Value },
    /// Every nested condition holds.
    All(Vec<Condition>),
}

impl Condition {
    pub fn attribute_exists(attribute: impl Into<String>) -> Self {
        Condition::AttributeExists(attribute.into())
    }

    pub fn attribute_not_exists(attribute: impl Into<String>) -> Self {
        Condition::AttributeNotExists(attribute.into())
    }

    pub fn at_least(attribute: impl Into<String>, value: i64) -> Self {
        Condition::AtLeast {
            attribute: attribute.into(),
            value,
        }
    }

    pub fn equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Combines two conditions, flattening nested conjunctions.
    pub fn and(self, other: Condition) -> Self {
        let mut all = match self {
            Condition::All(conditions) => conditions,
            single => vec![single],
        };
        match other {
            Condition::All(conditions) => all.extend(conditions),
            single => all.push(single),
        }
        Condition::All(all)
    }

    /// Evaluates the condition against the current item.
    pub fn evaluate(&self, item: Option<&Item>) -> bool {
        let attr = |name: &str| item.and_then(|i| i.get(name));
        match self {
            Condition::AttributeExists(name) => attr(name).is_some(),
            Condition::AttributeNotExists(name) => attr(name).is_none(),
            Condition::AtLeast { attribute, value } => attr(attribute)
                .and_then(Value::as_i64)
                .is_some_and(|current| current >= *value),
            Condition::Equals { attribute, value } => attr(attribute) == Some(value),
            Condition::All(conditions) => conditions.iter().all(|c| c.evaluate(item)),
        }
    }
}

/// A single mutation within an [`UpdateExpression`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// Adds `delta` to an integer attribute (a missing attribute counts as 0).
    Add { attribute: String, delta: i64 },
    /// Overwrites an attribute.
    Set { attribute: String, value: Value },
}

/// An ordered list of attribute mutations applied atomically to one item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpression {
    actions: Vec<UpdateAction>,
}

impl UpdateExpression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, attribute: impl Into<String>, delta: i64) -> Self {
        self.actions.push(UpdateAction::Add {
            attribute: attribute.into(),
            delta,
        });
        self
    }

    pub fn set(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.actions.push(UpdateAction::Set {
            attribute: attribute.into(),
            value: value.into(),
        });
        self
    }

    pub fn actions(&self) -> &[UpdateAction] {
        &self.actions
    }

    /// Applies every action to `item` in order.
    ///
    /// On error the item may be partially modified; callers apply to a copy
    /// and only store it on success.
    pub fn apply(&self, table: &str, key: &str, item: &mut Item) -> Result<()> {
        for action in &self.actions {
            match action {
                UpdateAction::Add { attribute, delta } => {
                    let current = match item.get(attribute) {
                        None => 0,
                        Some(value) => value.as_i64().ok_or_else(|| {
                            RecordStoreError::InvalidUpdate {
                                table: table.to_string(),
                                key: key.to_string(),
                                reason: format!("attribute '{attribute}' is not an integer"),
                            }
                        })?,
                    };
                    let next =
                        current
                            .checked_add(*delta)
                            .ok_or_else(|| RecordStoreError::InvalidUpdate {
                                table: table.to_string(),
                                key: key.to_string(),
                                reason: format!("attribute '{attribute}' would overflow"),
                            })?;
                    item.insert(attribute.clone(), Value::from(next));
                }
                UpdateAction::Set { attribute, value } => {
                    item.insert(attribute.clone(), value.clone());
                }
            }
        }
        Ok(())
    }
}

/// Core trait for record store implementations.
///
/// Writes are atomic per key: the condition is evaluated and the mutation
/// applied without any window in which a concurrent write to the same key can
/// interleave. Writes to different keys do not contend.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Reads an item. Returns None if the key is absent.
    async fn get(&self, table: &str, key: &str) -> Result<Option<Item>>;

    /// Writes a whole item, replacing any existing one, if `condition` holds.
    async fn put(
        &self,
        table: &str,
        key: &str,
        item: Item,
        condition: Option<Condition>,
    ) -> Result<()>;

    /// Applies `update` to the stored item if `condition` holds and returns
    /// the item as written.
    ///
    /// An absent item is treated as empty, so callers that must not create
    /// records guard with [`Condition::AttributeExists`].
    async fn update(
        &self,
        table: &str,
        key: &str,
        update: UpdateExpression,
        condition: Option<Condition>,
    ) -> Result<Item>;

    /// Lists every item in a table, ordered by key.
    async fn scan(&self, table: &str) -> Result<Vec<Item>>;
}

/// Fails with `ConditionalCheckFailed` carrying the current item if the
/// condition does not hold.
pub(crate) fn check_condition(
    table: &str,
    key: &str,
    current: &Option<Item>,
    condition: Option<&Condition>,
) -> Result<()> {
    match condition {
        Some(condition) if !condition.evaluate(current.as_ref()) => {
            Err(RecordStoreError::ConditionalCheckFailed {
                table: table.to_string(),
                key: key.to_string(),
                current: current.clone(),
            })
        }
        _ => Ok(()),
    }
}

/// Converts a serializable record into a store item.
pub fn to_item<T: Serialize>(record: &T) -> Result<Item> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(RecordStoreError::Serialization(
            <serde_json::Error as serde::ser::Error>::custom(format!(
                "record must serialize to an object, got {other}"
            )),
        )),
    }
}

/// Converts a store item back into a typed record.
pub fn from_item<T: DeserializeOwned>(item: Item) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(item))?)
}

/// Extension trait providing typed convenience methods for record stores.
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    /// Reads and deserializes an item.
    async fn get_record<T: DeserializeOwned + Send>(
        &self,
        table: &str,
        key: &str,
    ) -> Result<Option<T>> {
        self.get(table, key).await?.map(from_item).transpose()
    }

    /// Serializes and writes an item.
    async fn put_record<T: Serialize + Sync>(
        &self,
        table: &str,
        key: &str,
        record: &T,
        condition: Option<Condition>,
    ) -> Result<()> {
        let item = to_item(record)?;
        self.put(table, key, item, condition).await
    }

    /// Scans a table and deserializes every item.
    async fn scan_records<T: DeserializeOwned + Send>(&self, table: &str) -> Result<Vec<T>> {
        self.scan(table)
            .await?
            .into_iter()
            .map(from_item)
            .collect()
    }
}

// Blanket implementation for all RecordStore implementations
impl<T: RecordStore + ?Sized> RecordStoreExt for T {}
