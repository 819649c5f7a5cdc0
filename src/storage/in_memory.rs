//! In-memory implementation of StoreGateway for testing and development

use crate::core::codec::{AttributeValue, Item, primary_key_of};
use crate::core::error::StoreError;
use crate::core::keys::{INDEX_PARTITION_KEY, INDEX_SORT_KEY, PrimaryKey};
use crate::core::store::{StoreGateway, WriteOp};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// In-memory single-table store
///
/// Every primitive runs under one write lock, which gives transactions the
/// same all-or-nothing behaviour the real store provides server-side.
#[derive(Clone, Default)]
pub struct InMemoryGateway {
    table: Arc<RwLock<HashMap<PrimaryKey, Item>>>,
}

impl InMemoryGateway {
    /// Create an empty in-memory table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored
    pub fn len(&self) -> usize {
        self.table.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("Failed to acquire table lock: {}", e))
}

fn key_of(item: &Item) -> Result<PrimaryKey, StoreError> {
    primary_key_of(item).map_err(|e| StoreError::Backend(e.to_string()))
}

fn read_counter(item: &Item, attribute: &str) -> Result<Option<i64>, StoreError> {
    match item.get(attribute) {
        None => Ok(None),
        Some(AttributeValue::N(n)) => n
            .parse::<i64>()
            .map(Some)
            .map_err(|_| StoreError::Backend(format!("{} is not an integer: {}", attribute, n))),
        Some(other) => Err(StoreError::Backend(format!(
            "{} is not numeric: {:?}",
            attribute, other
        ))),
    }
}

/// Target key of an operation
fn target_of(op: &WriteOp) -> Result<PrimaryKey, StoreError> {
    match op {
        WriteOp::Put { item, .. } => key_of(item),
        WriteOp::AddToSet { key, .. } | WriteOp::CompareAndSet { key, .. } => Ok(key.clone()),
    }
}

/// Whether `op`'s condition holds against `table`. An attribute of the wrong
/// type is an error rather than a failed condition.
fn condition_holds(
    table: &HashMap<PrimaryKey, Item>,
    key: &PrimaryKey,
    op: &WriteOp,
) -> Result<bool, StoreError> {
    Ok(match op {
        WriteOp::Put { if_absent, .. } => !*if_absent || !table.contains_key(key),
        WriteOp::AddToSet { attribute, .. } => match table.get(key) {
            Some(item) => match item.get(attribute) {
                None | Some(AttributeValue::Ss(_)) => true,
                Some(other) => {
                    return Err(StoreError::Backend(format!(
                        "{} is not a string set: {:?}",
                        attribute, other
                    )));
                }
            },
            None => false,
        },
        WriteOp::CompareAndSet {
            attribute,
            expected,
            ..
        } => match table.get(key) {
            Some(item) => read_counter(item, attribute)? == *expected,
            None => false,
        },
    })
}

/// Apply an operation whose condition has been checked
fn apply(table: &mut HashMap<PrimaryKey, Item>, key: PrimaryKey, op: WriteOp) {
    match op {
        WriteOp::Put { item, .. } => {
            table.insert(key, item);
        }
        WriteOp::AddToSet {
            attribute, values, ..
        } => {
            if let Some(item) = table.get_mut(&key) {
                let mut merged = match item.remove(&attribute) {
                    Some(AttributeValue::Ss(existing)) => existing,
                    _ => Vec::new(),
                };
                for value in values {
                    if !merged.contains(&value) {
                        merged.push(value);
                    }
                }
                item.insert(attribute, AttributeValue::Ss(merged));
            }
        }
        WriteOp::CompareAndSet {
            attribute, value, ..
        } => {
            if let Some(item) = table.get_mut(&key) {
                item.insert(attribute, AttributeValue::N(value.to_string()));
            }
        }
    }
}

#[async_trait]
impl StoreGateway for InMemoryGateway {
    async fn put_if_absent(&self, item: Item) -> Result<(), StoreError> {
        let key = key_of(&item)?;
        let mut table = self.table.write().map_err(lock_error)?;

        if table.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                key: key.to_string(),
            });
        }
        table.insert(key, item);

        Ok(())
    }

    async fn transact(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut keyed = Vec::with_capacity(ops.len());
        let mut seen = HashSet::new();
        for op in ops {
            let key = target_of(&op)?;
            if !seen.insert(key.clone()) {
                return Err(StoreError::Backend(format!(
                    "transaction touches '{}' more than once",
                    key
                )));
            }
            keyed.push((key, op));
        }

        let mut table = self.table.write().map_err(lock_error)?;

        let mut failed = Vec::new();
        for (index, (key, op)) in keyed.iter().enumerate() {
            if !condition_holds(&table, key, op)? {
                failed.push(index);
            }
        }
        if !failed.is_empty() {
            return Err(StoreError::TransactionConflict { failed });
        }

        for (key, op) in keyed {
            apply(&mut table, key, op);
        }

        Ok(())
    }

    async fn increment(
        &self,
        key: &PrimaryKey,
        attribute: &str,
        by: i64,
    ) -> Result<i64, StoreError> {
        let mut table = self.table.write().map_err(lock_error)?;

        let item = table
            .get_mut(key)
            .ok_or_else(|| StoreError::ConditionFailed { key: key.to_string() })?;
        let next = read_counter(item, attribute)?
            .unwrap_or(0)
            .checked_add(by)
            .ok_or_else(|| {
                StoreError::Backend(format!("{} on '{}' overflows by {}", attribute, key, by))
            })?;
        item.insert(attribute.to_string(), AttributeValue::N(next.to_string()));

        Ok(next)
    }

    async fn get(&self, key: &PrimaryKey) -> Result<Option<Item>, StoreError> {
        let table = self.table.read().map_err(lock_error)?;

        Ok(table.get(key).cloned())
    }

    async fn query_index(&self, partition: &str) -> Result<Vec<Item>, StoreError> {
        let table = self.table.read().map_err(lock_error)?;

        let mut items: Vec<Item> = table
            .values()
            .filter(|item| {
                item.get(INDEX_PARTITION_KEY).and_then(AttributeValue::as_s) == Some(partition)
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            let sort_key = |item: &Item| {
                item.get(INDEX_SORT_KEY)
                    .and_then(AttributeValue::as_s)
                    .map(str::to_string)
            };
            sort_key(a).cmp(&sort_key(b))
        });

        Ok(items)
    }
}
