//! Store gateway: the transactional key-value primitives the repository needs

use crate::core::codec::Item;
use crate::core::error::StoreError;
use crate::core::keys::PrimaryKey;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// One member of an atomic transaction
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Write a whole record. With `if_absent`, the primary key must be free.
    Put { item: Item, if_absent: bool },

    /// Add strings to a set-valued attribute of an existing record
    AddToSet {
        key: PrimaryKey,
        attribute: String,
        values: BTreeSet<String>,
    },

    /// Set a numeric attribute of an existing record, provided it currently
    /// equals `expected` (`None` meaning the attribute is absent)
    CompareAndSet {
        key: PrimaryKey,
        attribute: String,
        expected: Option<i64>,
        value: i64,
    },
}

impl WriteOp {
    pub fn put_unique(item: Item) -> Self {
        WriteOp::Put {
            item,
            if_absent: true,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::Put { .. } => "put",
            WriteOp::AddToSet { .. } => "add_to_set",
            WriteOp::CompareAndSet { .. } => "compare_and_set",
        }
    }
}

/// Thin interface over the underlying store
///
/// Implementations provide server-side atomicity: a transaction either
/// applies every operation or none, and conditions are evaluated against
/// the state before any of its writes.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Write `item` only if no record has its primary key.
    /// Fails with [`StoreError::AlreadyExists`] otherwise.
    async fn put_if_absent(&self, item: Item) -> Result<(), StoreError>;

    /// Apply `ops` all-or-nothing. Fails with
    /// [`StoreError::TransactionConflict`] listing the indices of every
    /// operation whose condition was not met.
    async fn transact(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    /// Atomically add `by` to a numeric attribute of an existing record and
    /// return the new value. A missing attribute counts from zero; a missing
    /// record fails with [`StoreError::ConditionFailed`].
    async fn increment(&self, key: &PrimaryKey, attribute: &str, by: i64)
    -> Result<i64, StoreError>;

    /// Read a record by primary key
    async fn get(&self, key: &PrimaryKey) -> Result<Option<Item>, StoreError>;

    /// Records projected into the secondary index under `partition`, ordered
    /// by secondary sort key
    async fn query_index(&self, partition: &str) -> Result<Vec<Item>, StoreError>;
}
