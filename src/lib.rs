//! # Billing Store
//!
//! Data-access layer for billing records (accounts, clients, invoices, line
//! items) kept in a single wide-column table.
//!
//! ## Features
//!
//! - **Composite Keys**: one table, hierarchy encoded in partition/sort keys
//! - **Secondary Index Projections**: invoices and line items reachable by invoice id
//! - **Record Codec**: typed values to tagged attributes, `snake_case` to `CapitalizedKeys`
//! - **Uniqueness Markers**: emails and invoice numbers claimed atomically with the record
//! - **Invoice Numbering**: best-effort counter or strict in-transaction compare-and-set
//! - **Time-Sortable Ids**: UUIDv7, optionally seeded from a business timestamp
//! - **Pluggable Stores**: in-memory gateway for tests, DynamoDB behind a feature flag
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use billing::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let repo = BillingRepository::new(Arc::new(InMemoryGateway::new()));
//!
//! let account_id = repo
//!     .create_account(Value::document_from_json(json!({"email": "me@x.com"}))?)
//!     .await?;
//! let client_id = repo
//!     .create_client(
//!         &account_id.to_string(),
//!         Value::document_from_json(json!({"email": "client@y.com"}))?,
//!     )
//!     .await?;
//! ```

pub mod config;
pub mod core;
pub mod import;
pub mod logging;
pub mod repository;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        codec::{AttributeValue, Item},
        error::{BillingError, BillingResult, StoreError},
        ids::SortableId,
        keys::{EntityKeys, EntityType, PrimaryKey},
        store::{StoreGateway, WriteOp},
        value::{Document, Number, Value},
    };

    // === Repository ===
    pub use crate::repository::BillingRepository;

    // === Storage ===
    #[cfg(feature = "dynamodb")]
    pub use crate::storage::DynamoDbGateway;
    #[cfg(feature = "in-memory")]
    pub use crate::storage::InMemoryGateway;

    // === Config ===
    pub use crate::config::{NumberingMode, StoreConfig};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
}
