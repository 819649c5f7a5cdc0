//! Typed error handling for the billing store
//!
//! Two layers of errors exist:
//!
//! - [`StoreError`]: what a [`StoreGateway`](crate::core::store::StoreGateway)
//!   reports. It knows about keys and operation indices, nothing about
//!   accounts or invoices.
//! - [`BillingError`]: what the repository surfaces to callers. Store
//!   failures are translated into domain kinds (duplicate email, duplicate
//!   invoice number, missing parent) using the position of the failed
//!   operation inside the transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! match repo.create_account(account).await {
//!     Ok(id) => println!("created {}", id),
//!     Err(BillingError::DuplicateEmail { email }) => {
//!         println!("{} is already registered", email);
//!     }
//!     Err(e) => eprintln!("[{}] {}", e.error_code(), e),
//! }
//! ```

use std::fmt;

/// Errors reported by a store gateway
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// A conditional put found a record under the same primary key
    #[error("record '{key}' already exists")]
    AlreadyExists { key: String },

    /// A single-item update required an existing record that was absent
    #[error("condition failed for record '{key}'")]
    ConditionFailed { key: String },

    /// At least one operation of a transaction failed its condition.
    /// `failed` holds the indices of the offending operations.
    #[error("transaction cancelled, failed operations: {failed:?}")]
    TransactionConflict { failed: Vec<usize> },

    /// The backend returned an attribute type the codec cannot represent
    #[error("unsupported attribute type: {0}")]
    UnsupportedType(String),

    /// Transport or service failure from the backend
    #[error("store backend error: {0}")]
    Backend(String),
}

/// The main error type surfaced by the billing repository
#[derive(Debug, Clone, PartialEq)]
pub enum BillingError {
    /// The email is already claimed by another account or client
    DuplicateEmail { email: String },

    /// The invoice number is already used within the account
    DuplicateInvoiceNumber { account_id: String, number: i64 },

    /// A record with the same primary key already exists
    AlreadyExists { entity_type: String, key: String },

    /// A member of an atomic transaction failed its condition
    TransactionConflict { failed: Vec<usize> },

    /// The codec was given a value it cannot tag
    UnsupportedType { type_name: String },

    /// A referenced parent record does not exist
    NotFound { entity_type: String, id: String },

    /// A required field is absent from the domain object
    MissingField { entity_type: String, field: String },

    /// A field is present but has the wrong shape
    InvalidField {
        entity_type: String,
        field: String,
        message: String,
    },

    /// Backend failure that has no domain meaning
    Store(StoreError),
}

impl fmt::Display for BillingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillingError::DuplicateEmail { email } => {
                write!(f, "Email '{}' is already registered", email)
            }
            BillingError::DuplicateInvoiceNumber { account_id, number } => {
                write!(
                    f,
                    "Invoice number {} is already used in account '{}'",
                    number, account_id
                )
            }
            BillingError::AlreadyExists { entity_type, key } => {
                write!(f, "{} '{}' already exists", entity_type, key)
            }
            BillingError::TransactionConflict { failed } => {
                write!(f, "Transaction conflict on operations {:?}", failed)
            }
            BillingError::UnsupportedType { type_name } => {
                write!(f, "Unsupported value type: {}", type_name)
            }
            BillingError::NotFound { entity_type, id } => {
                write!(f, "{} with id '{}' not found", entity_type, id)
            }
            BillingError::MissingField { entity_type, field } => {
                write!(f, "Missing required field '{}' on {}", field, entity_type)
            }
            BillingError::InvalidField {
                entity_type,
                field,
                message,
            } => {
                write!(f, "Invalid field '{}' on {}: {}", field, entity_type, message)
            }
            BillingError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for BillingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BillingError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl BillingError {
    /// Stable code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            BillingError::DuplicateEmail { .. } => "DUPLICATE_EMAIL",
            BillingError::DuplicateInvoiceNumber { .. } => "DUPLICATE_INVOICE_NUMBER",
            BillingError::AlreadyExists { .. } => "ALREADY_EXISTS",
            BillingError::TransactionConflict { .. } => "TRANSACTION_CONFLICT",
            BillingError::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            BillingError::NotFound { .. } => "NOT_FOUND",
            BillingError::MissingField { .. } => "MISSING_FIELD",
            BillingError::InvalidField { .. } => "INVALID_FIELD",
            BillingError::Store(_) => "STORE_ERROR",
        }
    }

    /// Whether the failure is a uniqueness or condition conflict, as opposed
    /// to bad input or a backend outage
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BillingError::DuplicateEmail { .. }
                | BillingError::DuplicateInvoiceNumber { .. }
                | BillingError::AlreadyExists { .. }
                | BillingError::TransactionConflict { .. }
        )
    }

    pub(crate) fn missing(entity_type: &str, field: &str) -> Self {
        BillingError::MissingField {
            entity_type: entity_type.to_string(),
            field: field.to_string(),
        }
    }

    pub(crate) fn invalid(entity_type: &str, field: &str, message: impl Into<String>) -> Self {
        BillingError::InvalidField {
            entity_type: entity_type.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(type_name: impl Into<String>) -> Self {
        BillingError::UnsupportedType {
            type_name: type_name.into(),
        }
    }
}

impl From<StoreError> for BillingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TransactionConflict { failed } => {
                BillingError::TransactionConflict { failed }
            }
            StoreError::UnsupportedType(type_name) => BillingError::UnsupportedType { type_name },
            other => BillingError::Store(other),
        }
    }
}

/// Result alias used across the crate
pub type BillingResult<T> = std::result::Result<T, BillingError>;
