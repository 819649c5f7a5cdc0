//! Composite key scheme for the single billing table
//!
//! Every record lives in one table. The partition/sort pair encodes the
//! entity hierarchy, and an optional secondary pair (`GSI1PK`/`GSI1SK`)
//! projects records onto an alternate access path. All builders here are
//! pure functions of their inputs.
//!
//! | Record | PK | SK |
//! |---|---|---|
//! | Account | `ACCOUNT#{account}` | same |
//! | Client | `CLIENT#{client}` | same |
//! | Invoice | `CLIENT#{client}` | `#INVOICE#{invoice}` |
//! | Line item | `INVOICE#{invoice}#LINEITEM#{item}` | same |
//! | Account email marker | `ACCOUNTEMAIL#{email}` | same |
//! | Client email marker | `ACCOUNT#{account}#CLIENTEMAIL#{email}` | same |
//! | Invoice number marker | `ACCOUNT#{account}#INVOICENUMBER#{number}` | same |

use std::fmt;

pub const PARTITION_KEY: &str = "PK";
pub const SORT_KEY: &str = "SK";
pub const INDEX_PARTITION_KEY: &str = "GSI1PK";
pub const INDEX_SORT_KEY: &str = "GSI1SK";
pub const TYPE_ATTRIBUTE: &str = "Type";

/// Attributes owned by the key scheme rather than by the entity body
pub const RESERVED_ATTRIBUTES: [&str; 5] = [
    PARTITION_KEY,
    SORT_KEY,
    INDEX_PARTITION_KEY,
    INDEX_SORT_KEY,
    TYPE_ATTRIBUTE,
];

/// Discriminator stored in the `Type` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Account,
    Client,
    Invoice,
    LineItem,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Account => "Account",
            EntityType::Client => "Client",
            EntityType::Invoice => "Invoice",
            EntityType::LineItem => "LineItem",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition/sort pair identifying one record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimaryKey {
    pub partition: String,
    pub sort: String,
}

impl PrimaryKey {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }

    /// Key whose partition and sort halves are equal
    pub fn single(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            partition: value.clone(),
            sort: value,
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.partition == self.sort {
            f.write_str(&self.partition)
        } else {
            write!(f, "{}|{}", self.partition, self.sort)
        }
    }
}

/// Secondary-index projection stored alongside a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub partition: String,
    pub sort: String,
}

/// Full key set for an entity record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKeys {
    pub entity_type: EntityType,
    pub primary: PrimaryKey,
    pub index: Option<IndexKey>,
}

pub fn account(account_id: &str) -> EntityKeys {
    EntityKeys {
        entity_type: EntityType::Account,
        primary: account_key(account_id),
        index: None,
    }
}

/// Primary key of an account, also the target of counter and set updates
pub fn account_key(account_id: &str) -> PrimaryKey {
    PrimaryKey::single(format!("ACCOUNT#{}", account_id))
}

pub fn account_email_marker(email: &str) -> PrimaryKey {
    PrimaryKey::single(format!("ACCOUNTEMAIL#{}", email))
}

pub fn client(client_id: &str) -> EntityKeys {
    EntityKeys {
        entity_type: EntityType::Client,
        primary: PrimaryKey::single(format!("CLIENT#{}", client_id)),
        index: None,
    }
}

pub fn client_email_marker(account_id: &str, email: &str) -> PrimaryKey {
    PrimaryKey::single(format!("ACCOUNT#{}#CLIENTEMAIL#{}", account_id, email))
}

/// Invoice keys. The leading `#` on the sort key keeps invoices apart from
/// other records in the client partition.
pub fn invoice(client_id: &str, invoice_id: &str) -> EntityKeys {
    let by_id = invoice_partition(invoice_id);
    EntityKeys {
        entity_type: EntityType::Invoice,
        primary: PrimaryKey::new(
            format!("CLIENT#{}", client_id),
            format!("#INVOICE#{}", invoice_id),
        ),
        index: Some(IndexKey {
            partition: by_id.clone(),
            sort: by_id,
        }),
    }
}

pub fn invoice_number_marker(account_id: &str, number: i64) -> PrimaryKey {
    PrimaryKey::single(format!("ACCOUNT#{}#INVOICENUMBER#{}", account_id, number))
}

/// Secondary-index partition holding an invoice and its line items
pub fn invoice_partition(invoice_id: &str) -> String {
    format!("INVOICE#{}", invoice_id)
}

pub fn line_item(invoice_id: &str, line_item_id: &str) -> EntityKeys {
    EntityKeys {
        entity_type: EntityType::LineItem,
        primary: PrimaryKey::single(format!(
            "INVOICE#{}#LINEITEM#{}",
            invoice_id, line_item_id
        )),
        index: Some(IndexKey {
            partition: invoice_partition(invoice_id),
            sort: format!("LINEITEM#{}", line_item_id),
        }),
    }
}
