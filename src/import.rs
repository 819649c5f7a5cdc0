//! YAML import glue: a caller that feeds parsed domain objects to the
//! repository
//!
//! ```yaml
//! account_id: 0190f3a2-...
//! client_id: 0190f3a4-...
//! invoice:
//!   issued_on: 2021-03-01
//!   currency: eur
//! line_items:
//!   - description: Design
//!     rate: {cost: 100, unit: hour}
//!     quantity: 3
//! ```

use crate::core::ids::SortableId;
use crate::core::value::{Document, Value};
use crate::repository::BillingRepository;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// An invoice and its line items for an existing account and client
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceBundle {
    pub account_id: String,
    pub client_id: String,
    pub invoice: serde_yaml::Value,
    #[serde(default)]
    pub line_items: Vec<serde_yaml::Value>,
}

impl InvoiceBundle {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read invoice file '{}'", path))?;
        Self::from_yaml_str(&content)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedInvoice {
    pub invoice_id: SortableId,
    pub line_item_ids: Vec<SortableId>,
}

/// Create the invoice, then its line items in file order
///
/// Every document is converted before anything is written, so a malformed
/// bundle leaves the store untouched.
pub async fn import_invoice(
    repo: &BillingRepository,
    bundle: InvoiceBundle,
) -> Result<ImportedInvoice> {
    let invoice = Value::document_from_yaml(bundle.invoice).context("Invalid invoice")?;
    let line_items = bundle
        .line_items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            Value::document_from_yaml(item).with_context(|| format!("Invalid line item #{}", i + 1))
        })
        .collect::<Result<Vec<Document>>>()?;

    let invoice_id = repo
        .create_invoice(&bundle.account_id, &bundle.client_id, invoice)
        .await?;

    let invoice_key = invoice_id.to_string();
    let mut line_item_ids = Vec::with_capacity(line_items.len());
    for line_item in line_items {
        line_item_ids.push(repo.create_line_item(&invoice_key, line_item).await?);
    }

    tracing::info!(
        invoice_id = %invoice_id,
        line_items = line_item_ids.len(),
        "Invoice imported"
    );
    Ok(ImportedInvoice {
        invoice_id,
        line_item_ids,
    })
}

/// An account and its clients, keyed by a caller-chosen handle
#[derive(Debug, Clone, Deserialize)]
pub struct AccountBundle {
    pub account: serde_yaml::Value,
    #[serde(default)]
    pub clients: BTreeMap<String, serde_yaml::Value>,
}

impl AccountBundle {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedAccount {
    pub account_id: SortableId,
    pub clients: BTreeMap<String, SortableId>,
}

/// Create the account, then each client in handle order
///
/// Clients are created one at a time: each one updates the account record,
/// and concurrent transactions on one record conflict.
pub async fn import_account(
    repo: &BillingRepository,
    bundle: AccountBundle,
) -> Result<ImportedAccount> {
    let account = Value::document_from_yaml(bundle.account).context("Invalid account")?;
    let clients = bundle
        .clients
        .into_iter()
        .map(|(handle, client)| {
            let doc = Value::document_from_yaml(client)
                .with_context(|| format!("Invalid client '{}'", handle))?;
            Ok((handle, doc))
        })
        .collect::<Result<Vec<(String, Document)>>>()?;

    let account_id = repo.create_account(account).await?;
    let account_key = account_id.to_string();

    let mut created = BTreeMap::new();
    for (handle, client) in clients {
        let client_id = repo
            .create_client(&account_key, client)
            .await
            .with_context(|| format!("Failed to create client '{}'", handle))?;
        tracing::debug!(handle = %handle, client_id = %client_id, "Client imported");
        created.insert(handle, client_id);
    }

    Ok(ImportedAccount {
        account_id,
        clients: created,
    })
}
