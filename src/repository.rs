//! Entity repository: one create operation per billing entity
//!
//! Each create composes the key builder and record codec output into exactly
//! one atomic request to the [`StoreGateway`]. Uniqueness of emails and
//! invoice numbers is enforced with existence-only marker records written in
//! the same transaction as the entity, so no lock manager is involved.
//!
//! The repository never retries. Conflicts are surfaced to the caller as
//! [`BillingError`] kinds; choosing a new email or number is the caller's job.

use crate::config::{NumberingMode, StoreConfig};
use crate::core::codec::{self, AttributeValue, Item};
use crate::core::error::{BillingError, BillingResult, StoreError};
use crate::core::ids::SortableId;
use crate::core::keys::{self, EntityType, TYPE_ATTRIBUTE};
use crate::core::store::{StoreGateway, WriteOp};
use crate::core::value::{Document, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Set of client ids on an account record
pub const CLIENTS_ATTRIBUTE: &str = "Clients";

/// Invoice numbering counter on an account record
pub const LAST_INVOICE_NUMBER_ATTRIBUTE: &str = "LastInvoiceNumber";

/// What each operation of a transaction stands for, used to turn the
/// gateway's failed indices into a domain error
enum Role {
    Record { entity_type: EntityType, key: String },
    Email(String),
    InvoiceNumber { account_id: String, number: i64 },
    Parent { entity_type: EntityType, id: String },
    Counter,
}

fn translate(err: StoreError, roles: &[Role]) -> BillingError {
    let failed = match err {
        StoreError::TransactionConflict { failed } => failed,
        other => return other.into(),
    };
    let failed_roles: Vec<&Role> = failed.iter().filter_map(|&i| roles.get(i)).collect();

    // A moved counter also explains a collision on the number it produced
    if failed_roles.iter().any(|role| matches!(role, Role::Counter)) {
        return BillingError::TransactionConflict { failed };
    }
    for role in &failed_roles {
        match role {
            Role::Email(email) => {
                return BillingError::DuplicateEmail {
                    email: email.clone(),
                };
            }
            Role::InvoiceNumber { account_id, number } => {
                return BillingError::DuplicateInvoiceNumber {
                    account_id: account_id.clone(),
                    number: *number,
                };
            }
            _ => {}
        }
    }
    for role in &failed_roles {
        if let Role::Parent { entity_type, id } = role {
            return BillingError::NotFound {
                entity_type: entity_type.to_string(),
                id: id.clone(),
            };
        }
    }
    for role in &failed_roles {
        if let Role::Record { entity_type, key } = role {
            return BillingError::AlreadyExists {
                entity_type: entity_type.to_string(),
                key: key.clone(),
            };
        }
    }
    BillingError::TransactionConflict { failed }
}

/// Trimmed, non-empty text field
fn required_text(doc: &Document, entity_type: EntityType, field: &str) -> BillingResult<String> {
    match doc.get(field) {
        None | Some(Value::Null) => Err(BillingError::missing(entity_type.as_str(), field)),
        Some(Value::Text(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Text(_)) => Err(BillingError::invalid(
            entity_type.as_str(),
            field,
            "must not be empty",
        )),
        Some(other) => Err(BillingError::invalid(
            entity_type.as_str(),
            field,
            format!("expected text, got {}", other.type_name()),
        )),
    }
}

fn is_of_type(item: &Item, entity_type: EntityType) -> bool {
    item.get(TYPE_ATTRIBUTE).and_then(AttributeValue::as_s) == Some(entity_type.as_str())
}

/// Repository over a single billing table
#[derive(Clone)]
pub struct BillingRepository {
    gateway: Arc<dyn StoreGateway>,
    numbering: NumberingMode,
}

impl BillingRepository {
    pub fn new(gateway: Arc<dyn StoreGateway>) -> Self {
        Self {
            gateway,
            numbering: NumberingMode::default(),
        }
    }

    pub fn from_config(gateway: Arc<dyn StoreGateway>, config: &StoreConfig) -> Self {
        Self::new(gateway).with_numbering(config.numbering)
    }

    pub fn with_numbering(mut self, numbering: NumberingMode) -> Self {
        self.numbering = numbering;
        self
    }

    pub fn numbering(&self) -> NumberingMode {
        self.numbering
    }

    pub fn gateway(&self) -> &Arc<dyn StoreGateway> {
        &self.gateway
    }

    async fn submit(&self, ops: Vec<WriteOp>, roles: &[Role]) -> BillingResult<()> {
        tracing::debug!(
            operations = ?ops.iter().map(WriteOp::kind).collect::<Vec<_>>(),
            "Submitting transaction"
        );
        self.gateway.transact(ops).await.map_err(|e| {
            let err = translate(e, roles);
            if err.is_conflict() {
                tracing::warn!(code = err.error_code(), "Transaction rejected: {}", err);
            }
            err
        })
    }

    /// Create an account and claim its email
    ///
    /// `last_invoice_number` starts at 0 unless supplied.
    pub async fn create_account(&self, mut account: Document) -> BillingResult<SortableId> {
        let email = required_text(&account, EntityType::Account, "email")?;
        let account_id = SortableId::new();
        let id = account_id.to_string();

        account.insert("account_id".to_string(), Value::from(id.clone()));
        if account.get("last_invoice_number").is_none_or(Value::is_null) {
            account.insert("last_invoice_number".to_string(), Value::from(0i64));
        }

        let keys = keys::account(&id);
        let ops = vec![
            WriteOp::put_unique(codec::entity_item(&keys, &account)?),
            WriteOp::put_unique(codec::primary_key_item(&keys::account_email_marker(&email))),
        ];
        let roles = [
            Role::Record {
                entity_type: EntityType::Account,
                key: keys.primary.to_string(),
            },
            Role::Email(email),
        ];
        self.submit(ops, &roles).await?;

        tracing::info!(account_id = %account_id, "Account created");
        Ok(account_id)
    }

    /// Create a client under an account
    ///
    /// The client record, its account-scoped email marker and the addition of
    /// the client id to the account's `Clients` set commit together.
    pub async fn create_client(
        &self,
        account_id: &str,
        mut client: Document,
    ) -> BillingResult<SortableId> {
        let email = required_text(&client, EntityType::Client, "email")?;
        let client_id = SortableId::new();
        let id = client_id.to_string();

        client.insert("client_id".to_string(), Value::from(id.clone()));
        client.insert("account_id".to_string(), Value::from(account_id));

        let keys = keys::client(&id);
        let ops = vec![
            WriteOp::put_unique(codec::entity_item(&keys, &client)?),
            WriteOp::put_unique(codec::primary_key_item(&keys::client_email_marker(
                account_id, &email,
            ))),
            WriteOp::AddToSet {
                key: keys::account_key(account_id),
                attribute: CLIENTS_ATTRIBUTE.to_string(),
                values: BTreeSet::from([id.clone()]),
            },
        ];
        let roles = [
            Role::Record {
                entity_type: EntityType::Client,
                key: keys.primary.to_string(),
            },
            Role::Email(email),
            Role::Parent {
                entity_type: EntityType::Account,
                id: account_id.to_string(),
            },
        ];
        self.submit(ops, &roles).await?;

        tracing::info!(account_id, client_id = %client_id, "Client created");
        Ok(client_id)
    }

    /// Create an invoice for a client
    ///
    /// The identifier is seeded from `issued_on`, so invoices sort by issue
    /// date. Without an explicit `number`, one is drawn from the account's
    /// counter according to the configured [`NumberingMode`].
    pub async fn create_invoice(
        &self,
        account_id: &str,
        client_id: &str,
        mut invoice: Document,
    ) -> BillingResult<SortableId> {
        let entity = EntityType::Invoice.as_str();
        let issued_on = match invoice.get("issued_on") {
            None | Some(Value::Null) => return Err(BillingError::missing(entity, "issued_on")),
            Some(value) => value
                .as_timestamp()
                .ok_or_else(|| BillingError::invalid(entity, "issued_on", "expected a timestamp"))?,
        };
        let supplied = match invoice.get("number") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                value
                    .as_number()
                    .and_then(|n| n.as_i64())
                    .ok_or_else(|| BillingError::invalid(entity, "number", "expected an integer"))?,
            ),
        };

        let invoice_id = SortableId::from_datetime(issued_on)?;
        let id = invoice_id.to_string();

        let mut counter_op = None;
        let number = match (supplied, self.numbering) {
            (Some(number), _) => number,
            (None, NumberingMode::BestEffort) => self.next_invoice_number(account_id).await?,
            (None, NumberingMode::Strict) => {
                let current = self.current_invoice_number(account_id).await?;
                let next = current.unwrap_or(0).checked_add(1).ok_or_else(|| {
                    BillingError::invalid(
                        EntityType::Account.as_str(),
                        "last_invoice_number",
                        "counter is at its maximum",
                    )
                })?;
                counter_op = Some(WriteOp::CompareAndSet {
                    key: keys::account_key(account_id),
                    attribute: LAST_INVOICE_NUMBER_ATTRIBUTE.to_string(),
                    expected: current,
                    value: next,
                });
                next
            }
        };

        invoice.insert("number".to_string(), Value::from(number));
        invoice.insert("issued_on".to_string(), Value::Timestamp(issued_on));
        invoice.insert("invoice_id".to_string(), Value::from(id.clone()));
        invoice.insert("client_id".to_string(), Value::from(client_id));

        let keys = keys::invoice(client_id, &id);
        let mut ops = vec![
            WriteOp::put_unique(codec::entity_item(&keys, &invoice)?),
            WriteOp::put_unique(codec::primary_key_item(&keys::invoice_number_marker(
                account_id, number,
            ))),
        ];
        let mut roles = vec![
            Role::Record {
                entity_type: EntityType::Invoice,
                key: keys.primary.to_string(),
            },
            Role::InvoiceNumber {
                account_id: account_id.to_string(),
                number,
            },
        ];
        if let Some(op) = counter_op {
            ops.push(op);
            roles.push(Role::Counter);
        }

        if let Err(err) = self.submit(ops, &roles).await {
            if supplied.is_none() && self.numbering == NumberingMode::BestEffort {
                tracing::warn!(
                    account_id,
                    number,
                    "Invoice number consumed by a failed create, sequence has a gap"
                );
            }
            return Err(err);
        }

        tracing::info!(account_id, client_id, invoice_id = %invoice_id, number, "Invoice created");
        Ok(invoice_id)
    }

    /// Create a line item under an invoice with a single conditional put
    pub async fn create_line_item(
        &self,
        invoice_id: &str,
        mut line_item: Document,
    ) -> BillingResult<SortableId> {
        let line_item_id = SortableId::new();
        let id = line_item_id.to_string();

        line_item.insert("line_item_id".to_string(), Value::from(id.clone()));
        line_item.insert("invoice_id".to_string(), Value::from(invoice_id));

        let keys = keys::line_item(invoice_id, &id);
        let item = codec::entity_item(&keys, &line_item)?;
        self.gateway
            .put_if_absent(item)
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists { key } => BillingError::AlreadyExists {
                    entity_type: EntityType::LineItem.to_string(),
                    key,
                },
                other => other.into(),
            })?;

        tracing::info!(invoice_id, line_item_id = %line_item_id, "Line item created");
        Ok(line_item_id)
    }

    /// Atomically advance the account counter outside any transaction
    async fn next_invoice_number(&self, account_id: &str) -> BillingResult<i64> {
        self.gateway
            .increment(&keys::account_key(account_id), LAST_INVOICE_NUMBER_ATTRIBUTE, 1)
            .await
            .map_err(|e| match e {
                StoreError::ConditionFailed { .. } => BillingError::NotFound {
                    entity_type: EntityType::Account.to_string(),
                    id: account_id.to_string(),
                },
                other => other.into(),
            })
    }

    async fn current_invoice_number(&self, account_id: &str) -> BillingResult<Option<i64>> {
        let item = self
            .gateway
            .get(&keys::account_key(account_id))
            .await?
            .ok_or_else(|| BillingError::NotFound {
                entity_type: EntityType::Account.to_string(),
                id: account_id.to_string(),
            })?;

        match item.get(LAST_INVOICE_NUMBER_ATTRIBUTE) {
            None => Ok(None),
            Some(AttributeValue::N(n)) => n.parse::<i64>().map(Some).map_err(|_| {
                BillingError::invalid(
                    EntityType::Account.as_str(),
                    "last_invoice_number",
                    format!("not an integer: {}", n),
                )
            }),
            Some(_) => Err(BillingError::invalid(
                EntityType::Account.as_str(),
                "last_invoice_number",
                "not numeric",
            )),
        }
    }

    pub async fn get_account(&self, account_id: &str) -> BillingResult<Option<Document>> {
        self.get_record(&keys::account(account_id)).await
    }

    pub async fn get_client(&self, client_id: &str) -> BillingResult<Option<Document>> {
        self.get_record(&keys::client(client_id)).await
    }

    /// Look an invoice up by id alone, through the secondary index
    pub async fn get_invoice(&self, invoice_id: &str) -> BillingResult<Option<Document>> {
        let items = self
            .gateway
            .query_index(&keys::invoice_partition(invoice_id))
            .await?;

        items
            .iter()
            .find(|item| is_of_type(item, EntityType::Invoice))
            .map(codec::decode_fields)
            .transpose()
    }

    /// Line items of an invoice, in creation order
    pub async fn list_line_items(&self, invoice_id: &str) -> BillingResult<Vec<Document>> {
        let items = self
            .gateway
            .query_index(&keys::invoice_partition(invoice_id))
            .await?;

        items
            .iter()
            .filter(|item| is_of_type(item, EntityType::LineItem))
            .map(codec::decode_fields)
            .collect()
    }

    async fn get_record(&self, keys: &keys::EntityKeys) -> BillingResult<Option<Document>> {
        match self.gateway.get(&keys.primary).await? {
            Some(item) if is_of_type(&item, keys.entity_type) => {
                Ok(Some(codec::decode_fields(&item)?))
            }
            _ => Ok(None),
        }
    }
}
