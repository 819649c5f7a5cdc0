//! DynamoDB implementation of StoreGateway

use crate::config::StoreConfig;
use crate::core::codec::{AttributeValue, Item, primary_key_item};
use crate::core::error::StoreError;
use crate::core::keys::{INDEX_PARTITION_KEY, PARTITION_KEY, PrimaryKey};
use crate::core::store::{StoreGateway, WriteOp};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDBClient;
use aws_sdk_dynamodb::config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{
    self as ddb, Put, ReturnValue, TransactWriteItem, Update,
};
use std::collections::HashMap;

type DdbItem = HashMap<String, ddb::AttributeValue>;

const NOT_EXISTS: &str = "attribute_not_exists(PK)";
const EXISTS: &str = "attribute_exists(PK)";

fn to_sdk(value: &AttributeValue) -> ddb::AttributeValue {
    match value {
        AttributeValue::S(s) => ddb::AttributeValue::S(s.clone()),
        AttributeValue::N(n) => ddb::AttributeValue::N(n.clone()),
        AttributeValue::Null(b) => ddb::AttributeValue::Null(*b),
        AttributeValue::Bool(b) => ddb::AttributeValue::Bool(*b),
        AttributeValue::M(map) => {
            ddb::AttributeValue::M(map.iter().map(|(k, v)| (k.clone(), to_sdk(v))).collect())
        }
        AttributeValue::L(items) => ddb::AttributeValue::L(items.iter().map(to_sdk).collect()),
        AttributeValue::Ss(values) => ddb::AttributeValue::Ss(values.clone()),
    }
}

fn from_sdk(value: &ddb::AttributeValue) -> Result<AttributeValue, StoreError> {
    Ok(match value {
        ddb::AttributeValue::S(s) => AttributeValue::S(s.clone()),
        ddb::AttributeValue::N(n) => AttributeValue::N(n.clone()),
        ddb::AttributeValue::Null(b) => AttributeValue::Null(*b),
        ddb::AttributeValue::Bool(b) => AttributeValue::Bool(*b),
        ddb::AttributeValue::M(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), from_sdk(v)?)))
                .collect::<Result<_, StoreError>>()?,
        ),
        ddb::AttributeValue::L(items) => {
            AttributeValue::L(items.iter().map(from_sdk).collect::<Result<_, _>>()?)
        }
        ddb::AttributeValue::Ss(values) => AttributeValue::Ss(values.clone()),
        other => return Err(StoreError::UnsupportedType(format!("{:?}", other))),
    })
}

fn item_to_sdk(item: &Item) -> DdbItem {
    item.iter().map(|(k, v)| (k.clone(), to_sdk(v))).collect()
}

fn item_from_sdk(item: &DdbItem) -> Result<Item, StoreError> {
    item.iter()
        .map(|(k, v)| Ok((k.clone(), from_sdk(v)?)))
        .collect()
}

fn key_to_sdk(key: &PrimaryKey) -> DdbItem {
    item_to_sdk(&primary_key_item(key))
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// DynamoDB-backed gateway over one table
#[derive(Clone)]
pub struct DynamoDbGateway {
    client: DynamoDBClient,
    table_name: String,
    index_name: String,
}

impl DynamoDbGateway {
    pub fn new(client: DynamoDBClient, table_name: String, index_name: String) -> Self {
        Self {
            client,
            table_name,
            index_name,
        }
    }

    /// Build a client from the configuration. Credentials are taken from
    /// `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY` when set.
    pub fn connect(config: &StoreConfig) -> Self {
        let mut builder = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(
                config.region.clone().unwrap_or_else(|| "us-east-1".to_string()),
            ));
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if let (Ok(access_key), Ok(secret_key)) = (
            std::env::var("AWS_ACCESS_KEY_ID"),
            std::env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            builder = builder.credentials_provider(aws_sdk_dynamodb::config::Credentials::new(
                access_key,
                secret_key,
                std::env::var("AWS_SESSION_TOKEN").ok(),
                None,
                "environment",
            ));
        }

        Self::new(
            DynamoDBClient::from_conf(builder.build()),
            config.table_name.clone(),
            config.index_name.clone(),
        )
    }

    fn transact_item(&self, op: &WriteOp) -> Result<TransactWriteItem, StoreError> {
        let builder = TransactWriteItem::builder();
        Ok(match op {
            WriteOp::Put { item, if_absent } => {
                let mut put = Put::builder()
                    .table_name(&self.table_name)
                    .set_item(Some(item_to_sdk(item)));
                if *if_absent {
                    put = put.condition_expression(NOT_EXISTS);
                }
                builder.put(put.build().map_err(backend)?).build()
            }
            WriteOp::AddToSet {
                key,
                attribute,
                values,
            } => {
                let update = Update::builder()
                    .table_name(&self.table_name)
                    .set_key(Some(key_to_sdk(key)))
                    .update_expression("ADD #attr :values")
                    .condition_expression(EXISTS)
                    .expression_attribute_names("#attr", attribute)
                    .expression_attribute_values(
                        ":values",
                        ddb::AttributeValue::Ss(values.iter().cloned().collect()),
                    )
                    .build()
                    .map_err(backend)?;
                builder.update(update).build()
            }
            WriteOp::CompareAndSet {
                key,
                attribute,
                expected,
                value,
            } => {
                let mut update = Update::builder()
                    .table_name(&self.table_name)
                    .set_key(Some(key_to_sdk(key)))
                    .update_expression("SET #attr = :value")
                    .expression_attribute_names("#attr", attribute)
                    .expression_attribute_values(
                        ":value",
                        ddb::AttributeValue::N(value.to_string()),
                    );
                update = match expected {
                    Some(expected) => update
                        .condition_expression("attribute_exists(PK) AND #attr = :expected")
                        .expression_attribute_values(
                            ":expected",
                            ddb::AttributeValue::N(expected.to_string()),
                        ),
                    None => update.condition_expression(
                        "attribute_exists(PK) AND attribute_not_exists(#attr)",
                    ),
                };
                builder.update(update.build().map_err(backend)?).build()
            }
        })
    }
}

#[async_trait]
impl StoreGateway for DynamoDbGateway {
    async fn put_if_absent(&self, item: Item) -> Result<(), StoreError> {
        let key = item
            .get(PARTITION_KEY)
            .and_then(AttributeValue::as_s)
            .unwrap_or_default()
            .to_string();

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item_to_sdk(&item)))
            .condition_expression(NOT_EXISTS)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => match err.into_service_error() {
                PutItemError::ConditionalCheckFailedException(_) => {
                    Err(StoreError::AlreadyExists { key })
                }
                other => Err(backend(other)),
            },
        }
    }

    async fn transact(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let items = ops
            .iter()
            .map(|op| self.transact_item(op))
            .collect::<Result<Vec<_>, _>>()?;

        let result = self
            .client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => match err.into_service_error() {
                TransactWriteItemsError::TransactionCanceledException(cancelled) => {
                    let failed = cancelled
                        .cancellation_reasons()
                        .iter()
                        .enumerate()
                        .filter(|(_, reason)| reason.code() == Some("ConditionalCheckFailed"))
                        .map(|(index, _)| index)
                        .collect::<Vec<_>>();
                    if failed.is_empty() {
                        Err(backend(cancelled))
                    } else {
                        Err(StoreError::TransactionConflict { failed })
                    }
                }
                other => Err(backend(other)),
            },
        }
    }

    async fn increment(
        &self,
        key: &PrimaryKey,
        attribute: &str,
        by: i64,
    ) -> Result<i64, StoreError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_sdk(key)))
            .update_expression("SET #attr = if_not_exists(#attr, :zero) + :by")
            .condition_expression(EXISTS)
            .expression_attribute_names("#attr", attribute)
            .expression_attribute_values(":zero", ddb::AttributeValue::N("0".to_string()))
            .expression_attribute_values(":by", ddb::AttributeValue::N(by.to_string()))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                return match err.into_service_error() {
                    UpdateItemError::ConditionalCheckFailedException(_) => {
                        Err(StoreError::ConditionFailed {
                            key: key.to_string(),
                        })
                    }
                    other => Err(backend(other)),
                };
            }
        };

        output
            .attributes()
            .and_then(|attrs| attrs.get(attribute))
            .and_then(|value| value.as_n().ok())
            .and_then(|n| n.parse::<i64>().ok())
            .ok_or_else(|| {
                StoreError::Backend(format!("{} missing from update response", attribute))
            })
    }

    async fn get(&self, key: &PrimaryKey) -> Result<Option<Item>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_sdk(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| backend(e.into_service_error()))?;

        result.item().map(item_from_sdk).transpose()
    }

    async fn query_index(&self, partition: &str) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::new();
        let mut start_key = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(&self.index_name)
                .key_condition_expression("#pk = :pk")
                .expression_attribute_names("#pk", INDEX_PARTITION_KEY)
                .expression_attribute_values(":pk", ddb::AttributeValue::S(partition.to_string()))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| backend(e.into_service_error()))?;

            for item in result.items.unwrap_or_default() {
                items.push(item_from_sdk(&item)?);
            }

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }
}
