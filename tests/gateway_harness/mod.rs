//! Shared test harness for store gateway testing
//!
//! Provides item builders for markers, typed records and counters, plus the
//! `gateway_contract_tests!` macro that validates any `StoreGateway`
//! implementation.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod gateway_harness;
//! use gateway_harness::*;
//! ```

#![allow(dead_code)]

#[macro_use]
mod gateway_contract_tests;

use billing::core::codec::{AttributeValue, Item, primary_key_item};
use billing::core::keys::PrimaryKey;
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Item builders
// ---------------------------------------------------------------------------

/// Existence-only record whose PK and SK are both `name`
pub fn marker(name: &str) -> Item {
    primary_key_item(&PrimaryKey::single(name))
}

/// Record carrying a type, a body attribute and an optional index projection
pub fn record(key: &PrimaryKey, type_name: &str, index: Option<(&str, &str)>) -> Item {
    let mut item = primary_key_item(key);
    item.insert("Type".to_string(), AttributeValue::S(type_name.to_string()));
    item.insert("Body".to_string(), AttributeValue::S(format!("body of {}", key)));
    if let Some((partition, sort)) = index {
        item.insert("GSI1PK".to_string(), AttributeValue::S(partition.to_string()));
        item.insert("GSI1SK".to_string(), AttributeValue::S(sort.to_string()));
    }
    item
}

/// Account-like record with a numeric counter attribute
pub fn counter_record(key: &PrimaryKey, attribute: &str, value: i64) -> Item {
    let mut item = primary_key_item(key);
    item.insert(attribute.to_string(), AttributeValue::N(value.to_string()));
    item
}

pub fn string_set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Assertions
// ---------------------------------------------------------------------------

pub fn assert_text(item: &Item, attribute: &str, expected: &str) {
    match item.get(attribute) {
        Some(AttributeValue::S(s)) => assert_eq!(s, expected),
        other => panic!("Expected S({}) for {}, got {:?}", expected, attribute, other),
    }
}

pub fn assert_counter(item: &Item, attribute: &str, expected: i64) {
    match item.get(attribute) {
        Some(AttributeValue::N(n)) => assert_eq!(n.parse::<i64>().unwrap(), expected),
        other => panic!("Expected N({}) for {}, got {:?}", expected, attribute, other),
    }
}

pub fn set_members(item: &Item, attribute: &str) -> BTreeSet<String> {
    match item.get(attribute) {
        Some(AttributeValue::Ss(values)) => values.iter().cloned().collect(),
        None => BTreeSet::new(),
        other => panic!("Expected SS for {}, got {:?}", attribute, other),
    }
}
