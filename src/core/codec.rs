//! Record codec: typed values to tagged store attributes and back
//!
//! Field names are rewritten from `snake_case` to `CapitalizedWords` before
//! tagging, at every nesting depth. Key attributes built by
//! [`keys`](crate::core::keys) are already in final form and are never
//! rewritten.

use crate::core::error::{BillingError, BillingResult};
use crate::core::keys::{
    EntityKeys, INDEX_PARTITION_KEY, INDEX_SORT_KEY, PARTITION_KEY, PrimaryKey,
    RESERVED_ATTRIBUTES, SORT_KEY, TYPE_ATTRIBUTE,
};
use crate::core::value::{Document, Number, Value};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One stored record
pub type Item = HashMap<String, AttributeValue>;

/// Tagged wire form, serialised in the store's JSON shape (`{"S": "..."}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "M")]
    M(HashMap<String, AttributeValue>),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
}

impl AttributeValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            AttributeValue::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_ss(&self) -> Option<&[String]> {
        match self {
            AttributeValue::Ss(values) => Some(values),
            _ => None,
        }
    }
}

/// `line_item_id` -> `LineItemId`. Already capitalized names pass through.
pub fn to_capitalized(name: &str) -> String {
    name.split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `LineItemId` -> `line_item_id`, `AddressLine1` -> `address_line_1`
pub fn to_underscored(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for c in name.chars() {
        let boundary = match prev {
            None => false,
            Some(p) => c.is_uppercase() || (c.is_ascii_digit() && p.is_alphabetic()),
        };
        if boundary {
            out.push('_');
        }
        out.extend(c.to_lowercase());
        prev = Some(c);
    }
    out
}

/// Rewrite every mapping key with `convert`, through maps and lists
pub fn rekey(value: &Value, convert: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (convert(k), rekey(v, convert)))
                .collect(),
        ),
        Value::List(items) => Value::List(items.iter().map(|v| rekey(v, convert)).collect()),
        other => other.clone(),
    }
}

/// Tag a single value
pub fn encode_value(value: &Value) -> BillingResult<AttributeValue> {
    Ok(match value {
        Value::Text(s) => AttributeValue::S(s.trim().to_string()),
        Value::Number(n) => AttributeValue::N(n.to_decimal()?),
        Value::Null => AttributeValue::Null(true),
        Value::Map(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), encode_value(v)?)))
                .collect::<BillingResult<_>>()?,
        ),
        Value::List(items) => {
            AttributeValue::L(items.iter().map(encode_value).collect::<BillingResult<_>>()?)
        }
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::StringSet(set) => {
            if set.is_empty() {
                return Err(BillingError::unsupported("empty string set"));
            }
            AttributeValue::Ss(set.iter().cloned().collect())
        }
        Value::Timestamp(t) => AttributeValue::S(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    })
}

/// Encode a domain object's fields: keys capitalized, null fields dropped
pub fn encode_fields(fields: &Document) -> BillingResult<Item> {
    let mut item = Item::new();
    for (name, value) in fields {
        if value.is_null() {
            continue;
        }
        let value = rekey(value, &to_capitalized);
        item.insert(to_capitalized(name), encode_value(&value)?);
    }
    Ok(item)
}

/// Key attributes for an entity record, including its `Type` discriminator
pub fn key_attributes(keys: &EntityKeys) -> Item {
    let mut item = primary_key_item(&keys.primary);
    if let Some(index) = &keys.index {
        item.insert(
            INDEX_PARTITION_KEY.to_string(),
            AttributeValue::S(index.partition.clone()),
        );
        item.insert(
            INDEX_SORT_KEY.to_string(),
            AttributeValue::S(index.sort.clone()),
        );
    }
    item.insert(
        TYPE_ATTRIBUTE.to_string(),
        AttributeValue::S(keys.entity_type.as_str().to_string()),
    );
    item
}

/// `{PK, SK}` attribute map. Also the complete body of a uniqueness marker.
pub fn primary_key_item(key: &PrimaryKey) -> Item {
    HashMap::from([
        (PARTITION_KEY.to_string(), AttributeValue::S(key.partition.clone())),
        (SORT_KEY.to_string(), AttributeValue::S(key.sort.clone())),
    ])
}

/// Full entity record: key attributes plus encoded fields. A field whose
/// encoded name is a key attribute is rejected.
pub fn entity_item(keys: &EntityKeys, fields: &Document) -> BillingResult<Item> {
    let mut item = encode_fields(fields)?;
    if let Some(name) = item
        .keys()
        .find(|name| RESERVED_ATTRIBUTES.contains(&name.as_str()))
    {
        return Err(BillingError::invalid(
            keys.entity_type.as_str(),
            &to_underscored(name),
            format!("encodes to the reserved attribute '{}'", name),
        ));
    }
    item.extend(key_attributes(keys));
    Ok(item)
}

/// Primary key of a stored record
pub fn primary_key_of(item: &Item) -> BillingResult<PrimaryKey> {
    let part = |name: &str| {
        item.get(name)
            .and_then(AttributeValue::as_s)
            .map(str::to_string)
            .ok_or_else(|| BillingError::unsupported(format!("record without {}", name)))
    };
    Ok(PrimaryKey::new(part(PARTITION_KEY)?, part(SORT_KEY)?))
}

/// Untag a single value. Text stays text, even when it holds a timestamp.
pub fn decode_value(attr: &AttributeValue) -> BillingResult<Value> {
    Ok(match attr {
        AttributeValue::S(s) => Value::Text(s.clone()),
        AttributeValue::N(n) => Value::Number(Number::parse_decimal(n)?),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::M(map) => Value::Map(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
                .collect::<BillingResult<BTreeMap<_, _>>>()?,
        ),
        AttributeValue::L(items) => {
            Value::List(items.iter().map(decode_value).collect::<BillingResult<_>>()?)
        }
        AttributeValue::Ss(values) => {
            Value::StringSet(values.iter().cloned().collect::<BTreeSet<_>>())
        }
    })
}

/// Decode an entity record back into a domain object. Key attributes are
/// dropped and field names return to `snake_case`.
pub fn decode_fields(item: &Item) -> BillingResult<Document> {
    let mut doc = Document::new();
    for (name, attr) in item {
        if RESERVED_ATTRIBUTES.contains(&name.as_str()) {
            continue;
        }
        let value = rekey(&decode_value(attr)?, &to_underscored);
        doc.insert(to_underscored(name), value);
    }
    Ok(doc)
}
