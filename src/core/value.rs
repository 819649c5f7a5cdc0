//! In-memory values handed to the record codec

use crate::core::error::{BillingError, BillingResult};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A domain object: field name to value, in a stable order
pub type Document = BTreeMap<String, Value>;

/// Numeric value, kept integral when the input was integral
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Number::Int(i) => Some(i),
            Number::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(f as i64),
            Number::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Decimal text as stored on the wire
    pub fn to_decimal(&self) -> BillingResult<String> {
        match *self {
            Number::Int(i) => Ok(i.to_string()),
            Number::Float(f) if f.is_finite() => Ok(f.to_string()),
            Number::Float(f) => Err(BillingError::unsupported(format!("non-finite number {}", f))),
        }
    }

    /// Parse decimal text back, preferring an integer reading
    pub fn parse_decimal(text: &str) -> BillingResult<Self> {
        let text = text.trim();
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Number::Int(i));
        }
        match text.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Number::Float(f)),
            _ => Err(BillingError::unsupported(format!("malformed number '{}'", text))),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

/// The closed set of values the codec knows how to tag
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(Number),
    Bool(bool),
    Null,
    Map(BTreeMap<String, Value>),
    List(Vec<Value>),
    StringSet(BTreeSet<String>),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::Map(_) => "map",
            Value::List(_) => "list",
            Value::StringSet(_) => "string set",
            Value::Timestamp(_) => "timestamp",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_string_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Value::StringSet(s) => Some(s),
            _ => None,
        }
    }

    /// Timestamp view of the value. Text is accepted when it holds an
    /// ISO-8601 instant, which is how timestamps come back from the store.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            Value::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Build a document from a JSON object
    pub fn document_from_json(json: serde_json::Value) -> BillingResult<Document> {
        match Value::from(json) {
            Value::Map(map) => Ok(map),
            other => Err(BillingError::unsupported(format!(
                "expected a mapping, got {}",
                other.type_name()
            ))),
        }
    }

    /// Convert a parsed YAML value. Scalars that read as YAML timestamps
    /// become [`Value::Timestamp`].
    pub fn from_yaml(yaml: serde_yaml::Value) -> BillingResult<Self> {
        Ok(match yaml {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Number(Number::Int(i)),
                None => match n.as_f64() {
                    Some(f) => Value::Number(Number::Float(f)),
                    None => return Err(BillingError::unsupported(format!("yaml number {}", n))),
                },
            },
            serde_yaml::Value::String(s) => match parse_timestamp(&s) {
                Some(t) => Value::Timestamp(t),
                None => Value::Text(s),
            },
            serde_yaml::Value::Sequence(seq) => {
                Value::List(seq.into_iter().map(Value::from_yaml).collect::<BillingResult<_>>()?)
            }
            serde_yaml::Value::Mapping(mapping) => {
                let mut map = BTreeMap::new();
                for (key, value) in mapping {
                    let serde_yaml::Value::String(key) = key else {
                        return Err(BillingError::unsupported("non-string mapping key"));
                    };
                    map.insert(key, Value::from_yaml(value)?);
                }
                Value::Map(map)
            }
            serde_yaml::Value::Tagged(tagged) => {
                return Err(BillingError::unsupported(format!("yaml tag {}", tagged.tag)));
            }
        })
    }

    /// Convert a YAML mapping into a document
    pub fn document_from_yaml(yaml: serde_yaml::Value) -> BillingResult<Document> {
        match Value::from_yaml(yaml)? {
            Value::Map(map) => Ok(map),
            other => Err(BillingError::unsupported(format!(
                "expected a mapping, got {}",
                other.type_name()
            ))),
        }
    }
}

/// Parse `YYYY-MM-DD` or RFC 3339 text into an instant
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Number(Number::Int(i)),
                None => Value::Number(Number::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::Map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(Number::Int(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Number(Number::Float(f))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl From<BTreeSet<String>> for Value {
    fn from(s: BTreeSet<String>) -> Self {
        Value::StringSet(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}
