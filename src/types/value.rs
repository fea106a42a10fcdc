use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Attribute id to value mapping stored alongside a document or link.
pub type DataRecord = BTreeMap<String, Value>;

/// Free-form metadata carried on a document envelope.
pub type MetaData = BTreeMap<String, Value>;

const DATE_TAG: &str = "$date";

/// Schema-less attribute value.
///
/// Persisted as JSON; timestamps are written as `{"$date": "<rfc3339>"}` so
/// they survive storage without being confused with plain strings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Map(BTreeMap<String, Value>),
    List(Vec<Value>),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Replaces NaN and infinite floats, at any depth, with `Null`, which is
    /// how they are persisted.
    #[must_use]
    pub fn normalized(self) -> Value {
        match self {
            Self::Float(f) if !f.is_finite() => Self::Null,
            Self::Map(map) => Self::Map(map.into_iter().map(|(k, v)| (k, v.normalized())).collect()),
            Self::List(items) => Self::List(items.into_iter().map(Value::normalized).collect()),
            other => other,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Null, Self::Float),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(ts) = map
                        .get(DATE_TAG)
                        .and_then(serde_json::Value::as_str)
                        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    {
                        return Self::Timestamp(ts.with_timezone(&Utc));
                    }
                }
                Self::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s),
            Value::Timestamp(ts) => serde_json::json!({
                DATE_TAG: ts.to_rfc3339_opts(SecondsFormat::Millis, true)
            }),
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Builds a data record from a JSON object, or `None` for any other JSON
/// value. Top-level keys are taken as they are, so `{"$date": ...}` is a
/// record with a `$date` key rather than a timestamp.
#[must_use]
pub fn try_record_from_json(json: serde_json::Value) -> Option<DataRecord> {
    match json {
        serde_json::Value::Object(map) => {
            Some(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
        }
        _ => None,
    }
}

/// Like [`try_record_from_json`], but non-object input yields an empty
/// record.
#[must_use]
pub fn record_from_json(json: serde_json::Value) -> DataRecord {
    try_record_from_json(json).unwrap_or_default()
}
