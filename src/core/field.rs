//! Record and key value types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A fetched record: column name to value
pub type Row = serde_json::Map<String, Value>;

/// Canonical form of a scalar key value
///
/// Keys coming from storage may be strings, integers or booleans. Batches
/// group records by key, so every scalar is normalized to its string form:
/// `42` and `"42"` address the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Create a key from its canonical string form
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build a key from a JSON value
    ///
    /// Returns `None` for null, arrays and objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            Value::Bool(b) => Some(Self(b.to_string())),
            _ => None,
        }
    }

    /// Build a composite key for a polymorphic reference (`type:id`)
    pub fn composite(type_name: &str, id: &RecordKey) -> Self {
        Self(format!("{}:{}", type_name, id.0))
    }

    /// Split a composite key into its type name and id
    pub fn split_composite(&self) -> Option<(&str, RecordKey)> {
        self.0
            .split_once(':')
            .map(|(type_name, id)| (type_name, RecordKey::new(id)))
    }

    /// Whether a JSON value addresses this key
    pub fn matches(&self, value: &Value) -> bool {
        RecordKey::from_value(value).is_some_and(|key| key == *self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<i32> for RecordKey {
    fn from(value: i32) -> Self {
        Self(value.to_string())
    }
}
