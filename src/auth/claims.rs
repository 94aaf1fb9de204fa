use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::*;

/// Claims carried by a verified signed token.
///
/// Only scalar values (strings, numbers, booleans) and the string-array form
/// of `aud` are meaningful; nested objects are kept but not interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// `aud` may be a single string or an array of strings.
    pub fn audiences(&self) -> Vec<&str> {
        match self.0.get("aud") {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.get_i64("exp")
    }

    pub fn not_before(&self) -> Option<i64> {
        self.get_i64("nbf")
    }

    /// Whether a time claim key exists at all, even with a bad value.
    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        let v = self.0.get(key)?;
        v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }
}
