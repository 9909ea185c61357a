//! Request builder: typed request structs to flat RPC parameters

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::error::ApiError;

/// Flat, sorted RPC parameters. Nested objects become `A.B`, lists become
/// `A.1`, `A.2.B` (1-based), nulls are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcParams(BTreeMap<String, String>);

impl RpcParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_request<T: Serialize>(request: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(request)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let mut params = Self::new();
        params.flatten("", &value);
        Ok(params)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }

    fn flatten(&mut self, prefix: &str, value: &Value) {
        match value {
            Value::Null => {}
            Value::Bool(b) => {
                self.0.insert(prefix.to_string(), b.to_string());
            }
            Value::Number(n) => {
                self.0.insert(prefix.to_string(), n.to_string());
            }
            Value::String(s) => {
                self.0.insert(prefix.to_string(), s.clone());
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.flatten(&join(prefix, &(i + 1).to_string()), item);
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    self.flatten(&join(prefix, key), item);
                }
            }
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RpcParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
