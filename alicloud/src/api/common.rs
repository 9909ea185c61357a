//! Common types and utilities shared by the product APIs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::error::ApiError;
use super::response::Tag;

/// Billing method. Terraform uses `PayAsYouGo`/`Subscription`, most RPC
/// actions use `PostPaid`/`PrePaid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentType {
    #[serde(rename = "PostPaid", alias = "PayAsYouGo")]
    PayAsYouGo,
    #[serde(rename = "PrePaid", alias = "Subscription")]
    Subscription,
}

impl PaymentType {
    pub fn as_terraform(&self) -> &'static str {
        match self {
            PaymentType::PayAsYouGo => "PayAsYouGo",
            PaymentType::Subscription => "Subscription",
        }
    }

    pub fn as_api(&self) -> &'static str {
        match self {
            PaymentType::PayAsYouGo => "PostPaid",
            PaymentType::Subscription => "PrePaid",
        }
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PayAsYouGo" | "PostPaid" => Ok(PaymentType::PayAsYouGo),
            "Subscription" | "PrePaid" => Ok(PaymentType::Subscription),
            other => Err(format!(
                "payment type must be PayAsYouGo or Subscription, got {}",
                other
            )),
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_terraform())
    }
}

/// Security group inner access: `true` ⇄ `Accept`, `false` ⇄ `Drop`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InnerAccessPolicy {
    Accept,
    Drop,
}

impl From<bool> for InnerAccessPolicy {
    fn from(value: bool) -> Self {
        if value {
            InnerAccessPolicy::Accept
        } else {
            InnerAccessPolicy::Drop
        }
    }
}

impl From<InnerAccessPolicy> for bool {
    fn from(value: InnerAccessPolicy) -> Self {
        value == InnerAccessPolicy::Accept
    }
}

/// Idempotency key for one logical mutating operation. Mint it once, before
/// the retry loop, and send the same value on every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientToken(String);

impl ClientToken {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits a composite id (`a:b`) into exactly `expected` parts
pub fn parse_resource_id(id: &str, expected: usize) -> Result<Vec<String>, ApiError> {
    let parts: Vec<String> = id.split(':').map(str::to_string).collect();
    if parts.len() != expected || parts.iter().any(String::is_empty) {
        return Err(ApiError::InvalidId {
            id: id.to_string(),
            expected,
        });
    }
    Ok(parts)
}

/// Tags to remove (by key) and to add or overwrite when moving from `old` to `new`
pub fn diff_tags(
    old: &HashMap<String, String>,
    new: &HashMap<String, String>,
) -> (Vec<String>, Vec<Tag>) {
    let mut removed: Vec<String> = old
        .keys()
        .filter(|k| !new.contains_key(*k))
        .cloned()
        .collect();
    removed.sort();

    let mut added: Vec<Tag> = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| Tag::new(k, v))
        .collect();
    added.sort_by(|a, b| a.key.cmp(&b.key));

    (removed, added)
}
