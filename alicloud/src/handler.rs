//! Plumbing shared by resource and data source handlers: provider data
//! extraction, error to diagnostic conversion and state helpers

use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use tfplug::{AttributePath, Diagnostic, Dynamic, DynamicValue, ProviderData, TfplugError};

use crate::api::ApiError;
use crate::AlicloudProviderData;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Provider not configured")]
    NotConfigured,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    State(#[from] TfplugError),

    #[error("Invalid value for {attribute}: {message}")]
    InvalidAttribute { attribute: String, message: String },
}

impl HandlerError {
    pub fn invalid(attribute: &str, message: impl Into<String>) -> Self {
        HandlerError::InvalidAttribute {
            attribute: attribute.to_string(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HandlerError::Api(e) if e.is_not_found())
    }

    /// Summary names the failed operation, detail carries the error chain
    pub fn to_diagnostic(&self, summary: &str) -> Diagnostic {
        let diagnostic = Diagnostic::error(summary, self.to_string());
        match self {
            HandlerError::InvalidAttribute { attribute, .. } => {
                diagnostic.with_attribute(AttributePath::new(attribute))
            }
            _ => diagnostic,
        }
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;

/// Downcasts the provider data passed to a resource or data source
pub fn extract_provider_data(
    data: Option<ProviderData>,
) -> Result<AlicloudProviderData, Diagnostic> {
    let data = data.ok_or_else(|| {
        Diagnostic::error(
            "No provider data",
            "No provider data was provided to the resource",
        )
    })?;
    data.downcast_ref::<AlicloudProviderData>()
        .cloned()
        .ok_or_else(|| {
            Diagnostic::error(
                "Invalid provider data",
                "Failed to extract AlicloudProviderData from provider data",
            )
        })
}

pub fn path(name: &str) -> AttributePath {
    AttributePath::new(name)
}

/// Config value of a string attribute when it differs from the prior state
pub fn changed_string(prior: &DynamicValue, config: &DynamicValue, name: &str) -> Option<String> {
    let after = config.get_string_opt(&path(name));
    if prior.get_string_opt(&path(name)) == after {
        None
    } else {
        after
    }
}

pub fn changed_number(prior: &DynamicValue, config: &DynamicValue, name: &str) -> Option<f64> {
    let after = config.get_number_opt(&path(name));
    if prior.get_number_opt(&path(name)) == after {
        None
    } else {
        after
    }
}

pub fn changed_bool(prior: &DynamicValue, config: &DynamicValue, name: &str) -> Option<bool> {
    let after = config.get_bool_opt(&path(name));
    if prior.get_bool_opt(&path(name)) == after {
        None
    } else {
        after
    }
}

pub fn string_map(map: &HashMap<String, String>) -> HashMap<String, Dynamic> {
    map.iter()
        .map(|(k, v)| (k.clone(), Dynamic::String(v.clone())))
        .collect()
}

pub fn string_list<I, S>(items: I) -> Vec<Dynamic>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items
        .into_iter()
        .map(|s| Dynamic::String(s.into()))
        .collect()
}

/// Empty strings from the API become null so optional attributes stay unset
pub fn set_optional_string(
    state: &mut DynamicValue,
    name: &str,
    value: &str,
) -> Result<(), TfplugError> {
    if value.is_empty() {
        state.set_null(&path(name))
    } else {
        state.set_string(&path(name), value)
    }
}

/// Compiles the optional `name_regex` filter of a data source
pub fn name_regex(config: &DynamicValue) -> HandlerResult<Option<Regex>> {
    config
        .get_string_opt(&path("name_regex"))
        .map(|pattern| {
            Regex::new(&pattern).map_err(|e| HandlerError::invalid("name_regex", e.to_string()))
        })
        .transpose()
}

/// Stable data source id derived from the ids it matched
pub fn data_source_id(ids: &[String]) -> String {
    let joined: String = ids.iter().map(|id| format!("{}-", id)).collect();
    crc32fast::hash(joined.as_bytes()).to_string()
}

/// Time left of an operation's timeout, shared by its create call and waits
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    timeout: Duration,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            started: Instant::now(),
            timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.started.elapsed())
    }
}
