use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Codes the OpenAPI gateway returns when a caller is being throttled or the
/// backend is briefly unavailable
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "Throttling.User",
    "Throttling.Api",
    "Throttling.Concurrency",
    "Rejected.Throttling",
    "ServiceUnavailable",
    "SystemBusy",
    "InternalError",
];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{code}: {message} (HTTP {status}, RequestId: {request_id})")]
    Service {
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },

    #[error("Failed to decode response: {message}")]
    Decode { message: String, body: String },

    #[error("{kind} {id} is not found")]
    NotFound { kind: String, id: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No endpoint configured for product {0}")]
    MissingEndpoint(String),

    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Action {0} changes remote state and must carry a ClientToken")]
    MissingClientToken(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetryTimeout {
        attempts: u32,
        #[source]
        last: Box<ApiError>,
    },

    #[error("Timeout after {timeout:?} waiting for state {targets:?} (last state: {last_state:?})")]
    WaitTimeout {
        last_state: Option<String>,
        targets: Vec<String>,
        timeout: Duration,
    },

    #[error("Resource disappeared while waiting ({checks} consecutive not-found checks)")]
    Vanished { checks: u32 },

    #[error("Resource entered failed state {0}")]
    FailedState(String),

    #[error("Unexpected state {state}, wanted {targets:?}")]
    UnexpectedState { state: String, targets: Vec<String> },

    #[error("Pagination exceeded {0} pages")]
    PageLimitExceeded(usize),

    #[error("Invalid resource id {id}: expected {expected} parts separated by ':'")]
    InvalidId { id: String, expected: usize },

    #[error("[ERROR] {id} {action} failed: {source}")]
    Operation {
        id: String,
        action: String,
        #[source]
        source: Box<ApiError>,
    },
}

/// Error body returned by RPC style endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ServiceErrorBody {
    #[serde(default)]
    pub request_id: String,
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        ApiError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    /// Wraps the error with the resource id and action it came from
    pub fn context(self, id: &str, action: &str) -> Self {
        ApiError::Operation {
            id: id.to_string(),
            action: action.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, unwrapping context and retry wrappers
    pub fn root(&self) -> &ApiError {
        match self {
            ApiError::Operation { source, .. } => source.root(),
            ApiError::RetryTimeout { last, .. } => last.root(),
            other => other,
        }
    }

    /// Service error code, if the failure came from the remote API
    pub fn code(&self) -> Option<&str> {
        match self.root() {
            ApiError::Service { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Transient failures worth another attempt after backing off
    pub fn need_retry(&self) -> bool {
        match self.root() {
            ApiError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::Service { status, code, .. } => {
                *status >= 500
                    || code.starts_with("Throttling")
                    || THROTTLING_CODES.contains(&code.as_str())
            }
            // Truncated or malformed JSON from an overloaded backend
            ApiError::Decode { .. } => true,
            _ => false,
        }
    }

    /// A failure after which the request may still have been applied: the
    /// connection dropped, the response was unreadable, or the backend failed
    /// with a 5xx. Throttling and 4xx rejections never reached the backend.
    pub fn is_ambiguous(&self) -> bool {
        match self.root() {
            ApiError::Transport(e) => !e.is_connect(),
            ApiError::Decode { .. } => true,
            ApiError::Service { status, code, .. } => {
                *status >= 500 && !code.starts_with("Throttling") && !code.ends_with(".Throttling")
            }
            _ => false,
        }
    }

    /// Matches the service code against `codes`. A trailing `*` matches by
    /// prefix; otherwise the code must be equal or appear in the message.
    pub fn is_expected(&self, codes: &[&str]) -> bool {
        let (code, message) = match self.root() {
            ApiError::Service { code, message, .. } => (code.as_str(), message.as_str()),
            _ => return false,
        };
        codes.iter().any(|expected| match expected.strip_suffix('*') {
            Some(prefix) => code.starts_with(prefix),
            None => code == *expected || message.contains(*expected),
        })
    }

    pub fn is_not_found(&self) -> bool {
        match self.root() {
            ApiError::NotFound { .. } | ApiError::Vanished { .. } => true,
            ApiError::Service { code, .. } => code.ends_with("NotFound") || code.contains("NotExist"),
            _ => false,
        }
    }
}
