use runner_common::ConfigError;
use thiserror::Error;

use crate::request::WrappedRequest;

/// Terminal outcomes of a dispatch. Transport failures, retry statuses and
/// reauth statuses are handled inside the dispatcher and never appear here.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("exceeded retry count for {request} (depth {depth})")]
    ExceededRetryCount {
        request: Box<WrappedRequest>,
        depth: i64,
    },

    #[error("{request} failed with status {status_code} (depth {depth})")]
    RequestFailure {
        status_code: u16,
        request: Box<WrappedRequest>,
        depth: i64,
    },

    #[error("unknown verb {0}")]
    UnsupportedVerb(String),

    #[error("cannot build {request}: {reason}")]
    InvalidRequest {
        request: Box<WrappedRequest>,
        reason: String,
    },

    #[error("failed to decode response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("reauthorization failed: {0}")]
    Config(#[from] ConfigError),
}

impl DispatchError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DispatchError::RequestFailure { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}
