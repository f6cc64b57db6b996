//! Validation oracle client error types.

use std::sync::Arc;

/// Errors from the validation oracle client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    /// No API key configured while the oracle is enabled.
    #[error("missing API key: NEWSGATE_ORACLE__API_KEY not set")]
    MissingApiKey,

    /// Authentication failed (invalid API key).
    #[error("authentication failed: invalid API key")]
    AuthError,

    /// Rate limited by the oracle API.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Completion envelope carried no message content.
    #[error("empty completion")]
    EmptyCompletion,

    /// Answer text was not the JSON we asked for.
    #[error("parse error: {0}")]
    Parse(String),
}

impl OracleError {
    /// Whether the oracle answered but the answer was unusable, as opposed to
    /// not answering at all.
    pub fn is_malformed(&self) -> bool {
        matches!(self, OracleError::Parse(_) | OracleError::EmptyCompletion)
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { OracleError::Timeout } else { OracleError::Network(Arc::new(err)) }
    }
}

impl From<OracleError> for newsgate_core::Error {
    fn from(err: OracleError) -> Self {
        if err.is_malformed() {
            newsgate_core::Error::MalformedOracleResponse(err.to_string())
        } else {
            newsgate_core::Error::OracleUnavailable(err.to_string())
        }
    }
}
