//! Unified error types for newsgate.
//!
//! Variants group into the failure classes the pipeline distinguishes:
//! transient fetch failures (retried), oracle failures (defaulted),
//! history failures (fatal for a source) and plain input errors.

use std::path::PathBuf;

/// Unified error type shared by the newsgate crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty homepage URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// URL could not be parsed or resolved.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Fetch exceeded its deadline.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Network or transport failure before a status was received.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Server answered with a non-success status.
    #[error("HTTP_ERROR: status {0}")]
    HttpStatus(u16),

    /// The validation oracle could not be reached or errored.
    #[error("ORACLE_UNAVAILABLE: {0}")]
    OracleUnavailable(String),

    /// The validation oracle answered with something we could not parse.
    #[error("ORACLE_MALFORMED: {0}")]
    MalformedOracleResponse(String),

    /// Reading or writing a history file failed.
    #[error("HISTORY_IO: {path}: {source}")]
    HistoryIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A history file exists but does not deserialize.
    #[error("HISTORY_CORRUPT: {path}: {reason}")]
    HistoryCorrupt { path: PathBuf, reason: String },

    /// Report sink failed to append a row.
    #[error("REPORT_ERROR: {0}")]
    Report(String),
}

impl Error {
    /// Whether a fetch attempt that failed with this error may be retried.
    ///
    /// Timeouts, transport failures, 5xx, 408 and 429 are transient. Other
    /// statuses and oversized bodies fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::FetchTimeout(_) | Error::HttpError(_) => true,
            Error::HttpStatus(status) => *status >= 500 || matches!(*status, 408 | 429),
            _ => false,
        }
    }

    /// Whether this error means durable state can no longer be trusted.
    pub fn is_history_failure(&self) -> bool {
        matches!(self, Error::HistoryIo { .. } | Error::HistoryCorrupt { .. })
    }

    pub(crate) fn history_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::HistoryIo { path: path.into(), source }
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Report(err.to_string())
    }
}
