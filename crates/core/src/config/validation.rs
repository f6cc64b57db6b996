//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `batch_size`, `concurrency` or `max_bytes` is 0
    /// - `fetch_timeout_ms` is outside 100ms..=5 minutes
    /// - `oracle.timeout_ms` is 0 or longer than the fetch timeout
    /// - `oracle.score_threshold` exceeds 100
    /// - `user_agent` is empty
    /// - a source id is empty, repeated, or not filesystem-safe
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be greater than 0"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency", "must be greater than 0"));
        }
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }

        if self.fetch_timeout_ms < 100 {
            return Err(invalid("fetch_timeout_ms", "must be at least 100ms"));
        }
        if self.fetch_timeout_ms > 300_000 {
            return Err(invalid("fetch_timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.oracle.timeout_ms == 0 {
            return Err(invalid("oracle.timeout_ms", "must be greater than 0"));
        }
        if self.oracle.timeout_ms > self.fetch_timeout_ms {
            return Err(invalid("oracle.timeout_ms", "must not exceed fetch_timeout_ms"));
        }
        if self.oracle.score_threshold > 100 {
            return Err(invalid("oracle.score_threshold", "must be within 0-100"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.is_empty()
                || !source
                    .id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(invalid("sources.id", format!("{:?} must be non-empty [A-Za-z0-9_-]", source.id)));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(invalid("sources.id", format!("duplicate source id {:?}", source.id)));
            }
            if source.homepage.trim().is_empty() {
                return Err(invalid("sources.homepage", format!("empty homepage for {:?}", source.id)));
            }
        }

        if self.min_content_chars == 0 {
            tracing::warn!("min_content_chars is 0; the first non-empty extraction strategy always wins");
        }

        Ok(())
    }
}
