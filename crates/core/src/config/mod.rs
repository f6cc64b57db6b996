//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (NEWSGATE_*, nested keys split on `__`)
//! 2. TOML config file (explicit path, or NEWSGATE_CONFIG_FILE)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// A homepage to harvest and the id its history is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub homepage: String,
}

/// Settings for the link validation oracle (an OpenAI-compatible chat API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// When false every admitted link is accepted without a network call.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Set via NEWSGATE_ORACLE__BASE_URL.
    #[serde(default = "default_oracle_base_url")]
    pub base_url: String,

    #[serde(default = "default_oracle_model")]
    pub model: String,

    /// Set via NEWSGATE_ORACLE__API_KEY. Required only when enabled.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_oracle_timeout_ms")]
    pub timeout_ms: u64,

    /// Score at or above which a salvaged score counts as valid.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: u8,

    /// Minimum spacing between oracle requests.
    #[serde(default = "default_oracle_min_interval_ms")]
    pub min_interval_ms: u64,
}

fn default_oracle_base_url() -> String {
    "https://api.deepseek.com/v1".into()
}

fn default_oracle_model() -> String {
    "deepseek-chat".into()
}

fn default_oracle_timeout_ms() -> u64 {
    30_000
}

fn default_score_threshold() -> u8 {
    60
}

fn default_oracle_min_interval_ms() -> u64 {
    200
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_oracle_base_url(),
            model: default_oracle_model(),
            api_key: None,
            timeout_ms: default_oracle_timeout_ms(),
            score_threshold: default_score_threshold(),
            min_interval_ms: default_oracle_min_interval_ms(),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding `<source>_links.json` history files.
    #[serde(default = "default_history_dir")]
    pub history_dir: PathBuf,

    /// CSV report path; rows are appended across runs.
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,

    /// Optional directory for per-article Markdown files.
    #[serde(default)]
    pub articles_dir: Option<PathBuf>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per page.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Per-attempt page fetch timeout in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Retries after the first failed content fetch.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff before the first retry, doubled for each further retry.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Concurrent content fetch workers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Links per oracle batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Content length at which an extraction strategy is good enough to stop.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Length of the content summary kept in history.
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,

    #[serde(default = "default_max_links_per_source")]
    pub max_links_per_source: usize,

    /// Ignore cached verdicts and re-validate every candidate.
    #[serde(default)]
    pub cold_start: bool,

    /// Article container selectors, tried in order.
    #[serde(default = "default_content_selectors")]
    pub content_selectors: Vec<String>,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("./link_history")
}

fn default_report_path() -> PathBuf {
    PathBuf::from("./newsgate-report.csv")
}

fn default_user_agent() -> String {
    "newsgate/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_fetch_timeout_ms() -> u64 {
    60_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

fn default_concurrency() -> usize {
    3
}

fn default_batch_size() -> usize {
    5
}

fn default_min_content_chars() -> usize {
    100
}

fn default_summary_chars() -> usize {
    200
}

fn default_max_links_per_source() -> usize {
    100
}

fn default_true() -> bool {
    true
}

/// Common article containers, most specific first.
pub fn default_content_selectors() -> Vec<String> {
    [
        "article",
        "[itemprop=\"articleBody\"]",
        ".article-content",
        ".article-body",
        ".post-content",
        ".entry-content",
        ".news-content",
        ".content",
        "main",
        "#content",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            history_dir: default_history_dir(),
            report_path: default_report_path(),
            articles_dir: None,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            min_content_chars: default_min_content_chars(),
            summary_chars: default_summary_chars(),
            max_links_per_source: default_max_links_per_source(),
            cold_start: false,
            content_selectors: default_content_selectors(),
            oracle: OracleConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Fetch timeout as Duration for use with reqwest/tokio.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `NEWSGATE_`
    /// 2. TOML file from `config_file`, else from `NEWSGATE_CONFIG_FILE`
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read or parsed
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(config_file)
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match config_file {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Ok(path) = std::env::var("NEWSGATE_CONFIG_FILE") {
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        figment.merge(
            Env::prefixed("NEWSGATE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    /// Oracle API key, checked only when the oracle is enabled.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is not set.
    pub fn require_oracle_api_key(&self) -> Result<&str, ConfigError> {
        self.oracle
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "oracle.api_key".into(),
                hint: "Set NEWSGATE_ORACLE__API_KEY or disable the oracle".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.history_dir, PathBuf::from("./link_history"));
        assert_eq!(config.fetch_timeout_ms, 60_000);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.min_content_chars, 100);
        assert_eq!(config.concurrency, 3);
        assert!(!config.cold_start);
        assert!(config.oracle.enabled);
        assert_eq!(config.oracle.score_threshold, 60);
        assert!(config.sources.is_empty());
        assert_eq!(config.content_selectors.first().map(String::as_str), Some("article"));
    }

    #[test]
    fn test_timeout_durations() {
        let config = AppConfig::default();
        assert_eq!(config.fetch_timeout(), Duration::from_millis(60_000));
        assert_eq!(config.oracle.timeout(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_require_oracle_api_key() {
        let config = AppConfig::default();
        assert!(matches!(config.require_oracle_api_key(), Err(ConfigError::Missing { .. })));

        let mut config = AppConfig::default();
        config.oracle.api_key = Some("sk-test".into());
        assert_eq!(config.require_oracle_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "newsgate.toml",
                r#"
                batch_size = 8
                cold_start = true

                [oracle]
                model = "deepseek-reasoner"

                [[sources]]
                id = "farmnews"
                homepage = "https://farmnews.example/"
                "#,
            )?;
            jail.set_env("NEWSGATE_CONCURRENCY", "4");
            jail.set_env("NEWSGATE_ORACLE__API_KEY", "sk-env");

            let config = AppConfig::load(Some(Path::new("newsgate.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.batch_size, 8);
            assert!(config.cold_start);
            assert_eq!(config.concurrency, 4);
            assert_eq!(config.oracle.model, "deepseek-reasoner");
            assert_eq!(config.oracle.api_key.as_deref(), Some("sk-env"));
            assert_eq!(config.sources.len(), 1);
            assert_eq!(config.sources[0].id, "farmnews");
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("NEWSGATE_BATCH_SIZE", "0");
            let result = AppConfig::load(None);
            assert!(matches!(result, Err(ConfigError::Invalid { ref field, .. }) if field == "batch_size"));
            Ok(())
        });
    }
}
