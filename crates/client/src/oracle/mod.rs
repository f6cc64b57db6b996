//! Link validation oracle client.
//!
//! The oracle is an OpenAI-compatible chat completion API asked whether
//! candidate links are genuine article links. It is treated as a black-box
//! scorer behind the [`ValidationOracle`] trait.
//!
//! ### Specification
//!
//! - **Endpoint**: `{base_url}/chat/completions`
//! - **Authentication**: `Authorization: Bearer <api key>`.
//! - **Rate Limiting**: requests are spaced by `oracle.min_interval_ms`.
//! - **Batches**: several links go out in one prompt that asks for a JSON
//!   array; a batch of one uses the single-link prompt instead.
//! - **Parsing**: code fences are unwrapped; single-link answers that are not
//!   JSON but mention a score are salvaged against `score_threshold`.

pub mod error;
pub mod request;
pub mod response;

pub use error::OracleError;
pub use request::{ChatRequest, LinkQuery, batch_prompt, single_prompt};
pub use response::{ChatCompletion, OracleVerdict, parse_batch, parse_single, strip_code_fence};

use async_trait::async_trait;
use reqwest::header;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

use newsgate_core::{Error, OracleConfig};

/// Reason recorded when the oracle is switched off.
pub const DISABLED_REASON: &str = "validation disabled";

/// Something that can score candidate links.
///
/// Implementations must tolerate being asked about the same URL twice.
#[async_trait]
pub trait ValidationOracle: Send + Sync {
    /// Score a batch with one call. Result order need not follow input order.
    async fn score_links(&self, batch: &[LinkQuery], base_url: &Url) -> Result<Vec<OracleVerdict>, Error>;

    /// Score a single link.
    async fn score_link(&self, query: &LinkQuery, base_url: &Url) -> Result<OracleVerdict, Error>;
}

/// Oracle that accepts every link without a network call.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllOracle;

impl AcceptAllOracle {
    fn verdict(query: &LinkQuery) -> OracleVerdict {
        OracleVerdict { url: query.url.clone(), score: 0, is_valid: true, reason: DISABLED_REASON.to_string() }
    }
}

#[async_trait]
impl ValidationOracle for AcceptAllOracle {
    async fn score_links(&self, batch: &[LinkQuery], _: &Url) -> Result<Vec<OracleVerdict>, Error> {
        Ok(batch.iter().map(Self::verdict).collect())
    }

    async fn score_link(&self, query: &LinkQuery, _: &Url) -> Result<OracleVerdict, Error> {
        Ok(Self::verdict(query))
    }
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self { last_request: Mutex::new(None), min_interval }
    }

    /// Acquire permission to make a request, waiting if necessary.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Chat completion oracle client.
#[derive(Debug, Clone)]
pub struct ChatOracle {
    http: reqwest::Client,
    config: OracleConfig,
    api_key: String,
    user_agent: String,
    rate_limiter: Arc<RateLimiter>,
}

impl ChatOracle {
    /// Create a new oracle client. Fails without an API key.
    pub fn new(config: OracleConfig, user_agent: &str) -> Result<Self, OracleError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(OracleError::MissingApiKey)?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .use_rustls_tls()
            .build()
            .map_err(|e| OracleError::Network(Arc::new(e)))?;

        Ok(Self {
            http,
            rate_limiter: Arc::new(RateLimiter::new(config.min_interval())),
            config,
            api_key,
            user_agent: user_agent.to_string(),
        })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Send one prompt and return the answer text.
    async fn complete(&self, prompt: String) -> Result<String, OracleError> {
        self.rate_limiter.acquire().await;

        let start = Instant::now();
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = ChatRequest::user(&self.config.model, prompt);

        let http_response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, &self.user_agent)
            .json(&body)
            .send()
            .await?;

        let status = http_response.status();
        tracing::debug!(status = status.as_u16(), "oracle response status");

        if status == 401 || status == 403 {
            return Err(OracleError::AuthError);
        }

        if status == 429 {
            return Err(OracleError::RateLimited);
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(OracleError::HttpError { status: status.as_u16() });
        }

        let bytes = http_response.bytes().await?;
        let completion: ChatCompletion =
            serde_json::from_slice(&bytes).map_err(|e| OracleError::Parse(format!("completion envelope: {e}")))?;

        tracing::debug!("oracle answered in {:?}", start.elapsed());
        completion.answer()
    }
}

#[async_trait]
impl ValidationOracle for ChatOracle {
    async fn score_links(&self, batch: &[LinkQuery], base_url: &Url) -> Result<Vec<OracleVerdict>, Error> {
        if let [single] = batch {
            return Ok(vec![self.score_link(single, base_url).await?]);
        }

        let answer = self.complete(batch_prompt(batch, base_url)).await?;
        let verdicts = parse_batch(&answer).inspect_err(|_| {
            tracing::debug!(answer = %answer.chars().take(200).collect::<String>(), "unparseable batch answer");
        })?;
        Ok(verdicts)
    }

    async fn score_link(&self, query: &LinkQuery, base_url: &Url) -> Result<OracleVerdict, Error> {
        let answer = self.complete(single_prompt(query, base_url)).await?;
        Ok(parse_single(&answer, &query.url, self.config.score_threshold)?)
    }
}
