//! Page fetching.
//!
//! ### Page Fetcher
//! - [`PageFetcher`] is the seam the pipeline drives; tests swap in mocks.
//! - A fetched page carries the raw HTML plus, on request, two Markdown
//!   renderings: a boilerplate-pruned one and an unfiltered one.
//!
//! ### HTTP client
//! - Per-request timeout, redirect limit and max body bytes.
//! - Timeouts, network failures and server-side statuses are transient
//!   errors the pipeline may retry; client errors and oversized bodies are not.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize};

use newsgate_core::Error;

use crate::extract::markdown::render_markdown;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "newsgate/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Client-wide request timeout (default: 60s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "newsgate/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(60_000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn from_app(config: &newsgate_core::AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.fetch_timeout(),
            ..Default::default()
        }
    }
}

/// Per-call fetch options.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Produce the Markdown renderings (article pages only, not homepages).
    pub with_markdown: bool,
    /// Ask for a script-rendered page. [`FetchClient`] has no renderer and
    /// always returns the served HTML.
    pub render_js: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_millis(60_000), headers: Vec::new(), with_markdown: true, render_js: false }
    }
}

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL requested
    pub url: ::url::Url,
    /// The final URL after redirects
    pub final_url: ::url::Url,
    pub html: String,
    /// Boilerplate-pruned Markdown, when the fetcher can distill one.
    pub filtered_markdown: Option<String>,
    /// Unfiltered Markdown rendering of the whole page.
    pub raw_markdown: Option<String>,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchedPage {
    /// A page with HTML only and no renderings.
    pub fn from_html(url: ::url::Url, html: impl Into<String>) -> Self {
        Self {
            final_url: url.clone(),
            url,
            html: html.into(),
            filtered_markdown: None,
            raw_markdown: None,
            fetch_ms: 0,
        }
    }
}

/// Something that can turn a URL into a [`FetchedPage`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &::url::Url, opts: &FetchOptions) -> Result<FetchedPage, Error>;
}

/// HTTP fetch client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn fetch_bytes(&self, url: &::url::Url, opts: &FetchOptions) -> Result<(::url::Url, Bytes), Error> {
        let mut request = self.http.get(url.as_str()).timeout(opts.timeout).header(
            header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        );
        for (name, value) in &opts.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{url} after {}ms", opts.timeout.as_millis()))
            } else {
                Error::HttpError(format!("network error: {}", e))
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{url} body after {}ms", opts.timeout.as_millis()))
            } else {
                Error::HttpError(format!("failed to read response: {}", e))
            }
        })?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        Ok((final_url, bytes))
    }
}

#[async_trait]
impl PageFetcher for FetchClient {
    async fn fetch(&self, url: &::url::Url, opts: &FetchOptions) -> Result<FetchedPage, Error> {
        let start = Instant::now();
        if opts.render_js {
            tracing::debug!(url = %url, "script rendering requested, fetching served HTML");
        }
        let (final_url, bytes) = self.fetch_bytes(url, opts).await?;
        let html = String::from_utf8_lossy(&bytes).into_owned();

        let mut page = FetchedPage::from_html(url.clone(), html);
        page.final_url = final_url;

        if opts.with_markdown {
            let renderings = render_markdown(&page.html);
            page.filtered_markdown = renderings.filtered;
            page.raw_markdown = renderings.raw;
        }

        page.fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            page.url,
            page.final_url,
            page.fetch_ms,
            bytes.len()
        );

        Ok(page)
    }
}
