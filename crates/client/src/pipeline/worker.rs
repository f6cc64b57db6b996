//! One link's fetch, extract and record traversal.

use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use newsgate_core::history::{content_fingerprint, content_summary};
use newsgate_core::{Error, LifecycleState, RecordUpdate, ReportRow, ReportSink, ReportStatus};

use super::PipelineSettings;
use super::batcher::SharedHistory;
use crate::extract::{ArticleDoc, ExtractionChain, write_article};
use crate::fetch::{FetchOptions, FetchedPage, PageFetcher};

/// Everything a worker shares with its siblings.
pub(crate) struct WorkerContext {
    pub source: String,
    pub fetcher: Arc<dyn PageFetcher>,
    pub chain: Arc<ExtractionChain>,
    pub history: SharedHistory,
    pub report: Arc<dyn ReportSink>,
    pub settings: Arc<PipelineSettings>,
}

/// A validated link waiting for its content.
#[derive(Debug, Clone)]
pub(crate) struct LinkJob {
    /// Report row index, 1-based within the source.
    pub index: usize,
    pub url: Url,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkOutcome {
    Fetched,
    Failed,
}

/// Result of a bounded retry loop.
pub(crate) struct Attempts {
    pub page: Result<FetchedPage, Error>,
    pub count: u32,
}

impl Attempts {
    pub fn retries(&self) -> u32 {
        self.count.saturating_sub(1)
    }
}

/// Backoff before retry number `retry` (1-based), doubling each time.
pub(crate) fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(1u32 << retry.saturating_sub(1).min(16))
}

/// Fetch `url`, retrying transient failures up to `max_retries` times.
///
/// With `history` set, every failed attempt is recorded against the link so
/// `crawl_count` tracks attempts; the successful attempt is left to the
/// caller to record together with the extracted content.
pub(crate) async fn fetch_with_retry(
    fetcher: &dyn PageFetcher, url: &Url, opts: &FetchOptions, settings: &PipelineSettings,
    history: Option<&SharedHistory>,
) -> Attempts {
    let mut count = 0;

    loop {
        if count > 0 {
            tokio::time::sleep(backoff_delay(settings.retry_backoff, count)).await;
        }
        count += 1;

        let outcome = tokio::time::timeout(opts.timeout, fetcher.fetch(url, opts))
            .await
            .unwrap_or_else(|_| Err(Error::FetchTimeout(format!("{url} after {}ms", opts.timeout.as_millis()))));

        let error = match outcome {
            Ok(page) => return Attempts { page: Ok(page), count },
            Err(e) => e,
        };

        if let Some(history) = history {
            history.lock().await.upsert(url.as_str(), RecordUpdate::fetch_failure(error.to_string()));
        }

        let exhausted = count > settings.max_retries;
        if !error.is_retryable() || exhausted {
            tracing::warn!(url = %url, attempt = count, "fetch failed, giving up: {error}");
            return Attempts { page: Err(error), count };
        }
        tracing::info!(url = %url, attempt = count, "fetch failed, will retry: {error}");
    }
}

/// Run one link through fetch, extraction and recording.
///
/// Only history failures escape; every other failure ends up in the record
/// and the report row.
pub(crate) async fn process_link(ctx: Arc<WorkerContext>, job: LinkJob) -> Result<LinkOutcome, Error> {
    let started = Instant::now();
    let opts = FetchOptions { timeout: ctx.settings.fetch_timeout, with_markdown: true, ..Default::default() };

    let attempts = fetch_with_retry(ctx.fetcher.as_ref(), &job.url, &opts, &ctx.settings, Some(&ctx.history)).await;
    let retries = attempts.retries();

    let page = match attempts.page {
        Ok(page) => page,
        Err(error) => {
            let record = {
                let mut store = ctx.history.lock().await;
                store.save()?;
                store.get(job.url.as_str()).cloned()
            };

            if let Some(record) = record {
                let row = ReportRow {
                    duration: started.elapsed().as_secs_f64(),
                    retry_count: retries,
                    error_message: error.to_string(),
                    ..ReportRow::from_record(job.index, &ctx.source, &record, ReportStatus::Failed)
                };
                append_row(ctx.report.as_ref(), &row);
            }
            return Ok(LinkOutcome::Failed);
        }
    };

    let extraction = ctx.chain.extract(&page);
    let length = extraction.content_length();
    let title = extraction
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| job.text.clone());

    let mut update = RecordUpdate {
        state: Some(LifecycleState::ContentFetched),
        title: Some(title),
        content_length: Some(length),
        fetch_attempt: true,
        clear_error: true,
        ..Default::default()
    };
    if length > 0 {
        update.content_fingerprint = Some(content_fingerprint(&extraction.content));
        update.content_summary = Some(content_summary(&extraction.content, ctx.settings.summary_chars));
    }

    let record = {
        let mut store = ctx.history.lock().await;
        let record = store.upsert(job.url.as_str(), update).clone();
        store.save()?;
        record
    };

    tracing::info!(
        url = %job.url,
        strategy = %extraction.strategy_used,
        chars = length,
        retries,
        "article recorded"
    );

    if let Some(dir) = &ctx.settings.articles_dir
        && length > 0
    {
        let strategy = extraction.strategy_used.to_string();
        let doc = ArticleDoc {
            title: &record.title,
            source: &ctx.source,
            url: &record.url,
            publish_date: extraction.publish_date.as_deref(),
            strategy: &strategy,
            content: &extraction.content,
        };
        if let Err(e) = write_article(dir, &record.normalized_key, &doc) {
            tracing::warn!(url = %job.url, "could not write article file: {e}");
        }
    }

    let row = ReportRow {
        publish_date: extraction.publish_date.clone().unwrap_or_default(),
        duration: started.elapsed().as_secs_f64(),
        retry_count: retries,
        strategy_used: extraction.strategy_used.to_string(),
        ..ReportRow::from_record(job.index, &ctx.source, &record, ReportStatus::Success)
    };
    append_row(ctx.report.as_ref(), &row);

    Ok(LinkOutcome::Fetched)
}

fn append_row(report: &dyn ReportSink, row: &ReportRow) {
    if let Err(e) = report.append(row) {
        tracing::error!(url = %row.url, "could not append report row: {e}");
    }
}
