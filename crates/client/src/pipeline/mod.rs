//! Pipeline orchestrator.
//!
//! Drives one homepage at a time through
//! discovery → candidate filter → validation → fetch → extraction → record.
//!
//! - Discovery is one homepage fetch; links are harvested and filtered
//!   synchronously. Filter rejections are recorded as `Invalid`.
//! - Validation goes through the [`ValidationBatcher`], which flushes history
//!   after every batch.
//! - Valid links not yet fetched go to a bounded worker pool; each worker owns
//!   one link's fetch → extract → record traversal. At most
//!   `max_links_per_source` links are fetched per run; the rest stay `Valid`
//!   and are picked up by a later run.
//! - A per-link failure never aborts the source. A source fails only when its
//!   homepage cannot be fetched or its history cannot be read or written; no
//!   further fetches start after a history failure and the run moves on to
//!   the next source.

pub mod batcher;
mod worker;

pub use batcher::{AdmittedLink, ORACLE_DEFAULT_REASON, SharedHistory, ValidationBatcher, Verdict, VerdictOrigin};

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use url::Url;

use newsgate_core::link::{classify, normalize_absolute};
use newsgate_core::{
    AppConfig, CsvReportSink, Error, HistoryStore, LifecycleState, RecordUpdate, ReportSink, SourceConfig,
};

use self::worker::{LinkJob, LinkOutcome, WorkerContext, fetch_with_retry, process_link};
use crate::extract::{ExtractionChain, extract_links};
use crate::fetch::{FetchClient, FetchConfig, FetchOptions, PageFetcher, canonicalize};
use crate::oracle::{AcceptAllOracle, ChatOracle, ValidationOracle};

/// Knobs the orchestrator runs with.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub history_dir: PathBuf,
    pub articles_dir: Option<PathBuf>,
    pub fetch_timeout: Duration,
    pub oracle_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub concurrency: usize,
    pub batch_size: usize,
    pub min_content_chars: usize,
    pub summary_chars: usize,
    pub max_links_per_source: usize,
    pub cold_start: bool,
    pub content_selectors: Vec<String>,
}

impl PipelineSettings {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            history_dir: config.history_dir.clone(),
            articles_dir: config.articles_dir.clone(),
            fetch_timeout: config.fetch_timeout(),
            oracle_timeout: config.oracle.timeout(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
            concurrency: config.concurrency.max(1),
            batch_size: config.batch_size.max(1),
            min_content_chars: config.min_content_chars,
            summary_chars: config.summary_chars,
            max_links_per_source: config.max_links_per_source,
            cold_start: config.cold_start,
            content_selectors: config.content_selectors.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}

/// Counts for one source run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub source: String,
    pub discovered: usize,
    pub rejected: usize,
    pub cached: usize,
    pub validated_valid: usize,
    pub validated_invalid: usize,
    pub defaulted: usize,
    pub already_fetched: usize,
    /// Valid links left for a later run by the per-source fetch cap.
    pub deferred: usize,
    pub fetched: usize,
    pub failed: usize,
}

/// Outcome of a run over several sources.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub sources: Vec<SourceSummary>,
    /// Sources that could not be processed, with the error.
    pub failures: Vec<(String, String)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The link lifecycle pipeline.
pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    oracle: Arc<dyn ValidationOracle>,
    report: Arc<dyn ReportSink>,
    chain: Arc<ExtractionChain>,
    settings: Arc<PipelineSettings>,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>, oracle: Arc<dyn ValidationOracle>, report: Arc<dyn ReportSink>,
        settings: PipelineSettings,
    ) -> Self {
        let chain = ExtractionChain::new(&settings.content_selectors, settings.min_content_chars);
        Self { fetcher, oracle, report, chain: Arc::new(chain), settings: Arc::new(settings) }
    }

    /// Wire up the HTTP fetcher, oracle client and CSV report from config.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let fetcher = FetchClient::new(FetchConfig::from_app(config))?;

        let oracle: Arc<dyn ValidationOracle> = if config.oracle.enabled {
            config
                .require_oracle_api_key()
                .map_err(|e| Error::InvalidInput(e.to_string()))?;
            Arc::new(ChatOracle::new(config.oracle.clone(), &config.user_agent)?)
        } else {
            tracing::info!("oracle disabled, admitted links are accepted without validation");
            Arc::new(AcceptAllOracle)
        };

        let report = CsvReportSink::open(&config.report_path)?;

        Ok(Self::new(Arc::new(fetcher), oracle, Arc::new(report), PipelineSettings::from_app(config)))
    }

    /// Replace the extraction chain.
    pub fn with_chain(mut self, chain: ExtractionChain) -> Self {
        self.chain = Arc::new(chain);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run every source in order. A failed source is logged and skipped.
    pub async fn run(&self, sources: &[SourceConfig]) -> RunSummary {
        let mut summary = RunSummary::default();

        for source in sources {
            match self.run_source(source).await {
                Ok(done) => summary.sources.push(done),
                Err(e) => {
                    tracing::error!(source = %source.id, "source run failed: {e}");
                    summary.failures.push((source.id.clone(), e.to_string()));
                }
            }
        }

        summary
    }

    /// Process one homepage end to end.
    pub async fn run_source(&self, source: &SourceConfig) -> Result<SourceSummary, Error> {
        let mut summary = SourceSummary { source: source.id.clone(), ..Default::default() };

        let homepage = canonicalize(&source.homepage).map_err(|e| Error::InvalidUrl(format!("{}: {e}", source.homepage)))?;
        let store = HistoryStore::load(&self.settings.history_dir, &source.id)?;
        tracing::info!(source = %source.id, known = store.len(), homepage = %homepage, "starting source");
        let history: SharedHistory = Arc::new(Mutex::new(store));

        let opts = FetchOptions { timeout: self.settings.fetch_timeout, with_markdown: false, ..Default::default() };
        let page = fetch_with_retry(self.fetcher.as_ref(), &homepage, &opts, &self.settings, None)
            .await
            .page?;
        let base = page.final_url.clone();

        let candidates = extract_links(&page.html, &base);
        summary.discovered = candidates.len();

        let admitted = self.admit(candidates, &base, &history, &mut summary).await;

        let mut batcher = ValidationBatcher::new(self.oracle.clone(), self.settings.batch_size, self.settings.oracle_timeout)
            .cold_start(self.settings.cold_start);
        let verdicts = batcher.validate(&admitted, &base, &history).await?;

        let mut jobs = Vec::new();
        {
            let store = history.lock().await;
            for verdict in &verdicts {
                match verdict.origin {
                    VerdictOrigin::Memo | VerdictOrigin::History => summary.cached += 1,
                    VerdictOrigin::Defaulted => summary.defaulted += 1,
                    VerdictOrigin::Oracle if verdict.valid => summary.validated_valid += 1,
                    VerdictOrigin::Oracle => summary.validated_invalid += 1,
                }

                if !verdict.valid {
                    continue;
                }
                match store.get_by_key(&verdict.key).map(|r| r.state) {
                    Some(LifecycleState::Valid) => match Url::parse(&verdict.url) {
                        Ok(url) => jobs.push((url, admitted_text(&admitted, &verdict.key))),
                        Err(e) => tracing::warn!(url = %verdict.url, "skipping unparseable link: {e}"),
                    },
                    Some(LifecycleState::ContentFetched) => summary.already_fetched += 1,
                    state => tracing::debug!(url = %verdict.url, ?state, "valid verdict without a fetchable record"),
                }
            }
        }

        if jobs.len() > self.settings.max_links_per_source {
            summary.deferred = jobs.len() - self.settings.max_links_per_source;
            jobs.truncate(self.settings.max_links_per_source);
            tracing::info!(source = %source.id, deferred = summary.deferred, "fetch cap reached, deferring links");
        }

        tracing::info!(source = %source.id, links = jobs.len(), "fetching article content");
        let (fetched, failed) = self.fetch_all(source, jobs, &history).await?;
        summary.fetched = fetched;
        summary.failed = failed;

        history.lock().await.save()?;

        tracing::info!(
            source = %summary.source,
            discovered = summary.discovered,
            rejected = summary.rejected,
            cached = summary.cached,
            valid = summary.validated_valid,
            invalid = summary.validated_invalid,
            defaulted = summary.defaulted,
            deferred = summary.deferred,
            fetched = summary.fetched,
            failed = summary.failed,
            "source finished"
        );

        Ok(summary)
    }

    /// Apply the candidate filter, recording first-seen rejections as
    /// `Invalid`. Links that resolve to the homepage itself are dropped.
    async fn admit(
        &self, candidates: Vec<crate::extract::Candidate>, base: &Url, history: &SharedHistory,
        summary: &mut SourceSummary,
    ) -> Vec<AdmittedLink> {
        let homepage_key = normalize_absolute(base.as_str());
        let mut admitted = Vec::new();
        let mut store = history.lock().await;

        for candidate in candidates {
            match classify(&candidate.href, base) {
                Ok(resolved) => {
                    if candidate.key == homepage_key {
                        tracing::debug!(href = %candidate.href, "skipping link back to the homepage");
                        continue;
                    }
                    admitted.push(AdmittedLink { url: resolved.to_string(), key: candidate.key, text: candidate.text });
                }
                Err(rejection) => {
                    summary.rejected += 1;
                    tracing::debug!(href = %candidate.href, reason = rejection.reason(), "candidate rejected");

                    if candidate.key == homepage_key || store.get_by_key(&candidate.key).is_some() {
                        continue;
                    }
                    let url = base
                        .join(&candidate.href)
                        .map(|u| u.to_string())
                        .unwrap_or_else(|_| candidate.href.clone());
                    let update = RecordUpdate {
                        state: Some(LifecycleState::Invalid),
                        validation_reason: Some(rejection.reason().to_string()),
                        ..Default::default()
                    }
                    .with_title(candidate.text);
                    store.upsert(&url, update);
                }
            }
        }

        admitted
    }

    /// Fetch every job on the bounded worker pool. Returns (fetched, failed).
    async fn fetch_all(
        &self, source: &SourceConfig, jobs: Vec<(Url, String)>, history: &SharedHistory,
    ) -> Result<(usize, usize), Error> {
        let ctx = Arc::new(WorkerContext {
            source: source.id.clone(),
            fetcher: self.fetcher.clone(),
            chain: self.chain.clone(),
            history: history.clone(),
            report: self.report.clone(),
            settings: self.settings.clone(),
        });

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency));
        let halted = Arc::new(AtomicBool::new(false));
        let mut join_set = JoinSet::new();

        for (index, (url, text)) in jobs.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::InvalidInput(format!("fetch worker pool closed: {e}")))?;
            if halted.load(Ordering::Acquire) {
                tracing::warn!(source = %source.id, "history failure, not starting remaining fetches");
                break;
            }
            let ctx = ctx.clone();
            let halted = halted.clone();
            let job = LinkJob { index: index + 1, url, text };

            join_set.spawn(async move {
                // NOTE: Hold permit for task duration to enforce concurrency limit
                let _permit = permit;
                let outcome = process_link(ctx, job).await;
                // Raised before the permit is released so the spawner sees it
                if outcome.is_err() {
                    halted.store(true, Ordering::Release);
                }
                outcome
            });
        }

        let mut fetched = 0;
        let mut failed = 0;
        let mut fatal: Option<Error> = None;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(LinkOutcome::Fetched)) => fetched += 1,
                Ok(Ok(LinkOutcome::Failed)) => failed += 1,
                Ok(Err(e)) => {
                    tracing::error!("history failure, stopping workers: {e}");
                    join_set.abort_all();
                    fatal.get_or_insert(e);
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    tracing::error!("fetch worker panicked: {e}");
                    failed += 1;
                }
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok((fetched, failed)),
        }
    }
}

fn admitted_text(admitted: &[AdmittedLink], key: &str) -> String {
    admitted
        .iter()
        .find(|l| l.key == key)
        .map(|l| l.text.clone())
        .unwrap_or_default()
}
