//! Batched link validation with a two-tier verdict cache.
//!
//! Lookups go to the in-run memo first and fall back to the history store.
//! Whatever is left is sent to the oracle in fixed-size batches. Each batch
//! is marked `ValidationPending`, scored, recorded and flushed before the
//! next one starts, so a crash loses at most one batch of verdicts.
//!
//! Degradation:
//! - oracle unreachable for a batch: every item defaults to valid
//! - malformed batch answer, or items missing from it: one call per item
//! - a per-item call that fails: that item defaults to valid

use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

use newsgate_core::link::normalize_absolute;
use newsgate_core::{Error, HistoryStore, LifecycleState, RecordUpdate};

use crate::oracle::{LinkQuery, OracleVerdict, ValidationOracle};

/// History store shared between the batcher and the fetch workers.
pub type SharedHistory = Arc<Mutex<HistoryStore>>;

/// Reason recorded for links accepted because the oracle could not answer.
pub const ORACLE_DEFAULT_REASON: &str = "oracle unavailable, defaulted";

/// A link that passed the candidate filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmittedLink {
    /// Absolute URL.
    pub url: String,
    pub key: String,
    /// Anchor text from the homepage.
    pub text: String,
}

/// Where a verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictOrigin {
    Memo,
    History,
    Oracle,
    Defaulted,
}

/// Validation outcome for one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub url: String,
    pub key: String,
    pub valid: bool,
    pub score: u8,
    pub reason: String,
    pub origin: VerdictOrigin,
}

impl Verdict {
    fn from_oracle(link: &AdmittedLink, verdict: OracleVerdict) -> Self {
        Self {
            url: link.url.clone(),
            key: link.key.clone(),
            valid: verdict.is_valid,
            score: verdict.score,
            reason: verdict.reason,
            origin: VerdictOrigin::Oracle,
        }
    }

    fn defaulted(link: &AdmittedLink) -> Self {
        Self {
            url: link.url.clone(),
            key: link.key.clone(),
            valid: true,
            score: 0,
            reason: ORACLE_DEFAULT_REASON.to_string(),
            origin: VerdictOrigin::Defaulted,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self.origin, VerdictOrigin::Memo | VerdictOrigin::History)
    }
}

/// Groups admitted links into oracle batches and caches the verdicts.
pub struct ValidationBatcher {
    oracle: Arc<dyn ValidationOracle>,
    batch_size: usize,
    oracle_timeout: Duration,
    cold_start: bool,
    memo: HashMap<String, Verdict>,
}

impl ValidationBatcher {
    pub fn new(oracle: Arc<dyn ValidationOracle>, batch_size: usize, oracle_timeout: Duration) -> Self {
        Self { oracle, batch_size: batch_size.max(1), oracle_timeout, cold_start: false, memo: HashMap::new() }
    }

    /// Ignore verdicts stored by earlier runs and re-validate.
    pub fn cold_start(mut self, cold_start: bool) -> Self {
        self.cold_start = cold_start;
        self
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Cached verdict for `link`: memo first, then the history store.
    pub fn cached(&self, link: &AdmittedLink, store: &HistoryStore) -> Option<Verdict> {
        if let Some(hit) = self.memo.get(&link.key) {
            return Some(Verdict { origin: VerdictOrigin::Memo, ..hit.clone() });
        }
        if self.cold_start {
            return None;
        }

        let record = store.get_by_key(&link.key)?;
        let valid = match record.state {
            LifecycleState::Valid | LifecycleState::ContentFetched => true,
            LifecycleState::Invalid => false,
            LifecycleState::New | LifecycleState::ValidationPending => return None,
        };
        Some(Verdict {
            url: link.url.clone(),
            key: link.key.clone(),
            valid,
            score: record.validation_score,
            reason: record.validation_reason.clone(),
            origin: VerdictOrigin::History,
        })
    }

    /// Validate `links`, returning one verdict per link.
    ///
    /// Only history failures are returned as errors; oracle trouble always
    /// degrades to a verdict.
    pub async fn validate(
        &mut self, links: &[AdmittedLink], base_url: &Url, history: &SharedHistory,
    ) -> Result<Vec<Verdict>, Error> {
        let mut verdicts = Vec::with_capacity(links.len());
        let mut pending = Vec::new();

        {
            let store = history.lock().await;
            for link in links {
                match self.cached(link, &store) {
                    Some(hit) => {
                        tracing::debug!(url = %link.url, valid = hit.valid, origin = ?hit.origin, "cached verdict");
                        verdicts.push(hit);
                    }
                    None => pending.push(link.clone()),
                }
            }
        }

        if pending.is_empty() {
            return Ok(verdicts);
        }

        let batch_count = pending.len().div_ceil(self.batch_size);
        tracing::info!(links = pending.len(), batches = batch_count, "validating with oracle");

        for (index, batch) in pending.chunks(self.batch_size).enumerate() {
            {
                let mut store = history.lock().await;
                for link in batch {
                    let update = self.guarded(RecordUpdate::state(LifecycleState::ValidationPending).with_title(&link.text));
                    store.upsert(&link.url, update);
                }
            }

            tracing::debug!(batch = index + 1, of = batch_count, size = batch.len(), "oracle batch");
            let scored = self.score_batch(batch, base_url).await;

            {
                let mut store = history.lock().await;
                for verdict in &scored {
                    let update = self.guarded(RecordUpdate::verdict(verdict.valid, verdict.score, &verdict.reason));
                    store.upsert(&verdict.url, update);
                }
                store.save()?;
            }

            for verdict in scored {
                tracing::debug!(url = %verdict.url, valid = verdict.valid, score = verdict.score, origin = ?verdict.origin, "verdict");
                self.memo.insert(verdict.key.clone(), verdict.clone());
                verdicts.push(verdict);
            }
        }

        Ok(verdicts)
    }

    fn guarded(&self, update: RecordUpdate) -> RecordUpdate {
        if self.cold_start { update.overriding() } else { update }
    }

    /// Score one batch, degrading as described in the module docs.
    async fn score_batch(&self, batch: &[AdmittedLink], base_url: &Url) -> Vec<Verdict> {
        let queries: Vec<LinkQuery> = batch.iter().map(|l| LinkQuery::new(&l.url, &l.text)).collect();

        let outcome = tokio::time::timeout(self.oracle_timeout, self.oracle.score_links(&queries, base_url))
            .await
            .unwrap_or_else(|_| Err(Error::OracleUnavailable(format!("no answer within {:?}", self.oracle_timeout))));

        match outcome {
            Ok(answers) => {
                let mut by_key: HashMap<String, OracleVerdict> =
                    answers.into_iter().map(|v| (normalize_absolute(&v.url), v)).collect();

                let mut scored = Vec::with_capacity(batch.len());
                let mut missing = Vec::new();
                for link in batch {
                    match by_key.remove(&link.key) {
                        Some(answer) => scored.push(Verdict::from_oracle(link, answer)),
                        None => missing.push(link.clone()),
                    }
                }

                if !missing.is_empty() {
                    tracing::debug!(missing = missing.len(), "batch answer skipped links, asking one by one");
                    scored.extend(self.score_each(&missing, base_url).await);
                }
                scored
            }
            Err(Error::MalformedOracleResponse(e)) if batch.len() > 1 => {
                tracing::warn!("malformed batch answer, falling back to per-link calls: {e}");
                self.score_each(batch, base_url).await
            }
            Err(e) => {
                tracing::warn!(links = batch.len(), "oracle failed, defaulting batch to valid: {e}");
                batch.iter().map(Verdict::defaulted).collect()
            }
        }
    }

    /// One oracle call per link, issued concurrently.
    async fn score_each(&self, links: &[AdmittedLink], base_url: &Url) -> Vec<Verdict> {
        let calls = links.iter().map(|link| async move {
            let query = LinkQuery::new(&link.url, &link.text);
            let outcome = tokio::time::timeout(self.oracle_timeout, self.oracle.score_link(&query, base_url)).await;
            match outcome {
                Ok(Ok(answer)) => Verdict::from_oracle(link, answer),
                Ok(Err(e)) => {
                    tracing::warn!(url = %link.url, "oracle failed for link, defaulting to valid: {e}");
                    Verdict::defaulted(link)
                }
                Err(_) => {
                    tracing::warn!(url = %link.url, "oracle timed out for link, defaulting to valid");
                    Verdict::defaulted(link)
                }
            }
        });
        join_all(calls).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn base() -> Url {
        Url::parse("https://farmnews.example/").unwrap()
    }

    fn link(path: &str) -> AdmittedLink {
        let url = format!("https://farmnews.example{path}");
        AdmittedLink { key: normalize_absolute(&url), url, text: format!("Story {path}") }
    }

    fn shared(dir: &std::path::Path) -> SharedHistory {
        Arc::new(Mutex::new(HistoryStore::load(dir, "farmnews").unwrap()))
    }

    #[derive(Clone, Copy)]
    enum Mode {
        Scores,
        Unavailable,
        MalformedBatch,
        Reversed,
        DropsLast,
    }

    struct MockOracle {
        mode: Mode,
        batch_calls: AtomicUsize,
        item_calls: AtomicUsize,
        seen: std::sync::Mutex<Vec<String>>,
    }

    impl MockOracle {
        fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                mode,
                batch_calls: AtomicUsize::new(0),
                item_calls: AtomicUsize::new(0),
                seen: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn answer(query: &LinkQuery) -> OracleVerdict {
            let valid = query.url.contains("/news/");
            OracleVerdict {
                url: query.url.clone(),
                score: if valid { 85 } else { 20 },
                is_valid: valid,
                reason: if valid { "article".into() } else { "section".into() },
            }
        }
    }

    #[async_trait]
    impl ValidationOracle for MockOracle {
        async fn score_links(&self, batch: &[LinkQuery], _: &Url) -> Result<Vec<OracleVerdict>, Error> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().extend(batch.iter().map(|q| q.url.clone()));
            match self.mode {
                Mode::Scores => Ok(batch.iter().map(Self::answer).collect()),
                Mode::Unavailable => Err(Error::OracleUnavailable("connection refused".into())),
                Mode::MalformedBatch => Err(Error::MalformedOracleResponse("expected array".into())),
                Mode::Reversed => Ok(batch.iter().rev().map(Self::answer).collect()),
                Mode::DropsLast => Ok(batch[..batch.len() - 1].iter().map(Self::answer).collect()),
            }
        }

        async fn score_link(&self, query: &LinkQuery, _: &Url) -> Result<OracleVerdict, Error> {
            self.item_calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::Unavailable => Err(Error::OracleUnavailable("connection refused".into())),
                _ => Ok(Self::answer(query)),
            }
        }
    }

    fn batcher(oracle: Arc<MockOracle>, size: usize) -> ValidationBatcher {
        ValidationBatcher::new(oracle, size, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_batches_of_fixed_size() {
        let dir = tempfile::tempdir().unwrap();
        let history = shared(dir.path());
        let oracle = MockOracle::new(Mode::Scores);
        let links: Vec<_> = (0..7).map(|i| link(&format!("/news/{i}"))).collect();

        let verdicts = batcher(oracle.clone(), 5).validate(&links, &base(), &history).await.unwrap();

        assert_eq!(verdicts.len(), 7);
        assert_eq!(oracle.batch_calls.load(Ordering::SeqCst), 2);
        assert!(verdicts.iter().all(|v| v.valid && v.origin == VerdictOrigin::Oracle));

        let store = history.lock().await;
        assert!(!store.is_dirty());
        assert_eq!(store.get("https://farmnews.example/news/3").unwrap().state, LifecycleState::Valid);
    }

    #[tokio::test]
    async fn test_matches_by_url_not_position() {
        let dir = tempfile::tempdir().unwrap();
        let history = shared(dir.path());
        let links = vec![link("/news/a"), link("/markets"), link("/news/b")];

        let verdicts = batcher(MockOracle::new(Mode::Reversed), 5)
            .validate(&links, &base(), &history)
            .await
            .unwrap();

        let markets = verdicts.iter().find(|v| v.url.ends_with("/markets")).unwrap();
        assert!(!markets.valid);
        assert_eq!(markets.score, 20);
        let story = verdicts.iter().find(|v| v.url.ends_with("/news/a")).unwrap();
        assert!(story.valid);
        assert_eq!(story.score, 85);
    }

    #[tokio::test]
    async fn test_unavailable_oracle_defaults_batch_to_valid() {
        let dir = tempfile::tempdir().unwrap();
        let history = shared(dir.path());
        let links = vec![link("/markets"), link("/about"), link("/news/1")];

        let verdicts = batcher(MockOracle::new(Mode::Unavailable), 5)
            .validate(&links, &base(), &history)
            .await
            .unwrap();

        assert_eq!(verdicts.len(), 3);
        for verdict in &verdicts {
            assert!(verdict.valid);
            assert!(verdict.reason.contains("oracle unavailable"));
            assert_eq!(verdict.origin, VerdictOrigin::Defaulted);
        }

        let store = history.lock().await;
        let record = store.get("https://farmnews.example/markets").unwrap();
        assert_eq!(record.state, LifecycleState::Valid);
        assert!(record.validation_reason.contains("oracle unavailable"));
    }

    #[tokio::test]
    async fn test_malformed_batch_falls_back_per_item() {
        let dir = tempfile::tempdir().unwrap();
        let history = shared(dir.path());
        let oracle = MockOracle::new(Mode::MalformedBatch);
        let links = vec![link("/news/1"), link("/markets"), link("/news/2")];

        let verdicts = batcher(oracle.clone(), 5).validate(&links, &base(), &history).await.unwrap();

        assert_eq!(oracle.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(oracle.item_calls.load(Ordering::SeqCst), 3);
        assert_eq!(verdicts.iter().filter(|v| v.valid).count(), 2);
        assert!(verdicts.iter().all(|v| v.origin == VerdictOrigin::Oracle));
    }

    #[tokio::test]
    async fn test_missing_answers_asked_individually() {
        let dir = tempfile::tempdir().unwrap();
        let history = shared(dir.path());
        let oracle = MockOracle::new(Mode::DropsLast);
        let links = vec![link("/news/1"), link("/news/2")];

        let verdicts = batcher(oracle.clone(), 5).validate(&links, &base(), &history).await.unwrap();

        assert_eq!(verdicts.len(), 2);
        assert_eq!(oracle.item_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_verdicts_short_circuit() {
        let dir = tempfile::tempdir().unwrap();
        let history = shared(dir.path());
        {
            let mut store = history.lock().await;
            store.upsert("https://farmnews.example/tag/wheat", RecordUpdate::state(LifecycleState::Invalid));
            store.upsert("https://farmnews.example/news/old", RecordUpdate::state(LifecycleState::ValidationPending));
            store.upsert("https://farmnews.example/news/old", RecordUpdate::verdict(true, 90, "article"));
        }
        let oracle = MockOracle::new(Mode::Scores);
        let links = vec![link("/tag/wheat"), link("/news/old"), link("/news/new")];

        let verdicts = batcher(oracle.clone(), 5).validate(&links, &base(), &history).await.unwrap();

        assert_eq!(*oracle.seen.lock().unwrap(), vec!["https://farmnews.example/news/new".to_string()]);
        let tag = verdicts.iter().find(|v| v.url.ends_with("/tag/wheat")).unwrap();
        assert!(!tag.valid);
        assert_eq!(tag.origin, VerdictOrigin::History);
        let old = verdicts.iter().find(|v| v.url.ends_with("/news/old")).unwrap();
        assert_eq!(old.score, 90);
    }

    #[tokio::test]
    async fn test_memo_serves_repeat_validation() {
        let dir = tempfile::tempdir().unwrap();
        let history = shared(dir.path());
        let oracle = MockOracle::new(Mode::Scores);
        let mut batcher = batcher(oracle.clone(), 5).cold_start(true);
        let links = vec![link("/news/1")];

        batcher.validate(&links, &base(), &history).await.unwrap();
        let again = batcher.validate(&links, &base(), &history).await.unwrap();

        assert_eq!(oracle.item_calls.load(Ordering::SeqCst) + oracle.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(again[0].origin, VerdictOrigin::Memo);
        assert_eq!(batcher.memo_len(), 1);
    }

    #[tokio::test]
    async fn test_cold_start_revalidates_invalid_links() {
        let dir = tempfile::tempdir().unwrap();
        let history = shared(dir.path());
        {
            let mut store = history.lock().await;
            store.upsert("https://farmnews.example/news/1", RecordUpdate::state(LifecycleState::Invalid));
        }
        let oracle = MockOracle::new(Mode::Scores);

        let verdicts = batcher(oracle.clone(), 5)
            .cold_start(true)
            .validate(&[link("/news/1")], &base(), &history)
            .await
            .unwrap();

        assert!(verdicts[0].valid);
        let store = history.lock().await;
        assert_eq!(store.get("https://farmnews.example/news/1").unwrap().state, LifecycleState::Valid);
    }
}
