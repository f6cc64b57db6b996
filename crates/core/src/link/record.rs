//! Per-link lifecycle records and their merge rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a link is in its lifecycle.
///
/// Legal moves: `New -> ValidationPending -> {Valid | Invalid}`,
/// `New -> Invalid` (candidate filter rejection) and `Valid -> ContentFetched`.
/// `Invalid` and `ContentFetched` are terminal unless an update explicitly
/// overrides the state machine (cold start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    New,
    ValidationPending,
    Valid,
    Invalid,
    ContentFetched,
}

impl LifecycleState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (a, b) if a == b => true,
            (New, ValidationPending | Invalid) => true,
            (ValidationPending, Valid | Invalid) => true,
            (Valid, ContentFetched) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Invalid | LifecycleState::ContentFetched)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::New => "new",
            LifecycleState::ValidationPending => "validation_pending",
            LifecycleState::Valid => "valid",
            LifecycleState::Invalid => "invalid",
            LifecycleState::ContentFetched => "content_fetched",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One distinct link, keyed by its normalized URL within a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub url: String,
    pub normalized_key: String,
    #[serde(default)]
    pub title: String,
    pub state: LifecycleState,
    #[serde(default)]
    pub validation_score: u8,
    #[serde(default)]
    pub validation_reason: String,
    #[serde(default)]
    pub content_length: usize,
    #[serde(default)]
    pub content_fingerprint: String,
    #[serde(default)]
    pub content_summary: String,
    #[serde(default)]
    pub crawl_count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub error_message: String,
}

impl LinkRecord {
    /// A fresh record in the `New` state.
    pub fn new(url: impl Into<String>, normalized_key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            normalized_key: normalized_key.into(),
            title: String::new(),
            state: LifecycleState::New,
            validation_score: 0,
            validation_reason: String::new(),
            content_length: 0,
            content_fingerprint: String::new(),
            content_summary: String::new(),
            crawl_count: 0,
            first_seen: now,
            last_updated: now,
            error_message: String::new(),
        }
    }

    /// Merge `update` into this record.
    ///
    /// Only non-empty strings and non-zero numbers overwrite known values.
    /// Returns false when the requested state change was illegal and ignored;
    /// the other fields are merged either way.
    pub fn apply(&mut self, update: &RecordUpdate, now: DateTime<Utc>) -> bool {
        let mut accepted = true;

        if let Some(next) = update.state {
            if update.override_state || self.state.can_transition_to(next) {
                self.state = next;
            } else {
                tracing::warn!(
                    url = %self.url,
                    from = %self.state,
                    to = %next,
                    "ignoring illegal lifecycle transition"
                );
                accepted = false;
            }
        }

        merge_text(&mut self.title, update.title.as_deref());
        merge_text(&mut self.validation_reason, update.validation_reason.as_deref());
        merge_text(&mut self.content_summary, update.content_summary.as_deref());

        if let Some(score) = update.validation_score
            && score > 0
        {
            self.validation_score = score.min(100);
        }

        if let Some(len) = update.content_length
            && len > 0
        {
            self.content_length = len;
        }

        if self.content_length > 0 {
            merge_text(&mut self.content_fingerprint, update.content_fingerprint.as_deref());
        }

        if update.clear_error {
            self.error_message.clear();
        }
        merge_text(&mut self.error_message, update.error_message.as_deref());

        if update.fetch_attempt {
            self.crawl_count += 1;
        }

        self.last_updated = now;
        accepted
    }
}

fn merge_text(slot: &mut String, incoming: Option<&str>) {
    if let Some(value) = incoming.map(str::trim)
        && !value.is_empty()
    {
        *slot = value.to_string();
    }
}

/// A partial update to a [`LinkRecord`].
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub title: Option<String>,
    pub state: Option<LifecycleState>,
    pub validation_score: Option<u8>,
    pub validation_reason: Option<String>,
    pub content_length: Option<usize>,
    pub content_fingerprint: Option<String>,
    pub content_summary: Option<String>,
    pub error_message: Option<String>,
    /// Counts as one content-fetch attempt (`crawl_count += 1`).
    pub fetch_attempt: bool,
    /// Bypass the lifecycle transition rules.
    pub override_state: bool,
    /// Drop the stored error before merging.
    pub clear_error: bool,
}

impl RecordUpdate {
    pub fn state(state: LifecycleState) -> Self {
        Self { state: Some(state), ..Default::default() }
    }

    /// A validation verdict: `Valid` or `Invalid` with score and reason.
    pub fn verdict(valid: bool, score: u8, reason: impl Into<String>) -> Self {
        let state = if valid { LifecycleState::Valid } else { LifecycleState::Invalid };
        Self {
            state: Some(state),
            validation_score: Some(score),
            validation_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    /// One failed content-fetch attempt.
    pub fn fetch_failure(error: impl Into<String>) -> Self {
        Self { error_message: Some(error.into()), fetch_attempt: true, ..Default::default() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn overriding(mut self) -> Self {
        self.override_state = true;
        self
    }
}
