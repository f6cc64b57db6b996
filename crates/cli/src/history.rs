//! `history export` and `history show`.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use newsgate_core::history::list_sources;
use newsgate_core::{HistoryStore, LifecycleState, LinkRecord};

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    source: &'a str,
    url: &'a str,
    normalized_key: &'a str,
    title: &'a str,
    state: &'static str,
    validation_score: u8,
    validation_reason: &'a str,
    content_length: usize,
    content_fingerprint: &'a str,
    crawl_count: u32,
    first_seen: String,
    last_updated: String,
    error_message: &'a str,
}

impl<'a> ExportRow<'a> {
    fn new(source: &'a str, record: &'a LinkRecord) -> Self {
        Self {
            source,
            url: &record.url,
            normalized_key: &record.normalized_key,
            title: &record.title,
            state: record.state.as_str(),
            validation_score: record.validation_score,
            validation_reason: &record.validation_reason,
            content_length: record.content_length,
            content_fingerprint: &record.content_fingerprint,
            crawl_count: record.crawl_count,
            first_seen: record.first_seen.to_rfc3339(),
            last_updated: record.last_updated.to_rfc3339(),
            error_message: &record.error_message,
        }
    }
}

/// Dump every history store under `dir` into one CSV. Returns the row count.
pub fn export(dir: &Path, out: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(out).with_context(|| format!("creating {}", out.display()))?;
    let mut rows = 0;

    for source in list_sources(dir)? {
        let store = HistoryStore::load(dir, &source)?;
        let mut records: Vec<&LinkRecord> = store.records().collect();
        records.sort_by(|a, b| a.normalized_key.cmp(&b.normalized_key));

        for record in records {
            writer.serialize(ExportRow::new(&source, record))?;
            rows += 1;
        }
        tracing::debug!(source, records = store.len(), "exported history");
    }

    writer.flush()?;
    Ok(rows)
}

/// Write lifecycle counts for `source` as `state<TAB>count` lines.
pub fn show(dir: &Path, source: &str, out: &mut impl Write) -> Result<()> {
    let store = HistoryStore::load(dir, source)?;
    let counts = store.counts_by_state();

    for state in [
        LifecycleState::New,
        LifecycleState::ValidationPending,
        LifecycleState::Valid,
        LifecycleState::Invalid,
        LifecycleState::ContentFetched,
    ] {
        writeln!(out, "{}\t{}", state, counts.get(&state).copied().unwrap_or(0))?;
    }
    writeln!(out, "total\t{}", store.len())?;
    Ok(())
}
