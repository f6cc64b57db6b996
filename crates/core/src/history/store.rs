//! Durable per-source link history.
//!
//! Each source owns one JSON file `<dir>/<source>_links.json` mapping
//! normalized keys to [`LinkRecord`]s. The whole map is held in memory,
//! indexed by key, and flushed with write-to-temp then rename so a reader
//! sees either the previous or the complete new file.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::Error;
use crate::link::{LifecycleState, LinkRecord, RecordUpdate, normalize_absolute};

const HISTORY_SUFFIX: &str = "_links.json";

/// Path of the history file for `source` inside `dir`.
pub fn history_path(dir: &Path, source: &str) -> PathBuf {
    dir.join(format!("{source}{HISTORY_SUFFIX}"))
}

/// Source ids that have a history file in `dir`, sorted.
pub fn list_sources(dir: &Path) -> Result<Vec<String>, Error> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut sources = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::history_io(dir, e))? {
        let entry = entry.map_err(|e| Error::history_io(dir, e))?;
        let name = entry.file_name();
        if let Some(source) = name.to_str().and_then(|n| n.strip_suffix(HISTORY_SUFFIX)) {
            sources.push(source.to_string());
        }
    }
    sources.sort();
    Ok(sources)
}

/// Lifecycle answers for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub is_new: bool,
    pub is_invalid: bool,
    pub is_processed: bool,
}

/// In-memory view of one source's history plus its backing file.
#[derive(Debug)]
pub struct HistoryStore {
    source: String,
    path: PathBuf,
    records: HashMap<String, LinkRecord>,
    dirty: bool,
}

impl HistoryStore {
    /// Load the history for `source`. A missing file is a cold start and
    /// yields an empty store.
    pub fn load(dir: impl AsRef<Path>, source: &str) -> Result<Self, Error> {
        let path = history_path(dir.as_ref(), source);

        let records = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| Error::history_io(&path, e))?;
            let stored: HashMap<String, LinkRecord> = serde_json::from_slice(&bytes)
                .map_err(|e| Error::HistoryCorrupt { path: path.clone(), reason: e.to_string() })?;
            reindex(stored)
        } else {
            tracing::info!(source, path = %path.display(), "no history file, starting cold");
            HashMap::new()
        };

        tracing::debug!(source, records = records.len(), "history loaded");
        Ok(Self { source: source.to_string(), path, records, dirty: false })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for an absolute URL, looked up by its normalized key.
    pub fn get(&self, url: &str) -> Option<&LinkRecord> {
        self.records.get(&normalize_absolute(url))
    }

    pub fn get_by_key(&self, key: &str) -> Option<&LinkRecord> {
        self.records.get(key)
    }

    pub fn status(&self, url: &str) -> LinkStatus {
        match self.get(url) {
            None => LinkStatus { is_new: true, is_invalid: false, is_processed: false },
            Some(r) => LinkStatus {
                is_new: false,
                is_invalid: r.state == LifecycleState::Invalid,
                is_processed: r.state == LifecycleState::ContentFetched,
            },
        }
    }

    pub fn is_new(&self, url: &str) -> bool {
        self.status(url).is_new
    }

    pub fn is_invalid(&self, url: &str) -> bool {
        self.status(url).is_invalid
    }

    pub fn is_processed(&self, url: &str) -> bool {
        self.status(url).is_processed
    }

    /// Insert or merge a record for `url`.
    ///
    /// New records start in `New` and then receive the update, so
    /// `upsert(url, RecordUpdate::state(Invalid))` creates an invalid record.
    pub fn upsert(&mut self, url: &str, update: RecordUpdate) -> &LinkRecord {
        let key = normalize_absolute(url);
        let now = Utc::now();
        let record = self
            .records
            .entry(key.clone())
            .or_insert_with(|| LinkRecord::new(url.trim(), key, now));
        record.apply(&update, now);
        self.dirty = true;
        record
    }

    /// Whether there are updates not yet flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flush to disk atomically. A clean store is not rewritten.
    pub fn save(&mut self) -> Result<(), Error> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::history_io(parent, e))?;
        }

        let ordered: BTreeMap<&str, &LinkRecord> = self.records.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let encoded = serde_json::to_vec_pretty(&ordered)
            .map_err(|e| Error::HistoryCorrupt { path: self.path.clone(), reason: e.to_string() })?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = File::create(&temp_path).map_err(|e| Error::history_io(&temp_path, e))?;
        file.write_all(&encoded).map_err(|e| Error::history_io(&temp_path, e))?;
        file.sync_all().map_err(|e| Error::history_io(&temp_path, e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| Error::history_io(&self.path, e))?;

        self.dirty = false;
        tracing::debug!(source = %self.source, records = self.records.len(), "history flushed");
        Ok(())
    }

    pub fn records(&self) -> impl Iterator<Item = &LinkRecord> {
        self.records.values()
    }

    /// Record count per lifecycle state.
    pub fn counts_by_state(&self) -> BTreeMap<LifecycleState, usize> {
        let mut counts = BTreeMap::new();
        for record in self.records.values() {
            *counts.entry(record.state).or_insert(0) += 1;
        }
        counts
    }
}

/// Rebuild the index from stored records so keys always match the current
/// normalizer. Colliding entries keep the most recently updated record.
fn reindex(stored: HashMap<String, LinkRecord>) -> HashMap<String, LinkRecord> {
    let mut records: HashMap<String, LinkRecord> = HashMap::with_capacity(stored.len());
    for (_, mut record) in stored {
        let key = normalize_absolute(&record.url);
        record.normalized_key = key.clone();
        match records.get(&key) {
            Some(existing) if existing.last_updated >= record.last_updated => {}
            _ => {
                records.insert(key, record);
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::load(dir.path(), "farmnews").unwrap();
        assert!(store.is_empty());
        assert_eq!(store.path(), dir.path().join("farmnews_links.json"));
    }

    #[test]
    fn test_upsert_save_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::load(dir.path(), "farmnews").unwrap();
        store.upsert("https://example.com/a", RecordUpdate::state(LifecycleState::ValidationPending));
        store.upsert("https://example.com/a", RecordUpdate::verdict(true, 85, "article"));
        store.save().unwrap();

        let reloaded = HistoryStore::load(dir.path(), "farmnews").unwrap();
        let record = reloaded.get("https://example.com/a").unwrap();
        assert_eq!(record.state, LifecycleState::Valid);
        assert_eq!(record.validation_score, 85);
        assert_eq!(record.crawl_count, 0);
    }

    #[test]
    fn test_same_key_is_same_entity() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::load(dir.path(), "s").unwrap();
        store.upsert("https://www.example.com/a/", RecordUpdate::state(LifecycleState::Invalid));
        store.upsert("https://example.com/a#x", RecordUpdate::fetch_failure("boom"));

        assert_eq!(store.len(), 1);
        assert!(store.is_invalid("HTTPS://EXAMPLE.com/a"));
    }

    #[test]
    fn test_status_queries() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::load(dir.path(), "s").unwrap();
        assert!(store.is_new("https://example.com/a"));

        store.upsert("https://example.com/a", RecordUpdate::state(LifecycleState::ValidationPending));
        store.upsert("https://example.com/a", RecordUpdate::verdict(true, 70, "ok"));
        store.upsert("https://example.com/a", RecordUpdate::state(LifecycleState::ContentFetched));

        let status = store.status("https://example.com/a");
        assert!(!status.is_new);
        assert!(!status.is_invalid);
        assert!(status.is_processed);
    }

    #[test]
    fn test_keys_unique_after_many_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::load(dir.path(), "s").unwrap();
        for i in 0..50 {
            store.upsert(&format!("https://example.com/n/{}", i % 10), RecordUpdate::default());
            store.upsert(&format!("https://www.example.com/n/{}/", i % 10), RecordUpdate::default());
        }
        store.save().unwrap();

        let reloaded = HistoryStore::load(dir.path(), "s").unwrap();
        let keys: HashSet<&str> = reloaded.records().map(|r| r.normalized_key.as_str()).collect();
        assert_eq!(keys.len(), reloaded.len());
        assert_eq!(reloaded.len(), 10);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::load(dir.path(), "s").unwrap();
        store.upsert("https://example.com/a", RecordUpdate::default());
        store.save().unwrap();

        assert!(!dir.path().join("s_links.json.tmp").exists());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_corrupt_file_is_history_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("s_links.json"), b"{not json").unwrap();
        let err = HistoryStore::load(dir.path(), "s").unwrap_err();
        assert!(err.is_history_failure());
    }

    #[test]
    fn test_save_to_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").unwrap();

        let mut store = HistoryStore::load(&blocker, "s").unwrap();
        store.upsert("https://example.com/a", RecordUpdate::default());
        let err = store.save().unwrap_err();
        assert!(matches!(err, Error::HistoryIo { .. }));
    }

    #[test]
    fn test_list_sources() {
        let dir = tempfile::tempdir().unwrap();
        for source in ["beta", "alpha"] {
            let mut store = HistoryStore::load(dir.path(), source).unwrap();
            store.upsert("https://example.com/a", RecordUpdate::default());
            store.save().unwrap();
        }
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        assert_eq!(list_sources(dir.path()).unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_counts_by_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::load(dir.path(), "s").unwrap();
        store.upsert("https://example.com/a", RecordUpdate::state(LifecycleState::Invalid));
        store.upsert("https://example.com/b", RecordUpdate::state(LifecycleState::Invalid));
        store.upsert("https://example.com/c", RecordUpdate::state(LifecycleState::ValidationPending));

        let counts = store.counts_by_state();
        assert_eq!(counts.get(&LifecycleState::Invalid), Some(&2));
        assert_eq!(counts.get(&LifecycleState::ValidationPending), Some(&1));
    }
}
