//! Append-only run report, one row per recorded link.

use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use crate::Error;
use crate::link::LinkRecord;

/// Final outcome of a link's fetch/extract traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Failed,
}

/// One report row.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub index: usize,
    pub source: String,
    pub url: String,
    pub title: String,
    pub publish_date: String,
    pub content_length: usize,
    /// Wall time spent on the link, in seconds.
    pub duration: f64,
    pub status: ReportStatus,
    pub retry_count: u32,
    pub validation_score: u8,
    pub validation_reason: String,
    pub strategy_used: String,
    pub error_message: String,
}

impl ReportRow {
    /// Row pre-filled from the link's history record.
    pub fn from_record(index: usize, source: &str, record: &LinkRecord, status: ReportStatus) -> Self {
        Self {
            index,
            source: source.to_string(),
            url: record.url.clone(),
            title: record.title.clone(),
            publish_date: String::new(),
            content_length: record.content_length,
            duration: 0.0,
            status,
            retry_count: 0,
            validation_score: record.validation_score,
            validation_reason: record.validation_reason.clone(),
            strategy_used: String::new(),
            error_message: if status == ReportStatus::Failed { record.error_message.clone() } else { String::new() },
        }
    }
}

/// Consumer of report rows.
pub trait ReportSink: Send + Sync {
    fn append(&self, row: &ReportRow) -> Result<(), Error>;
}

/// CSV report file. Appends to an existing file; headers are written only
/// when the file is created.
pub struct CsvReportSink {
    writer: Mutex<csv::Writer<File>>,
}

impl CsvReportSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let existing = path.metadata().map(|m| m.len() > 0).unwrap_or(false);

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::Report(format!("{}: {e}", parent.display())))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::Report(format!("{}: {e}", path.display())))?;

        let writer = csv::WriterBuilder::new().has_headers(!existing).from_writer(file);
        Ok(Self { writer: Mutex::new(writer) })
    }
}

impl ReportSink for CsvReportSink {
    fn append(&self, row: &ReportRow) -> Result<(), Error> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::Report("report writer lock poisoned".into()))?;
        writer.serialize(row)?;
        writer.flush().map_err(|e| Error::Report(e.to_string()))?;
        Ok(())
    }
}

/// Report sink that keeps rows in memory.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    rows: Mutex<Vec<ReportRow>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<ReportRow> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }
}

impl ReportSink for MemoryReportSink {
    fn append(&self, row: &ReportRow) -> Result<(), Error> {
        self.rows
            .lock()
            .map_err(|_| Error::Report("memory sink lock poisoned".into()))?
            .push(row.clone());
        Ok(())
    }
}
