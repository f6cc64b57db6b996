//! Core types and shared functionality for newsgate.
//!
//! This crate provides:
//! - URL normalization and candidate filtering
//! - Link lifecycle records and the durable per-source history store
//! - Unified error types
//! - Configuration structures
//! - Report rows and sinks

pub mod config;
pub mod error;
pub mod history;
pub mod link;
pub mod report;

pub use config::{AppConfig, ConfigError, OracleConfig, SourceConfig};
pub use error::Error;
pub use history::HistoryStore;
pub use link::{LifecycleState, LinkRecord, RecordUpdate};
pub use report::{CsvReportSink, MemoryReportSink, ReportRow, ReportSink, ReportStatus};
