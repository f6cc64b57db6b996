//! Durable link history, one JSON file per source.
//!
//! The history store is the cross-run half of the two-tier verdict cache:
//! the in-process memo lives with the validation batcher and falls back to
//! this store on a miss.

pub mod fingerprint;
pub mod store;

pub use fingerprint::{content_fingerprint, content_summary};
pub use store::{HistoryStore, LinkStatus, history_path, list_sources};
