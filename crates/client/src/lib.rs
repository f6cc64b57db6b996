//! Client side of newsgate.
//!
//! This crate provides the HTTP fetcher, the link validation oracle client,
//! content extraction and the pipeline that ties them to the history store.

pub mod extract;
pub mod fetch;
pub mod oracle;
pub mod pipeline;

pub use extract::{Candidate, ExtractionChain, ExtractionResult, ExtractionStrategy, Strategy, extract_links};
pub use fetch::{FetchClient, FetchConfig, FetchOptions, FetchedPage, PageFetcher};
pub use oracle::{AcceptAllOracle, ChatOracle, OracleError, OracleVerdict, ValidationOracle};
pub use pipeline::{Pipeline, PipelineSettings, RunSummary, SourceSummary, ValidationBatcher};
