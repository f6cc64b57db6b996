//! Content extraction.
//!
//! ### Link discovery
//! - [`extract_links`] harvests candidate `<a href>` links from a homepage.
//!
//! ### Extraction fallback chain
//! - [`ExtractionChain`] tries filtered Markdown, raw Markdown, article
//!   container selectors and whole-document text, in that order.
//! - Each result carries the strategy that produced it.
//!
//! ### Output
//! - Markdown renderings come from Lectito ([`markdown`]).
//! - Articles can be written to disk with YAML frontmatter ([`article`]).

pub mod article;
pub mod chain;
pub mod links;
pub mod markdown;
pub mod metadata;

pub use article::{ArticleDoc, render_article, write_article};
pub use chain::{ExtractionChain, ExtractionResult, ExtractionStrategy, PLACEHOLDER_CONTENT, Strategy};
pub use links::{Candidate, extract_links};
pub use markdown::{Renderings, render_markdown};
pub use metadata::{extract_publish_date, extract_title};
