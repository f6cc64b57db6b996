//! Link identity and admission.
//!
//! - [`normalize`] turns raw hrefs into identity keys.
//! - [`filter`] prunes obviously non-article URLs before validation.
//! - [`record`] holds the per-link lifecycle record and its merge rules.

pub mod filter;
pub mod normalize;
pub mod record;

pub use filter::{Rejection, admit, classify};
pub use normalize::{normalize, normalize_absolute};
pub use record::{LifecycleState, LinkRecord, RecordUpdate};
