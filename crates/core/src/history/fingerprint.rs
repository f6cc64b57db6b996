//! Content fingerprints and summaries for change detection.

use sha2::{Digest, Sha256};

/// Number of leading characters that feed the fingerprint.
const FINGERPRINT_CHARS: usize = 1000;

/// SHA-256 hex digest of the first 1000 characters of `content`.
///
/// Returns an empty string for empty content so callers never store a
/// fingerprint without content.
pub fn content_fingerprint(content: &str) -> String {
    let content = content.trim();
    if content.is_empty() {
        return String::new();
    }

    let head: String = content.chars().take(FINGERPRINT_CHARS).collect();
    let mut hasher = Sha256::new();
    hasher.update(head.as_bytes());
    hex::encode(hasher.finalize())
}

/// The first `max_chars` characters of `content`, with `...` when cut.
pub fn content_summary(content: &str, max_chars: usize) -> String {
    let content = content.trim();
    let mut chars = content.char_indices();
    match chars.nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
