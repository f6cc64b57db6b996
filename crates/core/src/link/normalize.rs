//! URL normalization into comparable identity keys.
//!
//! Normalization steps:
//! 1. Trim whitespace and resolve against the base URL
//! 2. Lowercase scheme and host, strip leading `www.`
//! 3. Drop default ports (80 for http, 443 for https)
//! 4. Remove trailing slashes (root `/` is kept)
//! 5. Remove fragment (#...)
//! 6. Drop the query string unless one of its keys looks article-identifying
//!
//! Normalization never fails: anything that does not parse comes back trimmed
//! but otherwise untouched. The output is a fixed point, normalizing it again
//! yields the same string.

use url::Url;

/// Query keys that some sites use as the only article discriminator.
pub const KEEP_QUERY_KEYWORDS: &[&str] = &["id", "article", "news", "post", "story", "p"];

/// Normalize `raw`, resolving it against `base` first when it is relative.
pub fn normalize(raw: &str, base: &Url) -> String {
    let trimmed = raw.trim();
    match base.join(trimmed) {
        Ok(url) => canonical(url),
        Err(e) => {
            tracing::trace!(raw = trimmed, error = %e, "url did not resolve, keeping raw form");
            trimmed.to_string()
        }
    }
}

/// Normalize an already-absolute URL.
pub fn normalize_absolute(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) => canonical(url),
        Err(_) => trimmed.to_string(),
    }
}

fn canonical(mut url: Url) -> String {
    url.set_fragment(None);

    // mailto:, javascript:, data: and friends have no host or path to clean up
    if url.cannot_be_a_base() {
        return url.to_string();
    }

    if let Some(host) = url.host_str().map(str::to_owned) {
        let lowered = host.to_ascii_lowercase();
        let stripped = strip_www(&lowered);
        if stripped != host.as_str() && url.set_host(Some(stripped)).is_err() {
            tracing::trace!(host = host.as_str(), "could not rewrite host");
        }
    }

    if let Some(port) = url.port()
        && Some(port) == default_port(url.scheme())
    {
        let _ = url.set_port(None);
    }

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        url.set_path(if trimmed.is_empty() { "/" } else { &trimmed });
    }

    match url.query() {
        Some(query) if !query.is_empty() && keeps_query(&url) => {}
        Some(_) => url.set_query(None),
        None => {}
    }

    url.to_string()
}

fn strip_www(host: &str) -> &str {
    let mut current = host;
    while let Some(rest) = current.strip_prefix("www.") {
        if rest.is_empty() || !rest.contains('.') {
            break;
        }
        current = rest;
    }
    current
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// A query survives when any key equals a keyword, or contains one of the
/// multi-letter keywords (`article_id`, `newsid`, ...).
fn keeps_query(url: &Url) -> bool {
    url.query_pairs().any(|(key, _)| {
        let key = key.to_ascii_lowercase();
        KEEP_QUERY_KEYWORDS
            .iter()
            .any(|kw| key == *kw || (kw.len() > 1 && key.contains(kw)))
    })
}
