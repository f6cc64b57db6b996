//! Homepage URL parsing.

/// Error type for homepage URL parsing failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Parse a configured homepage or fetch target into a fetchable URL.
///
/// Steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Require http(s) and a host
/// 4. Remove fragment (#...)
///
/// Unlike identity normalization the query string and `www.` are kept, since
/// the server may need them to answer.
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::MissingHost(trimmed.to_string()));
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("farmnews.example/latest").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("farmnews.example"));
        assert_eq!(url.path(), "/latest");
    }

    #[test]
    fn test_canonicalize_keeps_www_and_query() {
        let url = canonicalize("https://www.farmnews.example/list?page=2#top").unwrap();
        assert_eq!(url.as_str(), "https://www.farmnews.example/list?page=2");
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_canonicalize_invalid() {
        assert!(matches!(canonicalize("https://[::1"), Err(UrlError::InvalidUrl(_))));
    }
}
