//! Cheap syntactic admission rules applied before any oracle call.

use url::Url;

/// Path extensions that never point at an article page.
const SKIPPED_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "bmp", "tif", "tiff", "avif",
    // documents and archives
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip", "rar", "7z", "tar", "gz", "tgz", "bz2",
    // stylesheets and scripts
    "css", "js", "mjs", "map", "json", "xml", "rss",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // audio and video
    "mp3", "mp4", "m4a", "wav", "ogg", "avi", "mov", "webm", "flv",
];

/// Why the candidate filter turned a link away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Empty href or a same-page anchor.
    Empty,
    /// `javascript:`, `mailto:`, `tel:` or any other non-http(s) protocol.
    Protocol,
    /// Static asset, archive, font or media file.
    Extension,
    /// Host differs from the homepage host.
    CrossDomain,
    /// Href could not be resolved against the homepage.
    Unresolvable,
}

impl Rejection {
    /// Human readable reason stored as the record's validation reason.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Empty => "rejected by candidate filter: empty or anchor link",
            Rejection::Protocol => "rejected by candidate filter: unsupported protocol",
            Rejection::Extension => "rejected by candidate filter: non-document extension",
            Rejection::CrossDomain => "rejected by candidate filter: cross-domain link",
            Rejection::Unresolvable => "rejected by candidate filter: unresolvable link",
        }
    }
}

/// Classify `raw` against the homepage `base`, returning the resolved URL
/// when admitted.
///
/// Rules run in order: empty/anchor/special protocol, extension, host.
pub fn classify(raw: &str, base: &Url) -> Result<Url, Rejection> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Err(Rejection::Empty);
    }

    let lowered = trimmed.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:"].iter().any(|p| lowered.starts_with(p)) {
        return Err(Rejection::Protocol);
    }

    let resolved = base.join(trimmed).map_err(|_| Rejection::Unresolvable)?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return Err(Rejection::Protocol);
    }

    if has_skipped_extension(resolved.path()) {
        return Err(Rejection::Extension);
    }

    if !same_host(&resolved, base) {
        return Err(Rejection::CrossDomain);
    }

    Ok(resolved)
}

/// Whether `raw` passes the candidate filter for homepage `base`.
pub fn admit(raw: &str, base: &Url) -> bool {
    classify(raw, base).is_ok()
}

fn has_skipped_extension(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            SKIPPED_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// Hosts compare after lowercasing and dropping a leading `www.`, matching
/// how identity keys are built.
fn same_host(candidate: &Url, base: &Url) -> bool {
    fn bare(url: &Url) -> Option<String> {
        url.host_str().map(|h| {
            let h = h.to_ascii_lowercase();
            h.strip_prefix("www.").map(str::to_string).unwrap_or(h)
        })
    }

    match (bare(candidate), bare(base)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.agri-news.example/").unwrap()
    }

    #[test]
    fn test_admit_same_domain_article() {
        assert!(admit("/news/2024/05/harvest-report", &base()));
        assert!(admit("https://agri-news.example/story?id=5", &base()));
    }

    #[test]
    fn test_reject_empty_and_anchor() {
        assert_eq!(classify("", &base()), Err(Rejection::Empty));
        assert_eq!(classify("   ", &base()), Err(Rejection::Empty));
        assert_eq!(classify("#top", &base()), Err(Rejection::Empty));
    }

    #[test]
    fn test_reject_special_protocols() {
        assert_eq!(classify("javascript:void(0)", &base()), Err(Rejection::Protocol));
        assert_eq!(classify("mailto:desk@agri-news.example", &base()), Err(Rejection::Protocol));
        assert_eq!(classify("TEL:+123456", &base()), Err(Rejection::Protocol));
        assert_eq!(classify("ftp://agri-news.example/file", &base()), Err(Rejection::Protocol));
    }

    #[test]
    fn test_reject_extensions() {
        assert_eq!(classify("/img/photo.JPG", &base()), Err(Rejection::Extension));
        assert_eq!(classify("/static/site.css", &base()), Err(Rejection::Extension));
        assert_eq!(classify("/files/report.pdf", &base()), Err(Rejection::Extension));
        assert_eq!(classify("/fonts/a.woff2", &base()), Err(Rejection::Extension));
        assert!(admit("/news/article.html", &base()));
        assert!(admit("/news/v1.2/story", &base()));
    }

    #[test]
    fn test_reject_cross_domain() {
        assert_eq!(classify("https://other.example/news/1", &base()), Err(Rejection::CrossDomain));
        assert_eq!(classify("https://sub.agri-news.example/news/1", &base()), Err(Rejection::CrossDomain));
    }

    #[test]
    fn test_rejection_order_extension_before_host() {
        assert_eq!(classify("https://cdn.other.example/logo.png", &base()), Err(Rejection::Extension));
    }

    #[test]
    fn test_www_variants_are_same_host() {
        assert!(admit("https://agri-news.example/news/1", &base()));
        assert!(admit("https://WWW.agri-news.example/news/1", &base()));
    }

    #[test]
    fn test_rejection_reason_text() {
        assert!(Rejection::CrossDomain.reason().contains("cross-domain"));
    }
}
