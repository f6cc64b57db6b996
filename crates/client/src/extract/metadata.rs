//! Title and publish-date extraction from article HTML.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

const TITLE_SEPARATORS: &[&str] = &[" | ", " - ", " – ", " — ", " : ", " · ", " • "];

const TITLE_META: &[&str] = &["og:title", "twitter:title", "dc.title"];

const DATE_META: &[&str] = &[
    "article:published_time",
    "datepublished",
    "publisheddate",
    "pubdate",
    "date",
    "dc.date",
    "article:modified_time",
    "lastmodified",
    "og:published_time",
    "og:updated_time",
    "datecreated",
    "datemodified",
    "release_date",
];

const DATE_SELECTORS: &[&str] = &[
    "[itemprop=\"datePublished\"]",
    ".publish-date",
    ".article-date",
    ".post-date",
    ".entry-date",
    ".published",
    ".post-meta time",
    ".article-meta time",
    ".article-time",
    ".release-date",
    ".create-date",
    ".updated-date",
    ".timestamp",
    ".date",
    ".time",
];

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn meta_content<'a>(doc: &'a Html, names: &[&str]) -> Option<&'a str> {
    let sel = selector("meta")?;
    doc.select(&sel).find_map(|meta| {
        let attrs = meta.value();
        let name = attrs.attr("property").or_else(|| attrs.attr("name"))?;
        let name = name.to_ascii_lowercase();
        if !names.contains(&name.as_str()) {
            return None;
        }
        attrs.attr("content").map(str::trim).filter(|c| !c.is_empty())
    })
}

/// Best-effort article title.
///
/// Order: `<title>` (site suffix removed), first heading inside the main
/// content area, longest `h1`/`h2`, title meta tags, humanized URL slug.
pub fn extract_title(doc: &Html, url: &Url) -> Option<String> {
    if let Some(title) = selector("title")
        .and_then(|sel| doc.select(&sel).next())
        .map(element_text)
        .filter(|t| !t.is_empty())
    {
        return Some(strip_site_name(&title));
    }

    for heading in ["h1", "h2"] {
        let Some(heading_sel) = selector(heading) else { continue };
        let content_area = ["main", "article", "[class*=\"content\"]", "[class*=\"article\"]"]
            .iter()
            .filter_map(|css| selector(css))
            .find_map(|sel| doc.select(&sel).next());

        if let Some(area) = content_area
            && let Some(text) = area.select(&heading_sel).map(element_text).find(|t| !t.is_empty())
        {
            return Some(text);
        }

        if let Some(longest) = doc.select(&heading_sel).map(element_text).max_by_key(|t| t.chars().count())
            && !longest.is_empty()
        {
            return Some(longest);
        }
    }

    if let Some(meta) = meta_content(doc, TITLE_META) {
        return Some(meta.to_string());
    }

    title_from_slug(url)
}

fn strip_site_name(title: &str) -> String {
    for separator in TITLE_SEPARATORS {
        if let Some((head, _)) = title.split_once(separator)
            && head.chars().count() > 10
        {
            return head.trim().to_string();
        }
    }
    title.trim().to_string()
}

fn title_from_slug(url: &Url) -> Option<String> {
    let last = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let stem = last.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(last);
    let words = stem.replace(['-', '_'], " ");
    let words = words.trim();
    if words.chars().count() <= 5 {
        return None;
    }
    let mut chars = words.chars();
    chars.next().map(|first| first.to_uppercase().chain(chars).collect())
}

fn date_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"\d{4}-\d{2}-\d{2}",
            r"\d{4}年\d{1,2}月\d{1,2}日",
            r"\d{2}/\d{2}/\d{4}",
            r"\d{2}\.\d{2}\.\d{4}",
            r"(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},\s+\d{4}",
            r"\d{1,2}\s+(?:January|February|March|April|May|June|July|August|September|October|November|December),?\s+\d{4}",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn label_prefix() -> Option<&'static Regex> {
    static LABEL: OnceLock<Option<Regex>> = OnceLock::new();
    LABEL
        .get_or_init(|| Regex::new(r"(?i)^(published|updated|posted|date)\s*:?\s*").ok())
        .as_ref()
}

/// Best-effort publish date, as written on the page.
///
/// Order: date meta tags, `<time datetime>` / `<time>` text, date-class
/// elements, then the first date-looking string in the page text.
pub fn extract_publish_date(doc: &Html) -> Option<String> {
    if let Some(meta) = meta_content(doc, DATE_META) {
        return Some(meta.to_string());
    }

    if let Some(sel) = selector("time") {
        for time in doc.select(&sel) {
            if let Some(dt) = time.value().attr("datetime").map(str::trim).filter(|d| !d.is_empty()) {
                return Some(dt.to_string());
            }
            let text = element_text(time);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }

    for css in DATE_SELECTORS {
        if let Some(el) = selector(css).and_then(|sel| doc.select(&sel).next()) {
            let text = element_text(el);
            let text = match label_prefix() {
                Some(re) => re.replace(&text, "").trim().to_string(),
                None => text,
            };
            if !text.is_empty() {
                return Some(text);
            }
        }
    }

    let body_text = selector("body")
        .and_then(|sel| doc.select(&sel).next())
        .map(element_text)
        .unwrap_or_default();
    date_patterns()
        .iter()
        .find_map(|re| re.find(&body_text).map(|m| m.as_str().to_string()))
}
