//! Article files: extracted content with YAML frontmatter.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use newsgate_core::history::content_fingerprint;

/// One extracted article, ready to be written out.
#[derive(Debug, Clone)]
pub struct ArticleDoc<'a> {
    pub title: &'a str,
    pub source: &'a str,
    pub url: &'a str,
    pub publish_date: Option<&'a str>,
    pub strategy: &'a str,
    pub content: &'a str,
}

/// Render an article with frontmatter.
///
/// ```yaml
/// ---
/// title: <title>
/// source: <source id>
/// url: <article url>
/// publish_date: <as written on the page, or "unknown">
/// strategy: <extraction strategy>
/// fetched_at: <ISO8601 timestamp>
/// ---
/// <content>
/// ```
pub fn render_article(doc: &ArticleDoc<'_>, fetched_at: &DateTime<Utc>) -> String {
    let title = if doc.title.trim().is_empty() { "Untitled" } else { doc.title.trim() };

    format!(
        "---\ntitle: {title}\nsource: {source}\nurl: {url}\npublish_date: {date}\nstrategy: {strategy}\nfetched_at: {timestamp}\n---\n{content}\n",
        title = escape_yaml(title),
        source = doc.source,
        url = doc.url,
        date = escape_yaml(doc.publish_date.unwrap_or("unknown")),
        strategy = doc.strategy,
        timestamp = fetched_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        content = doc.content.trim()
    )
}

/// File the article for `key` is written to: `<dir>/<source>/<hash>.md`.
pub fn article_path(dir: &Path, source: &str, key: &str) -> PathBuf {
    let digest = content_fingerprint(key);
    let stem = digest.get(..16).unwrap_or(&digest);
    dir.join(source).join(format!("{stem}.md"))
}

/// Write `doc` under `dir`, replacing an earlier file for the same link.
pub fn write_article(dir: &Path, key: &str, doc: &ArticleDoc<'_>) -> std::io::Result<PathBuf> {
    let path = article_path(dir, doc.source, key);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, render_article(doc, &Utc::now()))?;
    Ok(path)
}

/// Escape special YAML characters in a string.
fn escape_yaml(s: &str) -> String {
    if s.contains('\n') || s.contains(':') && s.len() > 1 || s.starts_with(['"', '\'', '#', '-', '[', '{']) {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', " "))
    } else if s.is_empty() {
        "\"\"".to_string()
    } else {
        s.to_string()
    }
}
