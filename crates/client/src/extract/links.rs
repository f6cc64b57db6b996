//! Candidate link discovery from a homepage.

use newsgate_core::link::normalize;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// A harvested link: the href as written, its identity key and link text.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Candidate {
    /// Href exactly as it appears in the page (trimmed)
    pub href: String,
    /// Normalized identity key (resolved against the page URL)
    pub key: String,
    /// Link text content, empty when the anchor has none
    pub text: String,
}

/// Harvest `<a href>` links from `html`, de-duplicated by normalized key.
///
/// The first occurrence of a key wins; if it had no text, a later duplicate's
/// text fills it in. Every unique anchor is returned; filtering and capping
/// are left to the caller.
pub fn extract_links(html: &str, base_url: &Url) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links: Vec<Candidate> = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim().to_string();
        let key = normalize(&href, base_url);
        let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));

        if !seen.insert(key.clone()) {
            if let Some(existing) = links.iter_mut().find(|c| c.key == key)
                && existing.text.is_empty()
            {
                existing.text = text;
            }
            continue;
        }

        links.push(Candidate { href, key, text });
    }

    links
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
