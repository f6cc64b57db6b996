//! Ordered extraction fallback chain.
//!
//! Strategies run in priority order and the chain stops at the first one
//! whose content reaches `min_chars`. A shorter but non-empty result from an
//! earlier strategy is kept as the fallback; if nothing produced any text the
//! result is the literal placeholder. Extraction therefore never fails.

use scraper::{ElementRef, Html, Node, Selector};
use std::fmt;

use super::metadata::{extract_publish_date, extract_title};
use crate::fetch::FetchedPage;

/// Content recorded when every strategy came back empty.
pub const PLACEHOLDER_CONTENT: &str = "no content could be extracted";

/// Elements whose whole subtree is dropped before text extraction.
const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "svg", "nav", "header", "footer", "aside", "form", "button",
];

/// class/id tokens that mark ad-like or chrome subtrees.
const STRIPPED_TOKENS: &[&str] = &[
    "ad", "ads", "advert", "advertisement", "sponsor", "sponsored", "banner", "promo", "social", "share", "cookie",
    "popup", "newsletter", "breadcrumb",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr",
    "table", "blockquote", "pre", "figure", "figcaption", "dd", "dt",
];

/// Which strategy produced an extraction result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    FilteredMarkdown,
    RawMarkdown,
    /// Structural selector, carrying the CSS that matched.
    Selector(String),
    WholeDocument,
    Placeholder,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::FilteredMarkdown => f.write_str("filtered markdown"),
            Strategy::RawMarkdown => f.write_str("raw markdown"),
            Strategy::Selector(css) => write!(f, "selector {css}"),
            Strategy::WholeDocument => f.write_str("whole document"),
            Strategy::Placeholder => f.write_str("placeholder"),
        }
    }
}

/// Content produced by one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub content: String,
    pub strategy: Strategy,
}

/// Final output of the chain for one page.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub content: String,
    pub strategy_used: Strategy,
    pub title: Option<String>,
    pub publish_date: Option<String>,
}

impl ExtractionResult {
    /// Length in characters, zero for the placeholder.
    pub fn content_length(&self) -> usize {
        if self.strategy_used == Strategy::Placeholder { 0 } else { self.content.chars().count() }
    }
}

/// One step of the fallback chain. Returning `None` means "no result".
pub trait ExtractionStrategy: Send + Sync {
    fn extract(&self, page: &FetchedPage, document: &Html, min_chars: usize) -> Option<Extracted>;
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Boilerplate-pruned Markdown supplied by the fetcher.
pub struct FilteredMarkdownStrategy;

impl ExtractionStrategy for FilteredMarkdownStrategy {
    fn extract(&self, page: &FetchedPage, _: &Html, _: usize) -> Option<Extracted> {
        non_empty(page.filtered_markdown.as_deref())
            .map(|content| Extracted { content, strategy: Strategy::FilteredMarkdown })
    }
}

/// Unfiltered Markdown rendering of the page.
pub struct RawMarkdownStrategy;

impl ExtractionStrategy for RawMarkdownStrategy {
    fn extract(&self, page: &FetchedPage, _: &Html, _: usize) -> Option<Extracted> {
        non_empty(page.raw_markdown.as_deref()).map(|content| Extracted { content, strategy: Strategy::RawMarkdown })
    }
}

/// Article container selectors tried in order.
///
/// The first selector whose stripped text reaches `min_chars` wins; otherwise
/// the first non-empty match is returned.
pub struct SelectorStrategy {
    selectors: Vec<(String, Selector)>,
}

impl SelectorStrategy {
    /// Compile `selectors`, skipping any that do not parse.
    pub fn new<S: AsRef<str>>(selectors: &[S]) -> Self {
        let selectors = selectors
            .iter()
            .filter_map(|css| {
                let css = css.as_ref();
                match Selector::parse(css) {
                    Ok(sel) => Some((css.to_string(), sel)),
                    Err(e) => {
                        tracing::warn!(selector = css, "skipping invalid content selector: {e}");
                        None
                    }
                }
            })
            .collect();
        Self { selectors }
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

impl ExtractionStrategy for SelectorStrategy {
    fn extract(&self, _: &FetchedPage, document: &Html, min_chars: usize) -> Option<Extracted> {
        let mut fallback: Option<Extracted> = None;

        for (css, selector) in &self.selectors {
            let Some(text) = document
                .select(selector)
                .map(stripped_text)
                .find(|t| !t.is_empty())
            else {
                continue;
            };

            let candidate = Extracted { content: text, strategy: Strategy::Selector(css.clone()) };
            if char_len(&candidate.content) >= min_chars {
                return Some(candidate);
            }
            fallback.get_or_insert(candidate);
        }

        fallback
    }
}

/// Text of the whole document with the same subtree stripping.
pub struct WholeDocumentStrategy;

impl ExtractionStrategy for WholeDocumentStrategy {
    fn extract(&self, _: &FetchedPage, document: &Html, _: usize) -> Option<Extracted> {
        let root = Selector::parse("body")
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .unwrap_or_else(|| document.root_element());
        let text = stripped_text(root);
        if text.is_empty() { None } else { Some(Extracted { content: text, strategy: Strategy::WholeDocument }) }
    }
}

fn is_stripped(el: &scraper::node::Element) -> bool {
    if STRIPPED_TAGS.contains(&el.name()) {
        return true;
    }

    let tokens = el
        .attr("class")
        .into_iter()
        .chain(el.attr("id"))
        .flat_map(|v| v.split(|c: char| c.is_whitespace() || c == '-' || c == '_'));

    for token in tokens {
        let token = token.to_ascii_lowercase();
        if STRIPPED_TOKENS.contains(&token.as_str()) {
            return true;
        }
    }
    false
}

/// Visible text of `root` with chrome subtrees removed, one block per line.
pub fn stripped_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(root, &mut out);

    out.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) => {
                if is_stripped(el) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&el.name());
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// The ordered fallback chain.
pub struct ExtractionChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    min_chars: usize,
}

impl ExtractionChain {
    /// The standard chain: filtered Markdown, raw Markdown, selectors, whole
    /// document.
    pub fn new<S: AsRef<str>>(selectors: &[S], min_chars: usize) -> Self {
        Self::with_strategies(
            vec![
                Box::new(FilteredMarkdownStrategy),
                Box::new(RawMarkdownStrategy),
                Box::new(SelectorStrategy::new(selectors)),
                Box::new(WholeDocumentStrategy),
            ],
            min_chars,
        )
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ExtractionStrategy>>, min_chars: usize) -> Self {
        Self { strategies, min_chars }
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    /// Run the chain over `page`.
    pub fn extract(&self, page: &FetchedPage) -> ExtractionResult {
        let document = Html::parse_document(&page.html);
        let mut fallback: Option<Extracted> = None;
        let mut chosen: Option<Extracted> = None;

        for strategy in &self.strategies {
            let Some(found) = strategy.extract(page, &document, self.min_chars) else {
                continue;
            };
            if char_len(&found.content) >= self.min_chars {
                chosen = Some(found);
                break;
            }
            tracing::trace!(strategy = %found.strategy, chars = char_len(&found.content), "below threshold, keeping as fallback");
            fallback.get_or_insert(found);
        }

        let Extracted { content, strategy } = chosen.or(fallback).unwrap_or_else(|| Extracted {
            content: PLACEHOLDER_CONTENT.to_string(),
            strategy: Strategy::Placeholder,
        });

        tracing::debug!(url = %page.url, strategy = %strategy, chars = char_len(&content), "extraction finished");

        ExtractionResult {
            content,
            strategy_used: strategy,
            title: extract_title(&document, &page.final_url),
            publish_date: extract_publish_date(&document),
        }
    }
}
