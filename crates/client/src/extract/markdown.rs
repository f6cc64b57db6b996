//! Markdown renderings of a fetched page using Lectito.
//!
//! - `filtered`: Lectito's readability pass (scoring, best-candidate
//!   selection, cleanup) converted to Markdown. Navigation, footers and ads
//!   are pruned by the algorithm.
//! - `raw`: the whole document converted to Markdown without pruning.

use lectito_core::{Document, ExtractConfig as LectitoConfig};

/// Both Markdown renderings of one page. Either may be missing when Lectito
/// cannot parse or distill the page.
#[derive(Debug, Clone, Default)]
pub struct Renderings {
    pub filtered: Option<String>,
    pub raw: Option<String>,
}

/// Render `html` both ways. Failures are logged and leave the rendering out.
pub fn render_markdown(html: &str) -> Renderings {
    if html.trim().is_empty() {
        return Renderings::default();
    }

    let doc = match Document::parse(html) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!("lectito could not parse page: {e}");
            return Renderings::default();
        }
    };
    let metadata = doc.extract_metadata();

    let raw = lectito_core::convert_to_markdown(html, &metadata, &Default::default())
        .map_err(|e| tracing::debug!("raw markdown conversion failed: {e}"))
        .ok()
        .and_then(non_blank);

    let filtered = lectito_core::extract_content(&doc, &LectitoConfig::default())
        .map_err(|e| tracing::debug!("readability extraction failed: {e}"))
        .ok()
        .and_then(|extracted| {
            lectito_core::convert_to_markdown(&extracted.content, &metadata, &Default::default())
                .map_err(|e| tracing::debug!("filtered markdown conversion failed: {e}"))
                .ok()
        })
        .and_then(non_blank);

    Renderings { filtered, raw }
}

fn non_blank(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}
