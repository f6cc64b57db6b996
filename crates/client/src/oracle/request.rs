//! Oracle request types and prompt construction.

use serde::Serialize;
use url::Url;

/// One link put to the oracle: its absolute URL and anchor text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkQuery {
    pub url: String,
    pub text: String,
}

impl LinkQuery {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self { url: url.into(), text: text.into() }
    }
}

/// OpenAI-compatible chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatRequest {
    /// A single user-turn request.
    pub fn user(model: &str, prompt: String) -> Self {
        Self { model: model.to_string(), messages: vec![ChatMessage { role: "user", content: prompt }], temperature: 0.0 }
    }
}

const ARTICLE_TRAITS: &str = "\
A valid news link:
- points at one specific article, not a homepage, section or listing page
- usually carries a date or an article identifier in its URL
- has link text that reads like a headline
- is not a tag, category, search, login or profile page";

/// Prompt asking for one JSON object judging a single link.
pub fn single_prompt(query: &LinkQuery, base_url: &Url) -> String {
    let path = Url::parse(&query.url).map(|u| u.path().to_string()).unwrap_or_default();
    format!(
        "You decide whether a link found on {base} is a genuine news article link.\n\n\
         URL: {url}\n\
         Link text: {text}\n\
         URL path: {path}\n\n\
         {ARTICLE_TRAITS}\n\n\
         Score the link from 0 to 100 and reply with exactly this JSON and nothing else:\n\
         {{\"score\": <0-100>, \"is_valid\": <true|false>, \"reason\": \"<short reason>\"}}",
        base = base_url.as_str(),
        url = query.url,
        text = query.text,
    )
}

/// Prompt asking for a JSON array with one verdict per link.
pub fn batch_prompt(batch: &[LinkQuery], base_url: &Url) -> String {
    let links = serde_json::to_string_pretty(batch).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Decide which of these links found on {base} are genuine news article links.\n\n\
         {links}\n\n\
         {ARTICLE_TRAITS}\n\n\
         Score every link from 0 to 100 and reply with only a JSON array, one object per link, \
         echoing each url exactly as given:\n\
         [{{\"url\": \"<url>\", \"score\": <0-100>, \"is_valid\": <true|false>, \"reason\": \"<short reason>\"}}]",
        base = base_url.as_str(),
    )
}
