//! Oracle response types and answer parsing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::OracleError;

/// Raw chat completion envelope.
#[derive(Debug, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Text of the first choice.
    pub fn answer(self) -> Result<String, OracleError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(OracleError::EmptyCompletion)
    }
}

/// The oracle's judgement of one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleVerdict {
    pub url: String,
    pub score: u8,
    pub is_valid: bool,
    pub reason: String,
}

/// Verdict as the model writes it; every field is optional and `score` may be
/// fractional.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    url: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    is_valid: bool,
    #[serde(default)]
    reason: String,
}

impl RawVerdict {
    fn into_verdict(self, url: Option<&str>) -> OracleVerdict {
        OracleVerdict {
            url: url.map(str::to_string).unwrap_or(self.url),
            score: self.score.round().clamp(0.0, 100.0) as u8,
            is_valid: self.is_valid,
            reason: self.reason.trim().to_string(),
        }
    }
}

fn fence() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").ok()).as_ref()
}

fn score_field() -> Option<&'static Regex> {
    static SCORE: OnceLock<Option<Regex>> = OnceLock::new();
    SCORE.get_or_init(|| Regex::new(r#"score"?\s*:\s*(\d+)"#).ok()).as_ref()
}

/// Unwrap a Markdown code fence around the answer, if there is one.
pub fn strip_code_fence(answer: &str) -> &str {
    if let Some(re) = fence()
        && let Some(inner) = re.captures(answer).and_then(|c| c.get(1))
    {
        return inner.as_str();
    }
    answer.trim()
}

/// Parse a batch answer: a JSON array of verdicts.
pub fn parse_batch(answer: &str) -> Result<Vec<OracleVerdict>, OracleError> {
    let raw: Vec<RawVerdict> =
        serde_json::from_str(strip_code_fence(answer)).map_err(|e| OracleError::Parse(e.to_string()))?;
    Ok(raw.into_iter().map(|v| v.into_verdict(None)).collect())
}

/// Parse a single-link answer for `url`.
///
/// When the answer is not valid JSON but still contains `"score": N`, the
/// verdict is salvaged as `N >= threshold`.
pub fn parse_single(answer: &str, url: &str, threshold: u8) -> Result<OracleVerdict, OracleError> {
    match serde_json::from_str::<RawVerdict>(strip_code_fence(answer)) {
        Ok(raw) => Ok(raw.into_verdict(Some(url))),
        Err(e) => {
            let salvaged = score_field()
                .and_then(|re| re.captures(answer))
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok());

            match salvaged {
                Some(score) => {
                    let score = score.min(100) as u8;
                    tracing::debug!(url, score, "salvaged score from non-JSON oracle answer");
                    Ok(OracleVerdict {
                        url: url.to_string(),
                        score,
                        is_valid: score >= threshold,
                        reason: "score salvaged from malformed response".to_string(),
                    })
                }
                None => Err(OracleError::Parse(e.to_string())),
            }
        }
    }
}
