//! Text extraction from provider responses.
//!
//! The provider response is not contractually stable: depending on API version
//! and output mode the text can sit in a top-level `text` field, inside the first
//! `candidates` entry (as a plain string or a structured `parts` object), inside
//! an `output` list, or nowhere we recognise. Each place is a [`ResponseShape`];
//! shapes are probed in priority order and the first non-empty text wins. A probe
//! that finds nothing is not an error, the chain just moves on.

use serde_json::Value;

use crate::error::AnalysisError;

/// Longest response excerpt carried inside an extraction error.
const ERROR_EXCERPT_CHARS: usize = 500;

/// A place in the response where text may live.
#[derive(Debug, Clone, Copy)]
pub enum ResponseShape<'a> {
    DirectText(&'a str),
    Candidates(&'a [Value]),
    Output(&'a [Value]),
    /// Last resort: the whole response, stringified.
    Opaque(&'a Value),
}

impl<'a> ResponseShape<'a> {
    /// Every shape `response` exposes, in the order they should be tried.
    pub fn probe_chain(response: &'a Value) -> Vec<ResponseShape<'a>> {
        let mut chain = Vec::with_capacity(4);
        if let Some(text) = response.get("text").and_then(Value::as_str) {
            chain.push(ResponseShape::DirectText(text));
        }
        if let Some(candidates) = response.get("candidates").and_then(Value::as_array) {
            chain.push(ResponseShape::Candidates(candidates));
        }
        if let Some(output) = response.get("output").and_then(Value::as_array) {
            chain.push(ResponseShape::Output(output));
        }
        chain.push(ResponseShape::Opaque(response));
        chain
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResponseShape::DirectText(_) => "direct_text",
            ResponseShape::Candidates(_) => "candidates",
            ResponseShape::Output(_) => "output",
            ResponseShape::Opaque(_) => "opaque",
        }
    }

    /// Non-empty text found in this shape, if any.
    pub fn probe(&self) -> Option<String> {
        match self {
            ResponseShape::DirectText(text) => non_empty(text),
            ResponseShape::Candidates(items) | ResponseShape::Output(items) => {
                items.first().and_then(block_text)
            }
            ResponseShape::Opaque(value) => stringify(value),
        }
    }
}

/// Pull the raw text payload out of a provider response.
pub fn extract_text(response: &Value) -> Result<String, AnalysisError> {
    for shape in ResponseShape::probe_chain(response) {
        match shape.probe() {
            Some(text) => {
                tracing::debug!(shape = shape.name(), chars = text.len(), "Extracted response text");
                return Ok(text);
            }
            None => tracing::debug!(shape = shape.name(), "No text in response shape, trying next"),
        }
    }

    tracing::error!(response = %response, "Unable to extract text from AI response");
    Err(AnalysisError::Extraction {
        response: excerpt(&response.to_string()),
    })
}

/// `content` first, then `text`.
fn block_text(block: &Value) -> Option<String> {
    block
        .get("content")
        .and_then(content_text)
        .or_else(|| block.get("text").and_then(Value::as_str).and_then(non_empty))
}

fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => non_empty(s),
        Value::Object(map) => {
            if let Some(parts) = map.get("parts").and_then(Value::as_array) {
                let joined: String = parts
                    .iter()
                    .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect();
                if let Some(text) = non_empty(&joined) {
                    return Some(text);
                }
            }
            map.get("text").and_then(Value::as_str).and_then(non_empty)
        }
        _ => None,
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => non_empty(s),
        other => non_empty(&other.to_string()),
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn excerpt(s: &str) -> String {
    if s.chars().count() <= ERROR_EXCERPT_CHARS {
        return s.to_string();
    }
    let cut: String = s.chars().take(ERROR_EXCERPT_CHARS).collect();
    format!("{cut}...")
}
