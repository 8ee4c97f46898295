//! # parser — pull the JSON block out of the agent's free text
//!
//! The agent narrates its work and is asked to finish with a fenced JSON
//! block.  Extraction tries each strategy in [`EXTRACTORS`] in order and
//! decodes the first match; it does not fall through to the next strategy
//! when the match fails to decode.  Any failure yields
//! [`AgentResponse::fallback`] — this module never returns an error.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::models::AgentResponse;

/// How much of the raw output is kept on the fallback object.
pub const RAW_OUTPUT_LIMIT: usize = 2000;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)\n?```").expect("valid fence regex"));

type Extractor = fn(&str) -> Option<&str>;

/// Tried left to right; first hit wins.
const EXTRACTORS: [(&str, Extractor); 2] = [("fenced", fenced_block), ("braces", brace_span)];

/// Contents of the first ```` ``` ```` / ```` ```json ```` block, trimmed.
fn fenced_block(text: &str) -> Option<&str> {
    FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// First `{` through the last `}` after it.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn extract_json(text: &str) -> Option<&str> {
    EXTRACTORS.iter().find_map(|(name, extract)| {
        let found = extract(text);
        if found.is_some() {
            tracing::debug!(strategy = *name, "JSON candidate found");
        }
        found
    })
}

pub fn parse_response(output: &str) -> AgentResponse {
    let Some(candidate) = extract_json(output) else {
        return AgentResponse::fallback(
            "Could not parse JSON from response",
            truncate_chars(output, RAW_OUTPUT_LIMIT),
        );
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => AgentResponse::from(map),
        Ok(other) => AgentResponse::fallback(
            format!("JSON parse error: expected an object, got {}", json_type(&other)),
            truncate_chars(output, RAW_OUTPUT_LIMIT),
        ),
        Err(e) => AgentResponse::fallback(
            format!("JSON parse error: {e}"),
            truncate_chars(output, RAW_OUTPUT_LIMIT),
        ),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null      => "null",
        Value::Bool(_)   => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_)  => "an array",
        Value::Object(_) => "an object",
    }
}

/// First `max` characters of `s` (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
