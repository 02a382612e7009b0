//! LLM provider layer
//!
//! The engine talks to a single OpenAI-compatible endpoint (a LiteLLM proxy
//! in the default setup) for chat completions and embeddings. Agents see it
//! only as a [`LanguageModel`](careerflow_sdk::agent::LanguageModel).
//!
//! Models rarely answer with bare JSON, so this module also carries the
//! helpers that pull a JSON document out of fenced or prose-wrapped output.

use careerflow_sdk::agent::ToolError;
use serde::de::DeserializeOwned;

pub mod openai;

pub use openai::OpenAICompatibleModel;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for ToolError {
    fn from(e: LLMError) -> Self {
        match e {
            LLMError::AuthenticationFailed(msg) => ToolError::AuthenticationFailed(msg),
            LLMError::RateLimitExceeded => ToolError::RateLimitExceeded,
            LLMError::InvalidRequest(msg) | LLMError::NetworkError(msg) => {
                ToolError::RequestFailed(msg)
            }
            LLMError::ParseError(msg) => ToolError::InvalidResponse(msg),
        }
    }
}

/// Deserialize the JSON document contained in a model answer.
///
/// Handles, in order:
/// 1. The whole answer is JSON
/// 2. JSON inside a markdown code fence (trailing prose allowed)
/// 3. The first balanced `{...}` object embedded in prose
pub fn parse_json_response<T: DeserializeOwned>(content: &str) -> Result<T> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Ok(value) = serde_json::from_str(inner.trim()) {
            return Ok(value);
        }
    }

    if let Some(pos) = trimmed.find('{') {
        if let Some(candidate) = extract_balanced_json(&trimmed[pos..]) {
            return serde_json::from_str(candidate)
                .map_err(|e| LLMError::ParseError(format!("embedded JSON: {}", e)));
        }
    }

    Err(LLMError::ParseError(
        "no JSON document in model output".to_string(),
    ))
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start = fence_start + 3 + after_opening.find('\n')? + 1;
    let body_end = body_start + content[body_start..].find("```")?;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts brace depth, respecting string literals.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
