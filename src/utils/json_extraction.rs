//! JSON extraction from LLM responses.
//!
//! Models wrap JSON in markdown fences or surround it with prose. The
//! extraction tries, in order:
//! 1. Direct JSON (content starts with `[`)
//! 2. A ```json fenced block
//! 3. A generic fenced block
//! 4. The first balanced array anywhere in the content
//!
//! # Example
//!
//! ```
//! use efficepart::utils::json_extraction::extract_json_array;
//!
//! let response = "修正案は次のとおりです:\n```json\n[{\"position\": 0}]\n```";
//! assert_eq!(extract_json_array(response).unwrap(), "[{\"position\": 0}]");
//! ```

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Error type for JSON extraction failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("JSON appears truncated: {unclosed} unclosed brackets. Partial: {partial_preview}...")]
    Truncated {
        partial_preview: String,
        unclosed: usize,
    },
    #[error("No JSON content found in response. Content starts with: '{content_preview}'")]
    NotFound { content_preview: String },
}

fn json_fence() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```json\s*\n?([\s\S]*?)\n?```").ok())
        .as_ref()
}

fn generic_fence() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:\w+)?\s*\n?([\s\S]*?)\n?```").ok())
        .as_ref()
}

/// Index of the bracket closing the one `s` starts with.
///
/// Handles nesting, string literals and escapes. `open`/`close` are `[`/`]`
/// or `{`/`}`.
fn find_matching(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Index of the `]` matching the `[` that `s` starts with.
pub fn find_matching_bracket(s: &str) -> Option<usize> {
    find_matching(s, '[', ']')
}

/// Index of the `}` matching the `{` that `s` starts with.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    find_matching(s, '{', '}')
}

/// Contents of the first ```json fenced block.
pub fn extract_from_json_code_block(content: &str) -> Option<String> {
    let caps = json_fence()?.captures(content)?;
    Some(caps.get(1)?.as_str().trim().to_string())
}

/// Contents of the first fenced block of any language.
pub fn extract_from_generic_code_block(content: &str) -> Option<String> {
    let caps = generic_fence()?.captures(content)?;
    Some(caps.get(1)?.as_str().trim().to_string())
}

/// First balanced array in `content` that parses as JSON.
fn first_balanced_array(content: &str) -> Result<String, JsonExtractionError> {
    let mut offset = 0;
    let mut truncated: Option<(usize, usize)> = None;

    while let Some(rel) = content[offset..].find('[') {
        let start = offset + rel;
        let candidate = &content[start..];
        match find_matching_bracket(candidate) {
            Some(end) => {
                let slice = &candidate[..=end];
                if serde_json::from_str::<serde_json::Value>(slice).is_ok() {
                    return Ok(slice.to_string());
                }
            }
            None => {
                if truncated.is_none() {
                    truncated = Some((start, unclosed_brackets(candidate)));
                }
            }
        }
        offset = start + 1;
    }

    match truncated {
        Some((start, unclosed)) => Err(JsonExtractionError::Truncated {
            partial_preview: preview(&content[start..], 100),
            unclosed,
        }),
        None => Err(JsonExtractionError::NotFound {
            content_preview: preview(content.trim(), 50),
        }),
    }
}

fn unclosed_brackets(s: &str) -> usize {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escape_next = false;
    for c in s.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '[' | '{' if !in_string => depth += 1,
            ']' | '}' if !in_string => depth -= 1,
            _ => {}
        }
    }
    depth.max(0) as usize
}

fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Extracts a JSON array from an LLM response.
pub fn extract_json_array(content: &str) -> Result<String, JsonExtractionError> {
    let trimmed = content.trim();

    if trimmed.starts_with('[') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Ok(trimmed.to_string());
    }

    for block in [
        extract_from_json_code_block(trimmed),
        extract_from_generic_code_block(trimmed),
    ]
    .into_iter()
    .flatten()
    {
        if let Ok(array) = first_balanced_array(&block) {
            return Ok(array);
        }
    }

    first_balanced_array(trimmed)
}
