//! Shared utility functions for the finrouter crate.

use regex::Regex;
use std::sync::LazyLock;

// Compile fence regexes once using LazyLock
static FENCE_OPEN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^```[A-Za-z]*\n?").unwrap());
static FENCE_CLOSE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n?```$").unwrap());

/// Extract a JSON object from text that may contain other content.
/// Uses brace-counting to find the outermost JSON object. Braces inside
/// string literals are not counted.
pub fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0;
    let mut end = start;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if depth == 0 && end > start {
        Some(text[start..end].to_string())
    } else {
        None
    }
}

/// Strip a surrounding markdown code fence (```` ```json ... ``` ````) from model output.
/// Text that does not start with a fence is returned trimmed but otherwise untouched.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let open_len = FENCE_OPEN_REGEX.find(trimmed).map_or(0, |m| m.end());
    let body = &trimmed[open_len..];
    let close_start = FENCE_CLOSE_REGEX.find(body).map_or(body.len(), |m| m.start());
    body[..close_start].trim()
}

/// Truncate to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
