//! Tolerant JSON extraction from raw LLM text.
//!
//! Model replies routinely wrap JSON in prose or code fences. Everything the
//! orchestrator reads from a model goes through here; malformed input
//! yields `None`, never a panic or an error.

use serde_json::Value;

/// Return the first balanced `{ ... }` object in `text`.
///
/// Scanning starts at the first `{` and tracks brace depth. Braces inside
/// string literals (including escaped quotes) are ignored. Returns `None`
/// when there is no `{` or the object never closes.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    balanced_object_at(text, start)
}

/// Extract and parse the first JSON object in `text`.
///
/// If the first balanced candidate is not valid JSON (for example a
/// `{placeholder}` in prose), scanning resumes after it.
pub fn parse_json_object(text: &str) -> Option<Value> {
    let mut offset = 0;
    while let Some(rel) = text[offset..].find('{') {
        let start = offset + rel;
        let candidate = balanced_object_at(text, start)?;
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(candidate) {
            return Some(value);
        }
        offset = start + 1;
    }
    None
}

fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
