//! Robust parsing of LLM output (spec §9 "Fixture of LLM output").
//!
//! Structured data from the model is never trusted as-is: JSON is tried
//! direct, then from the first fenced block, then as the substring between
//! the first `{` and the last `}`. Code output gets a single outermost
//! fenced block stripped if the model leaked one.

/// Strips a single outermost ``` fence (with optional language tag) from
/// code output, if present. Leaves unfenced output untouched.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let Some(end) = inner.rfind("```") else {
        return trimmed.to_string();
    };
    let body = &inner[..end];
    // Drop a leading language tag line (e.g. "tsx\n...").
    let body = match body.find('\n') {
        Some(newline) if !body[..newline].contains(char::is_whitespace) => &body[newline + 1..],
        _ => body,
    };
    body.trim().to_string()
}

/// Finds the first fenced block's contents, regardless of language tag.
fn first_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_open = &text[start + 3..];
    let after_open = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open,
    };
    let end = after_open.find("```")?;
    Some(&after_open[..end])
}

/// Substring between the first `{` and the last `}`, inclusive.
fn brace_substring(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parses JSON from LLM output using the spec's three-tier fallback:
/// direct parse, then the first fenced block, then the `{...}` substring.
pub fn parse_json_lenient(text: &str) -> Result<serde_json::Value, serde_json::Error> {
    if let Ok(value) = serde_json::from_str(text.trim()) {
        return Ok(value);
    }
    if let Some(fenced) = first_fenced_block(text) {
        if let Ok(value) = serde_json::from_str(fenced.trim()) {
            return Ok(value);
        }
    }
    if let Some(braces) = brace_substring(text) {
        return serde_json::from_str(braces);
    }
    // No candidate found; surface the direct-parse error for diagnostics.
    serde_json::from_str(text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fence_removes_fence_and_language_tag() {
        let input = "```tsx\nexport function Hello() {}\n```";
        assert_eq!(strip_code_fence(input), "export function Hello() {}");
    }

    #[test]
    fn strip_code_fence_is_noop_without_fence() {
        assert_eq!(strip_code_fence("export function Hello() {}"), "export function Hello() {}");
    }

    #[test]
    fn parse_json_lenient_direct() {
        let value = parse_json_lenient(r#"{"tasks": []}"#).unwrap();
        assert_eq!(value["tasks"], serde_json::json!([]));
    }

    #[test]
    fn parse_json_lenient_from_fenced_block() {
        let text = "Here is the plan:\n```json\n{\"tasks\": [1]}\n```\nThanks.";
        let value = parse_json_lenient(text).unwrap();
        assert_eq!(value["tasks"], serde_json::json!([1]));
    }

    #[test]
    fn parse_json_lenient_from_brace_substring() {
        let text = "Sure thing! {\"tasks\": [2]} Hope that helps.";
        let value = parse_json_lenient(text).unwrap();
        assert_eq!(value["tasks"], serde_json::json!([2]));
    }

    #[test]
    fn parse_json_lenient_fails_on_garbage() {
        assert!(parse_json_lenient("no json here").is_err());
    }
}
