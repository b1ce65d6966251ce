//! services/studio/src/adapters/sanitize.rs
//!
//! Cleans raw model text before it is parsed as JSON. Models occasionally wrap
//! structured output in markdown code fences even when asked for bare JSON.

/// Strips a leading ```` ``` ```` / ```` ```json ```` fence and a trailing fence.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string (e.g. `json`) up to the end of the fence line.
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}
