//! JSON/log-wrapper removal (Density-Aware Scrubber, `spec.md` §4.A step 5).
//!
//! Code fences are protected from wrapper-stripping by swapping them for
//! placeholder tokens before the regex passes run, then restoring them —
//! otherwise a fenced JSON snippet in a user's note would get mangled by
//! the same rules that unwrap a log line.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static ROLE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\|(?:user|assistant|system)\|>\s*").unwrap());
static SOURCE_REINJECTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\[Source:[^\]]*\]\s*$\n?").unwrap());
static LOG_JSON_KEY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*"(?:timestamp|level|logger|role)"\s*:\s*"[^"]*"\s*,?\s*$\n?"#).unwrap()
});

const FENCE_PLACEHOLDER_PREFIX: &str = "\u{0}FENCE\u{0}";

/// Strip wrapper noise from `text`, preserving fenced code blocks verbatim.
pub fn strip_wrapper(text: &str) -> Cow<'_, str> {
    let fences: Vec<&str> = FENCE.find_iter(text).map(|m| m.as_str()).collect();
    if fences.is_empty() {
        return strip_wrapper_unprotected(text);
    }

    let mut protected = String::with_capacity(text.len());
    let mut last = 0;
    for (i, m) in FENCE.find_iter(text).enumerate() {
        protected.push_str(&text[last..m.start()]);
        protected.push_str(&format!("{FENCE_PLACEHOLDER_PREFIX}{i}\u{0}"));
        last = m.end();
    }
    protected.push_str(&text[last..]);

    let stripped = strip_wrapper_unprotected(&protected).into_owned();

    let mut restored = stripped;
    for (i, fence) in fences.iter().enumerate() {
        let placeholder = format!("{FENCE_PLACEHOLDER_PREFIX}{i}\u{0}");
        restored = restored.replace(&placeholder, fence);
    }
    Cow::Owned(restored)
}

fn strip_wrapper_unprotected(text: &str) -> Cow<'_, str> {
    if is_log_json_like(text) {
        let extracted = extract_content_fields(text);
        return Cow::Owned(extracted);
    }

    if !ROLE_MARKER.is_match(text) && !SOURCE_REINJECTION.is_match(text) {
        return Cow::Borrowed(text);
    }
    let s = ROLE_MARKER.replace_all(text, "");
    let s = SOURCE_REINJECTION.replace_all(&s, "");
    Cow::Owned(s.into_owned())
}

fn is_log_json_like(text: &str) -> bool {
    ["\"response_content\":", "\"thinking_content\":", "\"content\":", "\"message\":"]
        .iter()
        .any(|marker| text.contains(marker))
}

/// Best-effort structured extraction: parse as JSON and pull the known
/// content-bearing fields; fall back to stripping log-JSON key lines if
/// parsing fails (the input merely *looks* like log-JSON).
fn extract_content_fields(text: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        let mut parts = Vec::new();
        for key in ["response_content", "thinking_content", "content", "message"] {
            if let Some(s) = value.get(key).and_then(|v| v.as_str()) {
                parts.push(s.to_string());
            }
        }
        if !parts.is_empty() {
            return parts.join("\n");
        }
    }
    LOG_JSON_KEY_LINE.replace_all(text, "").into_owned()
}
