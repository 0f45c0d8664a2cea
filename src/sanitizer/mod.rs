//! The "Iron Lung": a pure, total, idempotent text sanitizer.
//!
//! [`sanitize`] takes raw bytes plus the path they came from and returns
//! clean UTF-8 text: encoding resolved, newlines normalized, log spam and
//! PII scrubbed, JSON/log wrappers stripped. It never fails — bad input
//! degrades to an empty string, never a panic or an `Err` — and
//! `sanitize(sanitize(x)) == sanitize(x)` for any `x` already produced by
//! this function.

mod encoding;
mod patterns;
mod wrapper;

use std::borrow::Cow;

use tracing::instrument;

/// Windows the chunked variant processes input in (`spec.md` §4.A step 6).
const CHUNK_WINDOW_BYTES: usize = 1_048_576;
/// Above this size, sanitize switches to the windowed pipeline.
const CHUNK_THRESHOLD_BYTES: usize = 2 * 1_048_576;

/// Sanitize raw bytes from `path` into clean UTF-8 text.
///
/// Total and side-effect free: logs its encoding decision but never
/// returns an error, matching the "ParseError: never raised" contract
/// that downstream modules (the Atomizer) depend on.
#[instrument(skip(raw), fields(path = %path, input_bytes = raw.len()))]
#[must_use]
pub fn sanitize(raw: &[u8], path: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let decoded = encoding::decode(raw);
    if decoded.len() > CHUNK_THRESHOLD_BYTES {
        tracing::debug!(windows = decoded.len() / CHUNK_WINDOW_BYTES + 1, "chunked sanitize");
        return sanitize_chunked(&decoded);
    }
    sanitize_str(&decoded)
}

/// Sanitize an already-decoded string in one pass. Exposed so tests and
/// callers that already have `String` in hand (e.g. the Watcher re-reading
/// a quarantine candidate) can skip encoding resolution.
#[must_use]
pub fn sanitize_str(text: &str) -> String {
    let text = normalize_newlines(text);
    let text = patterns::strip_log_spam(&text);
    let text = patterns::mask_pii(&text);
    let text = wrapper::strip_wrapper(&text);
    text.into_owned()
}

/// 1 MB-windowed variant for large inputs, aligned to the nearest newline
/// so no sentence/line is split across a window boundary.
fn sanitize_chunked(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut start = 0usize;

    while start < bytes.len() {
        let mut end = (start + CHUNK_WINDOW_BYTES).min(bytes.len());
        if end < bytes.len()
            && let Some(nl) = bytes[start..end].iter().rposition(|&b| b == b'\n')
        {
            end = start + nl + 1;
        }
        // Find a char boundary in case the newline search failed to land on one.
        while end < bytes.len() && !text.is_char_boundary(end) {
            end += 1;
        }
        out.push_str(&sanitize_str(&text[start..end]));
        start = end;
    }
    out
}

/// `\r\n` and literal `"\\r\\n"` tokens collapse to `\n`; runs of 3+
/// newlines collapse to 2.
fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') && !text.contains("\\r\\n") && !has_triple_newline(text) {
        return Cow::Borrowed(text);
    }

    let mut s = text.replace("\\r\\n", "\n").replace("\r\n", "\n").replace('\r', "\n");
    while s.contains("\n\n\n") {
        s = s.replace("\n\n\n", "\n\n");
    }
    Cow::Owned(s)
}

fn has_triple_newline(text: &str) -> bool {
    text.contains("\n\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(sanitize(b"", "inbox/note.md"), "");
    }

    #[test]
    fn is_idempotent() {
        let raw = b"Hello\r\n\r\n\r\nworld. Contact me at a@b.com or 10.0.0.1.";
        let once = sanitize(raw, "inbox/note.md");
        let twice = sanitize_str(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn collapses_excess_newlines() {
        let out = sanitize(b"a\n\n\n\n\nb", "inbox/note.md");
        assert_eq!(out, "a\n\nb");
    }

    #[test]
    fn normalizes_crlf() {
        let out = sanitize(b"a\r\nb\r\nc", "inbox/note.md");
        assert_eq!(out, "a\nb\nc");
    }

    #[test]
    fn chunked_path_matches_direct_path() {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let big = sentence.repeat(60_000); // > 2 MB
        let chunked = sanitize(big.as_bytes(), "inbox/big.md");
        let direct = sanitize_str(&normalize_newlines(&big));
        assert_eq!(chunked, direct);
    }
}
