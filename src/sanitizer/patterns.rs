//! Log-spam excision and PII masking (`spec.md` §4.A steps 3–4).

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static BRACKETED_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\[\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?Z?\]\s*").unwrap());
static PROGRESS_BAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\[=*>?\s*\]\s*\d{1,3}%\s*$\n?").unwrap());
static TRANSIENT_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*(?:Processing|Loading|Indexing|Analyzing)\s+'[^']*'\.{0,3}\s*$\n?").unwrap()
});

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)\b").unwrap());
static API_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"sk-[A-Za-z0-9]{32,}").unwrap());

/// Strip bracketed ISO timestamps at line starts, progress bars, and
/// `Processing '…'`-style transient fragments.
pub fn strip_log_spam(text: &str) -> Cow<'_, str> {
    if !BRACKETED_TIMESTAMP.is_match(text) && !PROGRESS_BAR.is_match(text) && !TRANSIENT_FRAGMENT.is_match(text) {
        return Cow::Borrowed(text);
    }
    let s = BRACKETED_TIMESTAMP.replace_all(text, "");
    let s = PROGRESS_BAR.replace_all(&s, "");
    let s = TRANSIENT_FRAGMENT.replace_all(&s, "");
    Cow::Owned(s.into_owned())
}

/// Mask emails, IPv4 addresses, and `sk-`-prefixed API keys.
pub fn mask_pii(text: &str) -> Cow<'_, str> {
    if !EMAIL.is_match(text) && !IPV4.is_match(text) && !API_KEY.is_match(text) {
        return Cow::Borrowed(text);
    }
    let s = EMAIL.replace_all(text, "[EMAIL_REDACTED]");
    let s = IPV4.replace_all(&s, "[IP_REDACTED]");
    let s = API_KEY.replace_all(&s, "sk-[REDACTED]");
    Cow::Owned(s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bracketed_timestamp_prefix() {
        let out = strip_log_spam("[2024-01-02T03:04:05Z] build started\nnext line");
        assert_eq!(out, "build started\nnext line");
    }

    #[test]
    fn strips_progress_bar_line() {
        let out = strip_log_spam("before\n[===>   ] 42%\nafter");
        assert_eq!(out, "before\nafter");
    }

    #[test]
    fn strips_transient_fragment() {
        let out = strip_log_spam("Processing 'big_file.csv'...\nkeep me");
        assert_eq!(out, "keep me");
    }

    #[test]
    fn masks_email_ip_and_key() {
        let out = mask_pii("contact a@b.com from 10.0.0.5 using sk-abcdefghijklmnopqrstuvwxyz012345");
        assert_eq!(out, "contact [EMAIL_REDACTED] from [IP_REDACTED] using sk-[REDACTED]");
    }

    #[test]
    fn leaves_clean_text_untouched_and_borrowed() {
        let text = "nothing to scrub here";
        assert!(matches!(mask_pii(text), Cow::Borrowed(_)));
        assert!(matches!(strip_log_spam(text), Cow::Borrowed(_)));
    }
}
