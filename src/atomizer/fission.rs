//! Molecular fission: byte-accurate span splitting by content kind
//! (`spec.md` §4.B step 5), plus per-span timestamp and numeric-value
//! extraction (steps 6–7).
//!
//! The prose splitter follows the design note in `spec.md` §9: rather
//! than trusting a lookaround regex for offsets, it walks the source with
//! a monotonically advancing cursor so every emitted span satisfies
//! `compound.body[start..end] == content` exactly.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::MoleculeKind;

/// A byte-range span plus whatever this fission pass could infer about it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static ISO_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}").unwrap());
static NUMERIC_WITH_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?\s*([A-Za-z%]{1,10})?").unwrap());

/// Split `content` into byte-accurate spans by `kind`, then force-split any
/// span exceeding `max_bytes`.
#[must_use]
pub fn fission(content: &str, kind: MoleculeKind, max_bytes: usize) -> Vec<Span> {
    let raw = match kind {
        MoleculeKind::Code => split_code(content),
        MoleculeKind::Data => split_data(content),
        MoleculeKind::Prose => split_prose(content),
    };
    enforce_max_bytes(raw, content, max_bytes)
}

fn split_code(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut depth: i32 = 0;
    let mut seen_open = false;
    let mut pos = 0usize;

    for line in text.split_inclusive('\n') {
        pos += line.len();
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    seen_open = true;
                }
                '}' => depth = (depth - 1).max(0),
                _ => {}
            }
        }
        let blank = line.trim().is_empty();
        if depth == 0 && (seen_open || blank) && pos > start {
            spans.push(Span { start, end: pos });
            start = pos;
            seen_open = false;
        }
    }
    if start < text.len() {
        spans.push(Span { start, end: text.len() });
    }
    if spans.is_empty() && !text.is_empty() {
        spans.push(Span { start: 0, end: text.len() });
    }
    spans
}

fn split_data(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut pos = 0usize;
    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        if !body.trim().is_empty() {
            spans.push(Span { start: pos, end: pos + body.len() });
        }
        pos += line.len();
    }
    spans
}

fn split_prose(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut cursor = 0usize;

    for m in FENCE.find_iter(text) {
        if m.start() > cursor {
            spans.extend(sentence_spans(&text[cursor..m.start()], cursor));
        }
        spans.push(Span { start: m.start(), end: m.end() });
        cursor = m.end();
    }
    if cursor < text.len() {
        spans.extend(sentence_spans(&text[cursor..], cursor));
    }
    spans
}

/// Sentence-boundary split with a monotonically advancing cursor, as
/// directed by the design notes: a terminator (`.`/`!`/`?`) followed by
/// whitespace followed by an uppercase letter starts the next sentence.
/// Leading/trailing whitespace of each sentence is trimmed from its span
/// (the only permitted deviation from pure substring equality).
fn sentence_spans(segment: &str, offset: usize) -> Vec<Span> {
    let chars: Vec<(usize, char)> = segment.char_indices().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut spans = Vec::new();
    let mut sentence_start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if matches!(c, '.' | '!' | '?') {
            let terminator_end = pos + c.len_utf8();
            let mut j = i + 1;
            let ws_begin = j;
            while j < chars.len() && chars[j].1.is_whitespace() {
                j += 1;
            }
            if j > ws_begin && j < chars.len() && chars[j].1.is_uppercase() {
                push_trimmed(segment, sentence_start, terminator_end, offset, &mut spans);
                sentence_start = chars[j].0;
                i = j;
                continue;
            }
        }
        i += 1;
    }

    if sentence_start < segment.len() {
        push_trimmed(segment, sentence_start, segment.len(), offset, &mut spans);
    }
    spans
}

fn push_trimmed(segment: &str, start: usize, end: usize, offset: usize, out: &mut Vec<Span>) {
    let slice = &segment[start..end];
    let trim_start = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim_end();
    let real_start = start + trim_start;
    let real_end = start + trimmed.len();
    if real_end > real_start {
        out.push(Span { start: offset + real_start, end: offset + real_end });
    }
}

fn enforce_max_bytes(spans: Vec<Span>, text: &str, max_bytes: usize) -> Vec<Span> {
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        if span.end - span.start <= max_bytes {
            out.push(span);
            continue;
        }
        let mut s = span.start;
        while s < span.end {
            let mut e = (s + max_bytes).min(span.end);
            while e > s && !text.is_char_boundary(e) {
                e -= 1;
            }
            if e <= s {
                e = span.end;
            }
            out.push(Span { start: s, end: e });
            s = e;
        }
    }
    out
}

/// Extract an ISO `YYYY-MM-DD[ T]HH:MM:SS` timestamp within `span_text`, if
/// present and parseable (`spec.md` §4.B step 6).
#[must_use]
pub fn extract_timestamp_ms(span_text: &str) -> Option<i64> {
    let m = ISO_TIMESTAMP.find(span_text)?;
    let normalized = m.as_str().replacen(' ', "T", 1);
    let naive = chrono::NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S").ok()?;
    Some(naive.and_utc().timestamp_millis())
}

/// Extract a leading numeric value + optional unit from a data molecule,
/// rejecting bare four-digit years in `[1900, 2100]` (`spec.md` §4.B
/// step 7).
#[must_use]
pub fn extract_numeric(content: &str) -> Option<(f64, Option<String>)> {
    let m = NUMERIC_WITH_UNIT.find(content)?;
    let matched = m.as_str();
    let numeric_part = matched
        .trim_end_matches(|c: char| c.is_alphabetic() || c == '%')
        .trim();
    let value: f64 = numeric_part.parse().ok()?;

    let is_bare_year = numeric_part.len() == 4
        && !numeric_part.contains('.')
        && !numeric_part.starts_with('-')
        && (1900.0..=2100.0).contains(&value)
        && matched.trim() == numeric_part;
    if is_bare_year {
        return None;
    }

    let unit = matched[numeric_part.len()..].trim();
    let unit = if unit.is_empty() { None } else { Some(unit.to_string()) };
    Some((value, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prose_splits_on_sentence_boundary_and_is_byte_exact() {
        let text = "The quick brown fox jumps. The lazy dog sleeps.";
        let spans = fission(text, MoleculeKind::Prose, 1024);
        assert_eq!(spans.len(), 2);
        for span in &spans {
            assert!(span.end <= text.len());
        }
        assert_eq!(&text[spans[0].start..spans[0].end], "The quick brown fox jumps.");
        assert_eq!(&text[spans[1].start..spans[1].end], "The lazy dog sleeps.");
    }

    #[test]
    fn prose_protects_fenced_code_blocks_as_single_span() {
        let text = "Intro sentence.\n```\nfn main() {}\n```\nOutro sentence.";
        let spans = fission(text, MoleculeKind::Prose, 1024);
        let fence_span = spans.iter().find(|s| text[s.start..s.end].starts_with("```")).unwrap();
        assert_eq!(&text[fence_span.start..fence_span.end], "```\nfn main() {}\n```");
    }

    #[test]
    fn data_splits_one_row_per_nonempty_line() {
        let text = "a,b,c\n\nd,e,f\n";
        let spans = fission(text, MoleculeKind::Data, 1024);
        assert_eq!(spans.len(), 2);
        assert_eq!(&text[spans[0].start..spans[0].end], "a,b,c");
        assert_eq!(&text[spans[1].start..spans[1].end], "d,e,f");
    }

    #[test]
    fn code_splits_on_balanced_block_close() {
        let text = "fn a() {\n  1\n}\nfn b() {\n  2\n}\n";
        let spans = fission(text, MoleculeKind::Code, 1024);
        assert_eq!(spans.len(), 2);
        assert!(text[spans[0].start..spans[0].end].contains("fn a"));
        assert!(text[spans[1].start..spans[1].end].contains("fn b"));
    }

    #[test]
    fn oversize_span_is_force_split_at_char_boundary() {
        let text = "a".repeat(2500);
        let spans = fission(&text, MoleculeKind::Data, 1024);
        assert!(spans.iter().all(|s| s.end - s.start <= 1024));
        let total: usize = spans.iter().map(|s| s.end - s.start).sum();
        assert_eq!(total, 2500);
    }

    #[test]
    fn extracts_iso_timestamp() {
        let ms = extract_timestamp_ms("event at 2024-03-05T10:20:30 happened").unwrap();
        assert!(ms > 0);
    }

    #[test]
    fn rejects_bare_year_as_numeric() {
        assert!(extract_numeric("1999").is_none());
        assert!(extract_numeric("2050").is_none());
    }

    #[test]
    fn extracts_numeric_with_unit() {
        let (value, unit) = extract_numeric("42.5kg of flour").unwrap();
        assert!((value - 42.5).abs() < f64::EPSILON);
        assert_eq!(unit.as_deref(), Some("kg"));
    }
}
