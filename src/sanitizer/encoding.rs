//! Encoding resolution: BOM detection, UTF-16 heuristic fallback, and
//! replacement of stray `U+0000` / `U+FFFD`.

/// Fraction of null bytes in a sample above which we assume UTF-16LE
/// without a BOM (`spec.md` §4.A step 1).
const NULL_DENSITY_THRESHOLD: f64 = 0.20;
const SAMPLE_WINDOW: usize = 1024;

/// Decode `raw` to a clean `String`, resolving BOM/encoding per the
/// sanitizer's step 1 and stripping `U+0000`/`U+FFFD` afterward.
pub fn decode(raw: &[u8]) -> String {
    let decoded = if let Some(rest) = raw.strip_prefix(&[0xFF, 0xFE]) {
        tracing::debug!(encoding = "utf-16le-bom", "encoding resolved");
        decode_utf16le(rest)
    } else if let Some(rest) = raw.strip_prefix(&[0xFE, 0xFF]) {
        tracing::debug!(encoding = "utf-16be-bom", "encoding resolved");
        decode_utf16be(rest)
    } else if let Some(rest) = raw.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        tracing::debug!(encoding = "utf-8-bom", "encoding resolved");
        String::from_utf8_lossy(rest).into_owned()
    } else if looks_like_utf16le(raw) {
        tracing::debug!(encoding = "utf-16le-heuristic", "encoding resolved");
        decode_utf16le(raw)
    } else {
        tracing::debug!(encoding = "utf-8", "encoding resolved");
        String::from_utf8_lossy(raw).into_owned()
    };

    strip_noise_chars(&decoded)
}

fn looks_like_utf16le(raw: &[u8]) -> bool {
    let head_end = raw.len().min(SAMPLE_WINDOW);
    let mid_start = raw.len() / 2;
    let mid_end = (mid_start + SAMPLE_WINDOW).min(raw.len());

    let mut total = 0usize;
    let mut nulls = 0usize;
    for window in [&raw[..head_end], &raw[mid_start..mid_end]] {
        total += window.len();
        nulls += window.iter().filter(|&&b| b == 0).count();
    }
    if total == 0 {
        return false;
    }
    (nulls as f64 / total as f64) > NULL_DENSITY_THRESHOLD
}

fn decode_utf16le(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn decode_utf16be(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn strip_noise_chars(text: &str) -> String {
    if !text.contains('\u{0000}') && !text.contains('\u{FFFD}') {
        return text.to_string();
    }
    text.chars().filter(|&c| c != '\u{0000}' && c != '\u{FFFD}').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_utf8() {
        assert_eq!(decode(b"hello"), "hello");
    }

    #[test]
    fn decodes_utf16le_bom() {
        let mut raw = vec![0xFF, 0xFE];
        for unit in "hi".encode_utf16() {
            raw.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode(&raw), "hi");
    }

    #[test]
    fn decodes_utf16le_without_bom_via_null_density() {
        let mut raw = Vec::new();
        for unit in "The quick brown fox".encode_utf16() {
            raw.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode(&raw), "The quick brown fox");
    }

    #[test]
    fn strips_null_and_replacement_chars() {
        let out = decode("a\u{0000}b\u{FFFD}c".as_bytes());
        assert_eq!(out, "abc");
    }
}
