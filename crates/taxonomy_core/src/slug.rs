//! Slug derivation for term names.
//!
//! # Invariants
//! - Output contains only `[a-z0-9_-]` and `%xx` escapes.
//! - Output never starts or ends with `-` and never has `--`.
//! - Derivation is deterministic; the empty string signals a degenerate name.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static DASHES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid dash regex"));

/// Derives a URL-safe slug from a display name.
///
/// Latin accents are transliterated, other non-ASCII letters and digits are
/// percent-encoded, punctuation is dropped and whitespace becomes `-`.
pub fn sanitize_title(title: &str) -> String {
    let mut filtered = String::with_capacity(title.len());
    for ch in title.chars() {
        match transliterate(ch) {
            Some(ascii) => filtered.push_str(ascii),
            None => push_slug_char(&mut filtered, ch),
        }
    }

    let spaced = WHITESPACE_RE.replace_all(filtered.trim(), "-");
    let collapsed = DASHES_RE.replace_all(&spaced, "-");
    collapsed.trim_matches('-').to_string()
}

fn push_slug_char(out: &mut String, ch: char) {
    if ch.is_ascii_alphanumeric() {
        out.push(ch.to_ascii_lowercase());
    } else if ch == '-' || ch == '_' {
        out.push(ch);
    } else if ch == '.' {
        out.push('-');
    } else if ch.is_whitespace() {
        out.push(' ');
    } else if ch.is_alphanumeric() {
        for lower in ch.to_lowercase() {
            let mut buf = [0u8; 4];
            for byte in lower.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{byte:02x}");
            }
        }
    }
}

fn transliterate(ch: char) -> Option<&'static str> {
    let ascii = match ch {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'Ā' | 'ā' => "a",
        'Æ' | 'æ' => "ae",
        'Ç' | 'ç' | 'Ć' | 'ć' | 'Č' | 'č' => "c",
        'Ð' | 'ð' | 'Ď' | 'ď' => "d",
        'È' | 'É' | 'Ê' | 'Ë' | 'è' | 'é' | 'ê' | 'ë' | 'Ē' | 'ē' | 'Ę' | 'ę' | 'Ě' | 'ě' => "e",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'ì' | 'í' | 'î' | 'ï' | 'Ī' | 'ī' => "i",
        'Ł' | 'ł' => "l",
        'Ñ' | 'ñ' | 'Ń' | 'ń' | 'Ň' | 'ň' => "n",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ō' | 'ō' => "o",
        'Œ' | 'œ' => "oe",
        'Ř' | 'ř' => "r",
        'Ś' | 'ś' | 'Š' | 'š' => "s",
        'ß' => "ss",
        'Ť' | 'ť' => "t",
        'Þ' | 'þ' => "th",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'ù' | 'ú' | 'û' | 'ü' | 'Ū' | 'ū' | 'Ů' | 'ů' => "u",
        'Ý' | 'ý' | 'ÿ' | 'Ÿ' => "y",
        'Ź' | 'ź' | 'Ż' | 'ż' | 'Ž' | 'ž' => "z",
        _ => return None,
    };
    Some(ascii)
}
