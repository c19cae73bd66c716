use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

/// Ellipsis string used for truncation
const ELLIPSIS: &str = "...";

/// Collapses every run of whitespace (spaces, tabs, newlines) into a single
/// space and trims both ends.
///
/// # Examples
///
/// ```
/// use hubrelay::util::collapse_whitespace;
///
/// assert_eq!(collapse_whitespace("  Hello\n\n   world\t"), "Hello world");
/// ```
pub fn collapse_whitespace(s: &str) -> Cow<'_, str> {
    static RE_WS: OnceLock<Regex> = OnceLock::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"));

    let trimmed = s.trim();
    match re_ws.replace_all(trimmed, " ") {
        // Single spaces match too, so an owned result may still be unchanged
        Cow::Borrowed(_) => Cow::Borrowed(trimmed),
        Cow::Owned(out) if out == trimmed => Cow::Borrowed(trimmed),
        Cow::Owned(out) => Cow::Owned(out),
    }
}

/// Truncates a string to at most `max_chars` characters.
///
/// If truncation is necessary, appends "..." after the kept characters, so the
/// result is `max_chars + 3` characters long. Counts Unicode scalar values, not
/// bytes, so multi-byte text is never cut mid-codepoint.
///
/// # Examples
///
/// ```
/// use hubrelay::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("Hello World", 5), "Hello...");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        None => Cow::Borrowed(s),
        Some((cut, _)) => Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS)),
    }
}

/// Cleans an excerpt for display: whitespace collapsed, then truncated.
pub fn clean_excerpt(s: &str, max_chars: usize) -> String {
    let cleaned = collapse_whitespace(s);
    truncate_chars(&cleaned, max_chars).into_owned()
}

/// Strips control characters from text taken from a feed.
///
/// Removes every Unicode control character except tab, newline and carriage
/// return. NUL in particular can never survive, which keeps it free for use as
/// a field separator.
///
/// Returns `Cow::Borrowed` when the input contains nothing to strip.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_stripped = |c: char| c.is_control() && !matches!(c, '\t' | '\n' | '\r');

    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_stripped(c)).collect())
}

/// Turns an HTML fragment into plain text: tags removed, entities decoded.
pub fn html_to_text(s: &str) -> String {
    static RE_TAGS: OnceLock<Regex> = OnceLock::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)<[^>]*>").expect("static regex"));

    let without_tags = re_tags.replace_all(s, " ");
    html_escape::decode_html_entities(&without_tags).into_owned()
}
