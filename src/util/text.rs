use std::borrow::Cow;

/// Ellipsis appended when text is cut.
const ELLIPSIS: &str = "...";

/// Truncates a string to at most `max_chars` Unicode scalar values.
///
/// Discord measures its message limit in characters, not bytes, so this never
/// splits a code point. When truncation happens the result ends with `"..."`
/// and is exactly `max_chars` characters long.
///
/// Returns `Cow::Borrowed` when the input already fits.
///
/// # Examples
///
/// ```
/// use feedwatch::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("Hello World", 8), "Hello...");
/// assert_eq!(truncate_chars("Test", 2), "Te");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    // Byte offset of the char at index `max_chars`, if the string is longer.
    let Some((overflow_at, _)) = s.char_indices().nth(max_chars) else {
        return Cow::Borrowed(s);
    };

    // Too narrow for "x...": hard cut without ellipsis
    if max_chars <= ELLIPSIS.len() {
        return Cow::Owned(s[..overflow_at].to_string());
    }

    let keep = max_chars - ELLIPSIS.len();
    let cut = s
        .char_indices()
        .nth(keep)
        .map(|(idx, _)| idx)
        .unwrap_or(s.len());
    Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS))
}

/// Strips control characters from feed-supplied text.
///
/// Keeps tab and newline; drops carriage returns, other C0 controls, DEL and
/// C1 controls. Returns `Cow::Borrowed` for clean input (the common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_stripped = |c: char| c.is_control() && c != '\n' && c != '\t';

    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_stripped(c)).collect())
}

/// Escapes Discord markdown metacharacters so feed text renders literally.
pub fn escape_markdown(s: &str) -> Cow<'_, str> {
    const SPECIAL: &[char] = &['\\', '*', '_', '~', '`', '|', '>'];

    if !s.contains(SPECIAL) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        if SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_fits_is_borrowed() {
        let result = truncate_chars("Short", 10);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "Short");
    }

    #[test]
    fn test_truncate_exact_fit() {
        assert_eq!(truncate_chars("12345", 5), "12345");
    }

    #[test]
    fn test_truncate_appends_ellipsis() {
        assert_eq!(truncate_chars("Hello World", 8), "Hello...");
        assert_eq!(truncate_chars("Testing", 4), "T...");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        // 6 chars, 18 bytes
        let cjk = "日本語テスト";
        assert_eq!(truncate_chars(cjk, 6), cjk);
        assert_eq!(truncate_chars(cjk, 5), "日本...");
        assert_eq!(truncate_chars(cjk, 5).chars().count(), 5);
    }

    #[test]
    fn test_truncate_narrow_widths() {
        assert_eq!(truncate_chars("Test", 0), "");
        assert_eq!(truncate_chars("Test", 1), "T");
        assert_eq!(truncate_chars("Test", 3), "Tes");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn test_strip_clean_text_returns_borrowed() {
        let input = "line1\nline2\ttabbed";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_strip_removes_controls() {
        assert_eq!(strip_control_chars("he\x00ll\x07o\r\n w\x7fo\u{85}rld"), "hello\n world");
    }

    #[test]
    fn test_strip_unicode_preserved() {
        assert_eq!(strip_control_chars("日本語\x1bテキスト"), "日本語テキスト");
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("plain"), "plain");
        assert_eq!(escape_markdown("**bold**"), "\\*\\*bold\\*\\*");
        assert_eq!(escape_markdown("snake_case | a>b"), "snake\\_case \\| a\\>b");
    }
}
