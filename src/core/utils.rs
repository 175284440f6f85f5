/// Makes a string safe to use as a file name on any platform.
///
/// Path separators, Windows-reserved characters and control characters
/// become `_`, double quotes become single quotes. Leading/trailing
/// whitespace and dots are stripped; an empty result becomes `"unnamed"`.
///
/// ```
/// use tunefetch::core::utils::escape_filename;
///
/// assert_eq!(escape_filename("AC/DC: Back in Black?"), "AC_DC_ Back in Black_");
/// assert_eq!(escape_filename(" ... "), "unnamed");
/// ```
pub fn escape_filename(filename: &str) -> String {
    let mut result = String::with_capacity(filename.len());

    for c in filename.chars() {
        match c {
            '/' | '\\' => result.push('_'),
            ':' | '*' | '?' | '<' | '>' | '|' => result.push('_'),
            '"' => result.push('\''),
            c if c.is_control() => result.push('_'),
            _ => result.push(c),
        }
    }

    let result = result.trim_matches(|c: char| c.is_whitespace() || c == '.');

    if result.is_empty() {
        "unnamed".to_string()
    } else {
        result.to_string()
    }
}

/// Truncates to at most `max_chars` characters, appending `…` when cut.
/// Never splits a UTF-8 sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}

/// Human readable byte size in MiB with one decimal.
pub fn format_mib(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_filename_keeps_unicode() {
        assert_eq!(escape_filename("Şımarık"), "Şımarık");
        assert_eq!(escape_filename("a\"b\"c"), "a'b'c");
        assert_eq!(escape_filename("line\nbreak"), "line_break");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 4), "abc…");
        assert_eq!(truncate_chars("çğüşöı", 3), "çğ…");
    }

    #[test]
    fn test_format_mib() {
        assert_eq!(format_mib(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_mib(0), "0.0 MB");
    }
}
