//! Utility functions shared by the pipeline crates.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Works on character boundaries, so multi-byte UTF-8 text is never split.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Parse a duration string like "5m", "1h", "30s" into seconds.
///
/// A bare number is read as seconds. Negative values are rejected by the
/// parser; zero is accepted here and rejected by config validation.
pub fn parse_duration_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Empty duration string".into());
    }

    if s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse().map_err(|_| format!("Invalid number: {s}"));
    }

    let unit_len = s.chars().last().map_or(0, char::len_utf8);
    let (num_str, unit) = s.split_at(s.len() - unit_len);
    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {num_str}"))?;

    let factor = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        "w" => 604_800,
        _ => return Err(format!("Unknown unit: {unit}")),
    };

    num.checked_mul(factor)
        .ok_or_else(|| format!("Duration overflows: {s}"))
}

/// Format a number of seconds back into the shortest exact unit string.
pub fn format_duration_secs(secs: u64) -> String {
    const UNITS: &[(u64, &str)] = &[(604_800, "w"), (86400, "d"), (3600, "h"), (60, "m")];

    for (factor, unit) in UNITS {
        if secs > 0 && secs % factor == 0 {
            return format!("{}{}", secs / factor, unit);
        }
    }
    format!("{secs}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
        assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
        assert_eq!(truncate_with_ellipsis("😀😀😀😀", 2), "😀😀...");
        assert_eq!(truncate_with_ellipsis("", 10), "");
    }

    #[test_case("30s", 30 ; "seconds")]
    #[test_case("5m", 300 ; "minutes")]
    #[test_case("1h", 3600 ; "hours")]
    #[test_case("2d", 172_800 ; "days")]
    #[test_case("1w", 604_800 ; "weeks")]
    #[test_case("90", 90 ; "bare number")]
    #[test_case("0h", 0 ; "zero")]
    fn test_parse_duration_secs_ok(input: &str, expected: u64) {
        assert_eq!(parse_duration_secs(input).unwrap(), expected);
    }

    #[test_case("" ; "empty")]
    #[test_case("abc" ; "garbage")]
    #[test_case("-1h" ; "negative")]
    #[test_case("5y" ; "unknown unit")]
    fn test_parse_duration_secs_err(input: &str) {
        assert!(parse_duration_secs(input).is_err());
    }

    #[test]
    fn test_format_duration_secs() {
        assert_eq!(format_duration_secs(3600), "1h");
        assert_eq!(format_duration_secs(5400), "90m");
        assert_eq!(format_duration_secs(45), "45s");
        assert_eq!(format_duration_secs(0), "0s");
        assert_eq!(parse_duration_secs(&format_duration_secs(172_800)).unwrap(), 172_800);
    }
}
