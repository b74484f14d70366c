//! # Progress inference from free-form output.
//!
//! Scripts do not speak a protocol; progress is guessed from each output line:
//! - `... 42%` with `%` as the last character of the line (takes precedence)
//! - `[42%]` anywhere in the line
//!
//! Parsed values are clamped into `0..=100`; digit runs of any length saturate. Anything else is [`Progress::Unknown`]:
//! consumers keep their progress indicator as is and only display the message.

use std::sync::LazyLock;

use regex::Regex;

static TRAILING_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(-?\d+)\s*%$").expect("valid trailing percent regex"));

static BRACKETED_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(-?\d+)%\]").expect("valid bracketed percent regex"));

/// Progress reported with an output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// No percentage could be inferred.
    Unknown,
    /// Percentage in `0..=100`.
    Percent(u8),
}

impl Progress {
    /// Completed (`100`).
    pub const DONE: Progress = Progress::Percent(100);

    /// Builds a clamped percentage.
    pub fn clamped(value: i64) -> Self {
        Progress::Percent(value.clamp(0, 100) as u8)
    }

    /// Wire form: `0..=100`, or `-1` for unknown.
    #[inline]
    pub fn as_raw(self) -> i16 {
        match self {
            Progress::Unknown => -1,
            Progress::Percent(p) => i16::from(p),
        }
    }

    /// Percentage, if known.
    #[inline]
    pub fn percent(self) -> Option<u8> {
        match self {
            Progress::Unknown => None,
            Progress::Percent(p) => Some(p),
        }
    }
}

/// Extracts a percentage from one output line.
///
/// Pure function; never fails.
pub fn extract_progress(line: &str) -> Progress {
    let caps = TRAILING_PERCENT
        .captures(line)
        .or_else(|| BRACKETED_PERCENT.captures(line));

    caps.and_then(|c| c.get(1))
        .map_or(Progress::Unknown, |m| parse_percent(m.as_str()))
}

/// `digits` is `-?\d+`; the only parse failure left is overflow.
fn parse_percent(digits: &str) -> Progress {
    match digits.parse::<i64>() {
        Ok(value) => Progress::clamped(value),
        Err(_) if digits.starts_with('-') => Progress::Percent(0),
        Err(_) => Progress::DONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_percent() {
        assert_eq!(extract_progress("Step 3 42%"), Progress::Percent(42));
        assert_eq!(extract_progress("10%"), Progress::Percent(10));
        assert_eq!(extract_progress("almost 99 %"), Progress::Percent(99));
    }

    #[test]
    fn test_bracketed_percent_anywhere() {
        assert_eq!(extract_progress("[7%] loading"), Progress::Percent(7));
        assert_eq!(extract_progress("x [64%] y"), Progress::Percent(64));
    }

    #[test]
    fn test_trailing_form_wins_over_brackets() {
        assert_eq!(extract_progress("[10%] now at 80%"), Progress::Percent(80));
    }

    #[test]
    fn test_no_number_is_unknown() {
        assert_eq!(extract_progress("no number here"), Progress::Unknown);
        assert_eq!(extract_progress("100% sure, not at the end"), Progress::Unknown);
        assert_eq!(extract_progress(""), Progress::Unknown);
    }

    #[test]
    fn test_values_are_clamped() {
        assert_eq!(extract_progress("150%"), Progress::Percent(100));
        assert_eq!(extract_progress("-5%"), Progress::Percent(0));
        assert_eq!(extract_progress("[250%] overshoot"), Progress::Percent(100));
    }

    #[test]
    fn test_huge_values_saturate() {
        assert_eq!(extract_progress("99999999999999999999%"), Progress::Percent(100));
        assert_eq!(extract_progress("[-99999999999999999999%] x"), Progress::Percent(0));
    }

    #[test]
    fn test_percent_must_end_the_line() {
        assert_eq!(extract_progress("at 30% "), Progress::Unknown);
        assert_eq!(extract_progress("[30%] at 30% "), Progress::Percent(30));
    }

    #[test]
    fn test_raw_form() {
        assert_eq!(Progress::Unknown.as_raw(), -1);
        assert_eq!(Progress::Percent(55).as_raw(), 55);
        assert_eq!(Progress::DONE.percent(), Some(100));
    }
}
