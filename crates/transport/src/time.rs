//! `m:ss` timestamps.

use std::sync::LazyLock;

use regex::Regex;

use crate::TransportError;

pub const TIMESTAMP_PATTERN: &str = "^[0-9]+:[0-5][0-9]$";

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TIMESTAMP_PATTERN).expect("timestamp pattern compiles"));

/// Format milliseconds as `m:ss`, rounded to the nearest second.
pub fn ms_to_display(ms: i64) -> Result<String, TransportError> {
    if ms < 0 {
        return Err(TransportError::NegativeTime(ms));
    }
    let seconds = ms / 1000 + i64::from(ms % 1000 >= 500);
    Ok(format!("{}:{:02}", seconds / 60, seconds % 60))
}

/// Display form of an unsigned position.
pub(crate) fn display(ms: u64) -> String {
    let seconds = ms / 1000 + u64::from(ms % 1000 >= 500);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Parse `m:ss` into milliseconds.
pub fn display_to_ms(text: &str) -> Result<u64, TransportError> {
    let invalid = || TransportError::InvalidTimestamp(text.to_string());
    if !TIMESTAMP.is_match(text) {
        return Err(invalid());
    }

    let (minutes, seconds) = text.split_once(':').ok_or_else(invalid)?;
    let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
    let seconds: u64 = seconds.parse().map_err(|_| invalid())?;

    minutes
        .checked_mul(60)
        .and_then(|m| m.checked_add(seconds))
        .and_then(|s| s.checked_mul(1000))
        .ok_or_else(invalid)
}

/// Check a start timestamp against the file's length. Empty input means
/// the beginning.
pub fn validate_start_time(duration_ms: u64, input: &str) -> Result<u64, TransportError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(0);
    }

    let ms = display_to_ms(input)?;
    if ms > duration_ms {
        return Err(TransportError::StartBeyondEnd {
            requested: input.to_string(),
            duration: display(duration_ms),
        });
    }
    Ok(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_to_display() {
        assert_eq!(ms_to_display(0).unwrap(), "0:00");
        assert_eq!(ms_to_display(999).unwrap(), "0:01");
        assert_eq!(ms_to_display(499).unwrap(), "0:00");
        assert_eq!(ms_to_display(59_499).unwrap(), "0:59");
        assert_eq!(ms_to_display(59_500).unwrap(), "1:00");
        assert_eq!(ms_to_display(90_000).unwrap(), "1:30");
        assert_eq!(ms_to_display(754_000).unwrap(), "12:34");
    }

    #[test]
    fn test_display_at_the_top_of_the_range() {
        let seconds = i64::MAX / 1000 + 1;
        let expected = format!("{}:{:02}", seconds / 60, seconds % 60);
        assert_eq!(ms_to_display(i64::MAX).unwrap(), expected);

        let seconds = u64::MAX / 1000 + 1;
        assert_eq!(display(u64::MAX), format!("{}:{:02}", seconds / 60, seconds % 60));
    }

    #[test]
    fn test_ms_to_display_negative() {
        assert!(matches!(ms_to_display(-1), Err(TransportError::NegativeTime(-1))));
    }

    #[test]
    fn test_display_to_ms() {
        assert_eq!(display_to_ms("0:00").unwrap(), 0);
        assert_eq!(display_to_ms("1:00").unwrap(), 60_000);
        assert_eq!(display_to_ms("10:59").unwrap(), 659_000);
        assert_eq!(display_to_ms("0:12").unwrap(), 12_000);
    }

    #[test]
    fn test_display_to_ms_rejects_bad_input() {
        for bad in ["0:60", "12", "1:2", ":12", "1:23 ", "-1:00", "a:bc", ""] {
            assert!(
                matches!(display_to_ms(bad), Err(TransportError::InvalidTimestamp(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_invalid_timestamp_message() {
        let message = display_to_ms("0:60").unwrap_err().to_string();
        assert!(message.contains(TIMESTAMP_PATTERN));
        assert!(message.contains("1:23, 10:59, 0:12"));
    }

    #[test]
    fn test_validate_start_time() {
        assert_eq!(validate_start_time(90_000, "").unwrap(), 0);
        assert_eq!(validate_start_time(90_000, "1:30").unwrap(), 90_000);

        let err = validate_start_time(90_000, "1:31").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Duration 1:31 is longer than duration of actual MIDI file 1:30"
        );
        assert!(matches!(
            validate_start_time(90_000, "1:3"),
            Err(TransportError::InvalidTimestamp(_))
        ));
    }
}
