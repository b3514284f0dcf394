use crate::error::{PathMutexError, Result};
use std::time::Duration;

/// Parse a lock timeout like "500ms", "30s", "5m", "2h" or "1d".
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    let invalid = |message: &str| PathMutexError::InvalidDuration {
        input: s.to_string(),
        message: message.to_string(),
    };

    if s.is_empty() {
        return Err(invalid("empty string"));
    }

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num_str, unit) = s.split_at(split);

    let value: u64 = num_str
        .parse()
        .map_err(|_| invalid("expected format: NUMBER[ms|s|m|h|d] (e.g., '500ms', '30s', '5m')"))?;

    if unit == "ms" {
        return Ok(Duration::from_millis(value));
    }

    let seconds_per_unit = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        other => return Err(invalid(&format!("unknown unit '{}'", other))),
    };

    let seconds = value
        .checked_mul(seconds_per_unit)
        .ok_or_else(|| invalid("duration too large"))?;
    Ok(Duration::from_secs(seconds))
}
