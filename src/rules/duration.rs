//! Prometheus duration strings (`10s`, `1m30s`, `5h`, ...)

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

const MS_PER_SECOND: u64 = 1000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;
const MS_PER_WEEK: u64 = 7 * MS_PER_DAY;
const MS_PER_YEAR: u64 = 365 * MS_PER_DAY;

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(\d+)y)?(?:(\d+)w)?(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?(?:(\d+)ms)?$",
        )
        .expect("duration pattern is valid")
    })
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DurationError {
    #[error("empty duration string")]
    Empty,

    #[error("not a valid duration string: {0:?}")]
    Invalid(String),

    #[error("duration out of range: {0:?}")]
    Overflow(String),
}

/// Parse a duration with units y, w, d, h, m, s, ms, largest first
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    match input {
        "" => return Err(DurationError::Empty),
        "0" => return Ok(Duration::ZERO),
        _ => {}
    }

    let caps = duration_regex()
        .captures(input)
        .ok_or_else(|| DurationError::Invalid(input.to_string()))?;

    let units = [
        MS_PER_YEAR,
        MS_PER_WEEK,
        MS_PER_DAY,
        MS_PER_HOUR,
        MS_PER_MINUTE,
        MS_PER_SECOND,
        1,
    ];

    let mut total_ms: u64 = 0;
    let mut matched = false;
    for (idx, unit) in units.iter().enumerate() {
        let Some(group) = caps.get(idx + 1) else {
            continue;
        };
        matched = true;
        let count: u64 = group
            .as_str()
            .parse()
            .map_err(|_| DurationError::Overflow(input.to_string()))?;
        total_ms = count
            .checked_mul(*unit)
            .and_then(|ms| total_ms.checked_add(ms))
            .ok_or_else(|| DurationError::Overflow(input.to_string()))?;
    }

    if !matched {
        return Err(DurationError::Invalid(input.to_string()));
    }

    Ok(Duration::from_millis(total_ms))
}
