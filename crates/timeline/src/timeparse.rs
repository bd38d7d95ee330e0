//! Tolerant clock-time parsing for the marker time entry fields.
//!
//! Accepted shapes: bare seconds ("15", "7.25"), minutes:seconds
//! ("1:23.45"), and hours:minutes:seconds ("1:02:03"). Fractional seconds
//! are allowed in every shape.

use crate::Seconds;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("empty time string")]
    Empty,
    #[error("malformed time: {0:?}")]
    Malformed(String),
    #[error("component out of range in {0:?}")]
    OutOfRange(String),
}

/// Parses user input into seconds. Whitespace around the value is ignored;
/// negative times are rejected. When a higher unit is present the lower
/// components must stay below 60.
pub fn parse_time(input: &str) -> Result<Seconds, TimeParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimeParseError::Empty);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(TimeParseError::Malformed(trimmed.to_string()));
    }

    let component = |s: &str| -> Result<f64, TimeParseError> {
        let value: f64 = s
            .parse()
            .map_err(|_| TimeParseError::Malformed(trimmed.to_string()))?;
        if value.is_sign_negative() || !value.is_finite() {
            return Err(TimeParseError::OutOfRange(trimmed.to_string()));
        }
        Ok(value)
    };

    // only the last component may carry a fraction
    for whole in &parts[..parts.len() - 1] {
        if whole.contains('.') {
            return Err(TimeParseError::Malformed(trimmed.to_string()));
        }
    }

    let values: Vec<f64> = parts
        .iter()
        .map(|p| component(p))
        .collect::<Result<_, _>>()?;

    let seconds = match values.as_slice() {
        [s] => *s,
        [m, s] => {
            if *s >= 60.0 {
                return Err(TimeParseError::OutOfRange(trimmed.to_string()));
            }
            m * 60.0 + s
        }
        [h, m, s] => {
            if *m >= 60.0 || *s >= 60.0 {
                return Err(TimeParseError::OutOfRange(trimmed.to_string()));
            }
            h * 3600.0 + m * 60.0 + s
        }
        _ => unreachable!("len checked above"),
    };
    Ok(seconds)
}

/// Renders seconds as "M:SS.cc" for marker labels and time fields.
pub fn format_time(seconds: Seconds) -> String {
    let seconds = seconds.max(0.0);
    let minutes = (seconds / 60.0).floor() as u64;
    let rem = seconds - minutes as f64 * 60.0;
    format!("{minutes}:{rem:05.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Seconds, b: Seconds) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_parse_bare_seconds() {
        assert!(close(parse_time("15").unwrap(), 15.0));
        assert!(close(parse_time("7.25").unwrap(), 7.25));
        assert!(close(parse_time(" 0 ").unwrap(), 0.0));
    }

    #[test]
    fn test_parse_minutes_seconds() {
        assert!(close(parse_time("1:23.45").unwrap(), 83.45));
        assert!(close(parse_time("0:15.5").unwrap(), 15.5));
        assert!(close(parse_time("10:00").unwrap(), 600.0));
    }

    #[test]
    fn test_parse_hours() {
        assert!(close(parse_time("1:02:03").unwrap(), 3723.0));
        assert!(close(parse_time("0:00:00.5").unwrap(), 0.5));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(parse_time(""), Err(TimeParseError::Empty));
        assert_eq!(parse_time("   "), Err(TimeParseError::Empty));
        assert!(matches!(
            parse_time("abc"),
            Err(TimeParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_time("1:2:3:4"),
            Err(TimeParseError::Malformed(_))
        ));
        assert!(matches!(parse_time("1:"), Err(TimeParseError::Malformed(_))));
        assert!(matches!(
            parse_time("-5"),
            Err(TimeParseError::OutOfRange(_)) | Err(TimeParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_time("1:75"),
            Err(TimeParseError::OutOfRange(_))
        ));
        assert!(matches!(
            // fractional minutes are ambiguous, reject them
            parse_time("1.5:00"),
            Err(TimeParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00.00");
        assert_eq!(format_time(83.45), "1:23.45");
        assert_eq!(format_time(600.0), "10:00.00");
        assert_eq!(format_time(-3.0), "0:00.00");
    }

    #[test]
    fn test_round_trip_of_formatted_values() {
        for t in [0.0, 12.34, 59.99, 61.5, 754.2] {
            let formatted = format_time(t);
            let parsed = parse_time(&formatted).unwrap();
            assert!((parsed - t).abs() < 0.005, "{t} -> {formatted} -> {parsed}");
        }
    }
}
