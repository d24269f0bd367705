/// Year-less glog timestamps to absolute UTC times.
///
/// A glog header carries `MMDD HH:MM:SS.ffffff` and no year. The month
/// digits are turned into an abbreviation, the caller's reference year is
/// injected, and the composite `Mon DD HH:MM:SS.ffffff` is parsed. Lines
/// from either side of a New Year boundary are not reconciled.
use chrono::{DateTime, NaiveDateTime, Utc};

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Layout of the composite string, with the reference year prepended.
const LAYOUT: &str = "%Y %b %d %H:%M:%S.%6f";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampParseError {
    /// Month capture is not a number.
    InvalidMonth { input: String },
    /// Month number outside 1..=12.
    MonthOutOfRange { month: u32 },
    /// Remainder is not `DD HH:MM:SS.ffffff`, or names an impossible date.
    Fragment {
        input: String,
        source: chrono::ParseError,
    },
}

impl std::fmt::Display for TimestampParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimestampParseError::InvalidMonth { input } => {
                write!(f, "invalid month index {input:?}")
            }
            TimestampParseError::MonthOutOfRange { month } => {
                write!(f, "month index {month} out of range 1-12")
            }
            TimestampParseError::Fragment { input, source } => {
                write!(f, "invalid timestamp {input:?}: {source}")
            }
        }
    }
}

impl std::error::Error for TimestampParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TimestampParseError::Fragment { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Three-letter abbreviation for a 1-based month index.
pub fn month_abbreviation(month: u32) -> Result<&'static str, TimestampParseError> {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_ABBREVIATIONS.get(i as usize))
        .copied()
        .ok_or(TimestampParseError::MonthOutOfRange { month })
}

/// Build an absolute time from captured month digits and a `DD HH:MM:SS.ffffff` fragment.
pub fn normalize(
    month: &str,
    fragment: &str,
    reference_year: i32,
) -> Result<DateTime<Utc>, TimestampParseError> {
    let index: u32 = month
        .trim()
        .parse()
        .map_err(|_| TimestampParseError::InvalidMonth {
            input: month.to_string(),
        })?;
    let stamp = format!("{} {}", month_abbreviation(index)?, fragment.trim());

    NaiveDateTime::parse_from_str(&format!("{reference_year} {stamp}"), LAYOUT)
        .map(|naive| naive.and_utc())
        .map_err(|e| TimestampParseError::Fragment {
            input: stamp,
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    #[test]
    fn test_normalize_injects_reference_year() {
        let t = normalize("01", "15 10:00:00.000000", 2026).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_normalize_keeps_microseconds() {
        let t = normalize("12", "31 23:59:59.123456", 2025).unwrap();
        let expected =
            Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap() + TimeDelta::microseconds(123_456);
        assert_eq!(t, expected);
    }

    #[test]
    fn test_normalize_difference_between_events() {
        let a = normalize("01", "15 10:00:00.000000", 2026).unwrap();
        let b = normalize("01", "15 10:00:05.500000", 2026).unwrap();
        assert_eq!(b - a, TimeDelta::milliseconds(5500));
    }

    #[test]
    fn test_normalize_month_out_of_range() {
        assert_eq!(
            normalize("13", "01 00:00:00.000000", 2026).unwrap_err(),
            TimestampParseError::MonthOutOfRange { month: 13 }
        );
        assert_eq!(
            normalize("00", "01 00:00:00.000000", 2026).unwrap_err(),
            TimestampParseError::MonthOutOfRange { month: 0 }
        );
    }

    #[test]
    fn test_normalize_non_numeric_month() {
        let err = normalize("ja", "01 00:00:00.000000", 2026).unwrap_err();
        assert!(matches!(err, TimestampParseError::InvalidMonth { .. }));
    }

    #[test]
    fn test_normalize_rejects_malformed_fragment() {
        for fragment in ["15 10:00", "15 10:00:00", "15 10:00:00.000", "x 10:00:00.000000", ""] {
            let err = normalize("01", fragment, 2026).unwrap_err();
            assert!(
                matches!(err, TimestampParseError::Fragment { .. }),
                "{fragment:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_normalize_leap_day_depends_on_reference_year() {
        assert!(normalize("02", "29 00:00:00.000000", 2024).is_ok());
        assert!(normalize("02", "29 00:00:00.000000", 2025).is_err());
    }

    #[test]
    fn test_month_abbreviation() {
        assert_eq!(month_abbreviation(1).unwrap(), "Jan");
        assert_eq!(month_abbreviation(12).unwrap(), "Dec");
        assert!(month_abbreviation(0).is_err());
    }
}
