//! Window resolution and request-parameter parsing for statistics.
//!
//! These run in the request layer before any fixes are fetched; the
//! aggregator itself only ever sees well-formed windows.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, Utc};

use super::{DateSpan, TimeRange};

// ---

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum RangeError {
    #[error("unknown period '{0}', expected one of: day, week, month, year")]
    UnknownPeriod(String),

    #[error("invalid {field} '{value}', expected YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate { field: &'static str, value: String },

    #[error("invalid {field} '{value}', expected a year between 1970 and 9999")]
    InvalidYear { field: &'static str, value: String },

    #[error("start ({start}) is after end ({end})")]
    StartAfterEnd { start: String, end: String },

    #[error("range of {requested} days exceeds the maximum of {max}")]
    TooLarge { requested: i64, max: i64 },
}

/// Keyword windows ending at "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    fn length(self) -> TimeDelta {
        match self {
            Period::Day => TimeDelta::days(1),
            Period::Week => TimeDelta::days(7),
            Period::Month => TimeDelta::days(30),
            Period::Year => TimeDelta::days(365),
        }
    }
}

impl FromStr for Period {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            _ => Err(RangeError::UnknownPeriod(s.to_string())),
        }
    }
}

/// Rolling window of `period` ending at `now`.
pub fn resolve_period(period: Period, now: DateTime<Utc>) -> TimeRange {
    TimeRange {
        start: now - period.length(),
        end: now,
    }
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| RangeError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

/// Parse an explicit window bound.
///
/// RFC 3339 timestamps are taken as-is. A bare date resolves to local
/// midnight, or to the last microsecond of that day when `end_of_day` is set.
pub fn parse_instant(
    field: &'static str,
    value: &str,
    offset: FixedOffset,
    end_of_day: bool,
) -> Result<DateTime<Utc>, RangeError> {
    // ---
    if let Ok(ts) = DateTime::parse_from_rfc3339(value.trim()) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = parse_date(field, value)?;
    let span = DateSpan {
        start: date,
        end: date,
    };
    let window = span.window(offset);
    Ok(if end_of_day { window.end } else { window.start })
}

/// Parse a four-digit year.
pub fn parse_year(field: &'static str, value: &str) -> Result<i32, RangeError> {
    value
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|year| (1970..=9999).contains(year))
        .ok_or_else(|| RangeError::InvalidYear {
            field,
            value: value.to_string(),
        })
}

/// Validate an inclusive date span of at most `max_days` days.
pub fn span_between(start: NaiveDate, end: NaiveDate, max_days: i64) -> Result<DateSpan, RangeError> {
    // ---
    if start > end {
        return Err(RangeError::StartAfterEnd {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    let span = DateSpan { start, end };
    if span.days() > max_days {
        return Err(RangeError::TooLarge {
            requested: span.days(),
            max: max_days,
        });
    }

    Ok(span)
}

/// Check an explicit window of at most `max_days` days before it is used to
/// query fixes.
pub fn check_window(range: TimeRange, max_days: i64) -> Result<TimeRange, RangeError> {
    // ---
    if range.start > range.end {
        return Err(RangeError::StartAfterEnd {
            start: range.start.to_rfc3339(),
            end: range.end.to_rfc3339(),
        });
    }

    let length = range.end - range.start;
    if length > TimeDelta::days(max_days) {
        // partial days count as whole ones
        let requested = length.num_days() + i64::from(length > TimeDelta::days(length.num_days()));
        return Err(RangeError::TooLarge {
            requested,
            max: max_days,
        });
    }

    Ok(range)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_period_keywords() {
        // ---
        assert_eq!("day".parse::<Period>(), Ok(Period::Day));
        assert_eq!("Week".parse::<Period>(), Ok(Period::Week));
        assert_eq!(" month ".parse::<Period>(), Ok(Period::Month));
        assert_eq!("YEAR".parse::<Period>(), Ok(Period::Year));
        assert_eq!(
            "fortnight".parse::<Period>(),
            Err(RangeError::UnknownPeriod("fortnight".to_string()))
        );
    }

    #[test]
    fn test_resolve_period_is_relative_to_now() {
        // ---
        let day = resolve_period(Period::Day, now());
        assert_eq!(day.end, now());
        assert_eq!(day.start, Utc.with_ymd_and_hms(2025, 6, 14, 14, 30, 0).unwrap());

        let week = resolve_period(Period::Week, now());
        assert_eq!(week.start, Utc.with_ymd_and_hms(2025, 6, 8, 14, 30, 0).unwrap());

        let month = resolve_period(Period::Month, now());
        assert_eq!(month.start, Utc.with_ymd_and_hms(2025, 5, 16, 14, 30, 0).unwrap());

        let year = resolve_period(Period::Year, now());
        assert_eq!(year.start, Utc.with_ymd_and_hms(2024, 6, 15, 14, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_instant() {
        // ---
        let utc = FixedOffset::east_opt(0).unwrap();

        assert_eq!(
            parse_instant("start", "2025-03-26T18:45:00Z", utc, false),
            Ok(Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap())
        );
        assert_eq!(
            parse_instant("start", "2025-03-26T18:45:00+01:00", utc, true),
            Ok(Utc.with_ymd_and_hms(2025, 3, 26, 17, 45, 0).unwrap())
        );
        assert_eq!(
            parse_instant("start", "2025-03-26", utc, false),
            Ok(Utc.with_ymd_and_hms(2025, 3, 26, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_instant("end", "2025-03-26", utc, true),
            Ok(Utc.with_ymd_and_hms(2025, 3, 27, 0, 0, 0).unwrap() - TimeDelta::microseconds(1))
        );
        assert!(matches!(
            parse_instant("end", "26/03/2025", utc, true),
            Err(RangeError::InvalidDate { field: "end", .. })
        ));
    }

    #[test]
    fn test_parse_year() {
        // ---
        assert_eq!(parse_year("year", "2025"), Ok(2025));
        assert!(parse_year("year", "25x").is_err());
        assert!(parse_year("year", "1969").is_err());
        assert!(parse_year("start_year", "10000").is_err());
    }

    #[test]
    fn test_span_between() {
        // ---
        let a = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();

        assert_eq!(span_between(a, b, 31).unwrap().days(), 31);
        assert_eq!(span_between(a, a, 1).unwrap().days(), 1);
        assert_eq!(
            span_between(a, b, 30),
            Err(RangeError::TooLarge {
                requested: 31,
                max: 30
            })
        );
        assert!(matches!(
            span_between(b, a, 366),
            Err(RangeError::StartAfterEnd { .. })
        ));
    }

    #[test]
    fn test_check_window() {
        // ---
        let ok = TimeRange {
            start: now() - TimeDelta::hours(1),
            end: now(),
        };
        assert_eq!(check_window(ok, 1), Ok(ok));

        let reversed = TimeRange {
            start: now(),
            end: now() - TimeDelta::hours(1),
        };
        assert!(matches!(
            check_window(reversed, 366),
            Err(RangeError::StartAfterEnd { .. })
        ));

        let full_day = TimeRange {
            start: now() - TimeDelta::days(366),
            end: now(),
        };
        assert_eq!(check_window(full_day, 366), Ok(full_day));

        let too_long = TimeRange {
            start: now() - TimeDelta::days(366) - TimeDelta::hours(1),
            end: now(),
        };
        assert_eq!(
            check_window(too_long, 366),
            Err(RangeError::TooLarge {
                requested: 367,
                max: 366
            })
        );
    }
}
