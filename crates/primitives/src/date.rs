//! Calendar date helpers and the columnar epoch-day encoding.

use chrono::{Datelike, Duration, NaiveDate};

/// The Unix epoch as a calendar date.
const EPOCH: Option<NaiveDate> = NaiveDate::from_ymd_opt(1970, 1, 1);

/// Convert a columnar epoch-day offset (days since 1970-01-01) to a date.
#[must_use]
pub fn date_from_epoch_days(days: i32) -> NaiveDate {
    EPOCH.expect("epoch is a valid date") + Duration::days(i64::from(days))
}

/// Convert a date to its columnar epoch-day offset.
#[must_use]
pub fn epoch_days_from_date(date: NaiveDate) -> i32 {
    (date - EPOCH.expect("epoch is a valid date")).num_days() as i32
}

/// Parse a `YYYY-MM-DD` date string.
///
/// Longer timestamps are accepted by truncating to the first ten characters,
/// which is how provider payloads with time components are normalized.
pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    let truncated = if s.len() > 10 { &s[..10] } else { s };
    NaiveDate::parse_from_str(truncated, "%Y-%m-%d")
}

/// Returns the last day of the month containing `date`.
#[must_use]
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (y, m) = (date.year(), date.month());
    let first_next = if m == 12 {
        NaiveDate::from_ymd_opt(y + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(y, m + 1, 1)
    };
    first_next.expect("valid month start") - Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_day_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(date_from_epoch_days(epoch_days_from_date(date)), date);
    }

    #[test]
    fn epoch_is_day_zero() {
        assert_eq!(epoch_days_from_date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(date_from_epoch_days(0), NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
    }

    #[test]
    fn parse_truncates_timestamps() {
        let parsed = parse_date("2023-06-15T00:00:00Z").unwrap();
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2023, 6, 15).unwrap());
    }

    #[test]
    fn month_end_handles_december() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 7).unwrap();
        assert_eq!(month_end(date), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn month_end_leap_february() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(month_end(date), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }
}
