//! Time-bucket arithmetic: every timestamp maps to one of at most
//! 12 months x 2 day types x 24 hours recurring baseline buckets.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::error::{Error, Result};

/// Weekday bucket component.
pub const DAY_TYPE_WEEKDAY: i64 = 1;
/// Weekend bucket component.
pub const DAY_TYPE_WEEKEND: i64 = 2;

/// Resolves an IANA timezone name, e.g. "Europe/Moscow".
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| Error::Config(format!("unknown timezone '{}'", name)))
}

/// Converts a unix timestamp to city-local time.
pub fn local_time(timestamp: i64, tz: Tz) -> Result<DateTime<Tz>> {
    match Utc.timestamp_opt(timestamp, 0) {
        chrono::LocalResult::Single(utc) => Ok(utc.with_timezone(&tz)),
        _ => Err(Error::Config(format!("timestamp {} out of range", timestamp))),
    }
}

/// Computes the bucket id of a timestamp in the given timezone:
/// `month * 1000 + day_type * 100 + hour`, with day_type 1 for
/// weekdays and 2 for weekends.
pub fn bucket_id(timestamp: i64, tz: Tz) -> Result<i64> {
    let local = local_time(timestamp, tz)?;
    let day_type = match local.weekday() {
        Weekday::Sat | Weekday::Sun => DAY_TYPE_WEEKEND,
        _ => DAY_TYPE_WEEKDAY,
    };
    Ok(i64::from(local.month()) * 1000 + day_type * 100 + i64::from(local.hour()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(tz: Tz, y: i32, mo: u32, d: u32, h: u32) -> i64 {
        tz.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap().timestamp()
    }

    #[test]
    fn test_parse_timezone() {
        assert!(parse_timezone("Europe/Moscow").is_ok());
        assert!(matches!(parse_timezone("Mars/Olympus"), Err(Error::Config(_))));
    }

    #[test]
    fn test_weekday_bucket() {
        let tz: Tz = "Europe/Moscow".parse().unwrap();
        // 2024-07-10 is a Wednesday.
        let id = bucket_id(ts(tz, 2024, 7, 10, 15), tz).unwrap();
        assert_eq!(id, 7 * 1000 + 100 + 15);
    }

    #[test]
    fn test_weekend_bucket() {
        let tz: Tz = "Europe/Moscow".parse().unwrap();
        // 2024-07-13 is a Saturday.
        let id = bucket_id(ts(tz, 2024, 7, 13, 9), tz).unwrap();
        assert_eq!(id, 7 * 1000 + 200 + 9);
    }

    #[test]
    fn test_bucket_respects_timezone() {
        let moscow: Tz = "Europe/Moscow".parse().unwrap();
        let utc: Tz = "UTC".parse().unwrap();
        // 23:30 UTC on a Friday is already Saturday 02:30 in Moscow.
        let t = utc.with_ymd_and_hms(2024, 7, 12, 23, 30, 0).unwrap().timestamp();
        assert_eq!(bucket_id(t, utc).unwrap(), 7 * 1000 + 100 + 23);
        assert_eq!(bucket_id(t, moscow).unwrap(), 7 * 1000 + 200 + 2);
    }

    #[test]
    fn test_month_boundary() {
        let tz: Tz = "UTC".parse().unwrap();
        // 2024-01-01 is a Monday, 2024-12-31 is a Tuesday.
        assert_eq!(bucket_id(ts(tz, 2024, 1, 1, 0), tz).unwrap(), 1100);
        assert_eq!(bucket_id(ts(tz, 2024, 12, 31, 23), tz).unwrap(), 12123);
    }
}
