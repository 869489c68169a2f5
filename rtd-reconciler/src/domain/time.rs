//! Timetable feed time handling.
//!
//! The feed encodes every timestamp as a compact `yyMMddHHmm` string
//! (e.g. `2102010812` for 2021-02-01 08:12). Plan and change batches are
//! published per hour, so this module also provides the [`HourBucket`] that
//! partitions them.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Error returned when parsing an invalid feed time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid feed time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Format used when timestamps are written to storage.
pub const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a feed timestamp in `yyMMddHHmm` format.
///
/// Years are interpreted as 20yy.
///
/// # Examples
///
/// ```
/// use rtd_reconciler::domain::parse_feed_time;
///
/// let t = parse_feed_time("2102010812").unwrap();
/// assert_eq!(t.to_string(), "2021-02-01 08:12:00");
///
/// assert!(parse_feed_time("21020108").is_err());
/// assert!(parse_feed_time("2113010812").is_err());
/// ```
pub fn parse_feed_time(s: &str) -> Result<NaiveDateTime, TimeError> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 {
        return Err(TimeError::new("expected yyMMddHHmm format"));
    }

    let year = parse_two_digits(&bytes[0..2]).ok_or_else(|| TimeError::new("invalid year"))?;
    let month = parse_two_digits(&bytes[2..4]).ok_or_else(|| TimeError::new("invalid month"))?;
    let day = parse_two_digits(&bytes[4..6]).ok_or_else(|| TimeError::new("invalid day"))?;
    let hour = parse_two_digits(&bytes[6..8]).ok_or_else(|| TimeError::new("invalid hour"))?;
    let minute =
        parse_two_digits(&bytes[8..10]).ok_or_else(|| TimeError::new("invalid minute"))?;

    let date = NaiveDate::from_ymd_opt(2000 + year as i32, month, day)
        .ok_or_else(|| TimeError::new("date out of range"))?;
    let time =
        NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| TimeError::new("time out of range"))?;

    Ok(date.and_time(time))
}

/// Parse two ASCII digits into a number.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    match bytes {
        [a, b] if a.is_ascii_digit() && b.is_ascii_digit() => {
            Some(((a - b'0') * 10 + (b - b'0')) as u32)
        }
        _ => None,
    }
}

/// Render a timestamp the way it is stored in the database.
pub fn to_storage(dt: &NaiveDateTime) -> String {
    dt.format(STORAGE_FORMAT).to_string()
}

/// Parse a timestamp previously written with [`to_storage`].
pub fn from_storage(s: &str) -> Result<NaiveDateTime, TimeError> {
    NaiveDateTime::parse_from_str(s, STORAGE_FORMAT)
        .map_err(|_| TimeError::new("expected YYYY-MM-DD HH:MM:SS"))
}

/// One-hour publishing partition of the timetable feed.
///
/// Always aligned to the start of an hour.
///
/// # Examples
///
/// ```
/// use rtd_reconciler::domain::{HourBucket, parse_feed_time};
///
/// let bucket = HourBucket::containing(parse_feed_time("2102010812").unwrap());
/// assert_eq!(bucket.to_string(), "2021-02-01T08:00");
/// assert_eq!(bucket.offset(3).to_string(), "2021-02-01T11:00");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HourBucket(NaiveDateTime);

impl HourBucket {
    /// The bucket that contains the given instant.
    pub fn containing(dt: NaiveDateTime) -> Self {
        let start = dt
            .date()
            .and_hms_opt(dt.hour(), 0, 0)
            .unwrap_or(dt);
        Self(start)
    }

    /// Parse a bucket from `YYYY-MM-DDTHH:MM` (minutes are truncated).
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
            .map(Self::containing)
            .map_err(|_| TimeError::new("expected YYYY-MM-DDTHH:MM"))
    }

    /// Start of the bucket.
    pub fn start(&self) -> NaiveDateTime {
        self.0
    }

    /// The bucket `hours` later (or earlier, if negative).
    ///
    /// Saturates at the first or last bucket chrono can represent.
    pub fn offset(&self, hours: i64) -> Self {
        self.checked_offset(hours).unwrap_or_else(|| {
            Self::containing(if hours < 0 {
                NaiveDateTime::MIN
            } else {
                NaiveDateTime::MAX
            })
        })
    }

    /// The bucket `hours` later, or `None` if it is out of range.
    pub fn checked_offset(&self, hours: i64) -> Option<Self> {
        Duration::try_hours(hours)
            .and_then(|d| self.0.checked_add_signed(d))
            .map(Self)
    }

    /// The immediately following bucket.
    pub fn next(&self) -> Self {
        self.offset(1)
    }

    /// All buckets in `[self, end)`.
    pub fn range_to(self, end: HourBucket) -> impl Iterator<Item = HourBucket> {
        let hours = end.0.signed_duration_since(self.0).num_hours().max(0);
        (0..hours).map(move |h| self.offset(h))
    }

    /// Compact `yyMMddHH` key used by the file feed layout.
    pub fn file_key(&self) -> String {
        self.0.format("%y%m%d%H").to_string()
    }
}

impl fmt::Debug for HourBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HourBucket({})", self)
    }
}

impl fmt::Display for HourBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M"))
    }
}

impl<'de> Deserialize<'de> for HourBucket {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        HourBucket::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn parse_valid_feed_times() {
        assert_eq!(parse_feed_time("2102010812").unwrap(), dt(2021, 2, 1, 8, 12));
        assert_eq!(parse_feed_time("2012312359").unwrap(), dt(2020, 12, 31, 23, 59));
        assert_eq!(parse_feed_time("0001010000").unwrap(), dt(2000, 1, 1, 0, 0));
    }

    #[test]
    fn reject_bad_feed_times() {
        assert!(parse_feed_time("").is_err());
        assert!(parse_feed_time("210201081").is_err());
        assert!(parse_feed_time("21020108120").is_err());
        assert!(parse_feed_time("21O2010812").is_err());
        assert!(parse_feed_time("2102300812").is_err()); // 30 Feb
        assert!(parse_feed_time("2102012412").is_err());
        assert!(parse_feed_time("2102010860").is_err());
    }

    #[test]
    fn storage_roundtrip() {
        let t = dt(2021, 2, 1, 8, 12);
        assert_eq!(to_storage(&t), "2021-02-01 08:12:00");
        assert_eq!(from_storage(&to_storage(&t)).unwrap(), t);
        assert!(from_storage("yesterday").is_err());
    }

    #[test]
    fn bucket_from_yaml() {
        let bucket: HourBucket = serde_yaml::from_str("2020-01-01T00:00").unwrap();
        assert_eq!(bucket.start(), dt(2020, 1, 1, 0, 0));
        assert!(serde_yaml::from_str::<HourBucket>("tomorrow").is_err());
    }

    #[test]
    fn bucket_truncates_to_hour() {
        let bucket = HourBucket::containing(dt(2021, 2, 1, 8, 59));
        assert_eq!(bucket.start(), dt(2021, 2, 1, 8, 0));
        assert_eq!(HourBucket::parse("2021-02-01T08:37").unwrap(), bucket);
    }

    #[test]
    fn bucket_offsets_cross_midnight() {
        let bucket = HourBucket::containing(dt(2021, 2, 1, 22, 0));
        assert_eq!(bucket.offset(3).start(), dt(2021, 2, 2, 1, 0));
        assert_eq!(bucket.offset(-23).start(), dt(2021, 1, 31, 23, 0));
        assert_eq!(bucket.next(), bucket.offset(1));
    }

    #[test]
    fn out_of_range_offsets() {
        let bucket = HourBucket::parse("2021-02-01T08:00").unwrap();
        assert_eq!(bucket.checked_offset(-48), Some(bucket.offset(-48)));
        assert_eq!(bucket.checked_offset(i64::MAX), None);
        assert_eq!(bucket.checked_offset(i64::MIN), None);
        assert_eq!(bucket.checked_offset(24 * 366 * 300_000), None);

        assert_eq!(bucket.offset(i64::MIN), HourBucket::containing(NaiveDateTime::MIN));
        assert_eq!(bucket.offset(i64::MAX), HourBucket::containing(NaiveDateTime::MAX));
        assert_eq!(bucket.offset(i64::MAX).start().minute(), 0);
    }

    #[test]
    fn bucket_range() {
        let start = HourBucket::parse("2021-02-01T08:00").unwrap();
        let hours: Vec<_> = start.range_to(start.offset(3)).collect();
        assert_eq!(hours, vec![start, start.offset(1), start.offset(2)]);
        assert_eq!(start.range_to(start).count(), 0);
        assert_eq!(start.offset(2).range_to(start).count(), 0);
    }

    #[test]
    fn file_key_format() {
        let bucket = HourBucket::parse("2021-02-01T08:00").unwrap();
        assert_eq!(bucket.file_key(), "21020108");
        assert_eq!(bucket.to_string(), "2021-02-01T08:00");
        assert_eq!(format!("{:?}", bucket), "HourBucket(2021-02-01T08:00)");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any well-formed feed time parses and re-renders to the same digits
        #[test]
        fn feed_time_roundtrip(
            y in 0u32..100, mo in 1u32..13, d in 1u32..29, h in 0u32..24, mi in 0u32..60
        ) {
            let s = format!("{y:02}{mo:02}{d:02}{h:02}{mi:02}");
            let parsed = parse_feed_time(&s).unwrap();
            prop_assert_eq!(parsed.format("%y%m%d%H%M").to_string(), s);
        }

        /// Buckets always start on the hour and contain their instant
        #[test]
        fn bucket_contains_instant(mins in 0i64..10_000_000) {
            let t = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
                + Duration::minutes(mins);
            let bucket = HourBucket::containing(t);
            prop_assert_eq!(bucket.start().minute(), 0);
            prop_assert!(bucket.start() <= t);
            prop_assert!(t < bucket.next().start());
        }
    }
}
