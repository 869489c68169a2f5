//! Stop identity: the feed's natural key and the derived 64-bit identifier.

use std::fmt;

use chrono::NaiveDateTime;
use twox_hash::XxHash64;

use super::time::parse_feed_time;

/// Error returned when a stop's natural key cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid natural key {key:?}: {reason}")]
pub struct InvalidNaturalKey {
    key: String,
    reason: &'static str,
}

impl InvalidNaturalKey {
    fn new(key: &str, reason: &'static str) -> Self {
        Self {
            key: key.to_string(),
            reason,
        }
    }

    /// The key that failed to parse.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Parsed `dailyId-date-sequence` key identifying one stop of one trip.
///
/// The daily trip id is a signed number and may itself start with `-`,
/// so the key is split from the right.
///
/// # Examples
///
/// ```
/// use rtd_reconciler::domain::NaturalKey;
///
/// let key = NaturalKey::parse("-7874571842864554321-2102010800-3").unwrap();
/// assert_eq!(key.daily_id(), -7874571842864554321);
/// assert_eq!(key.sequence(), 3);
///
/// assert!(NaturalKey::parse("42-2102010800").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    raw: String,
    daily_id: i64,
    date: NaiveDateTime,
    sequence: i32,
}

impl NaturalKey {
    /// Parse a natural key string.
    pub fn parse(s: &str) -> Result<Self, InvalidNaturalKey> {
        let mut parts = s.rsplitn(3, '-');
        let sequence = parts
            .next()
            .ok_or_else(|| InvalidNaturalKey::new(s, "missing sequence"))?;
        let date = parts
            .next()
            .ok_or_else(|| InvalidNaturalKey::new(s, "missing date"))?;
        let daily_id = parts
            .next()
            .ok_or_else(|| InvalidNaturalKey::new(s, "missing daily id"))?;

        let sequence = sequence
            .parse::<i32>()
            .map_err(|_| InvalidNaturalKey::new(s, "sequence is not a number"))?;
        if sequence < 0 {
            return Err(InvalidNaturalKey::new(s, "sequence must not be negative"));
        }
        let date =
            parse_feed_time(date).map_err(|_| InvalidNaturalKey::new(s, "date is not yyMMddHHmm"))?;
        let daily_id = daily_id
            .parse::<i64>()
            .map_err(|_| InvalidNaturalKey::new(s, "daily id is not a number"))?;

        Ok(Self {
            raw: s.to_string(),
            daily_id,
            date,
            sequence,
        })
    }

    /// The key exactly as published.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn daily_id(&self) -> i64 {
        self.daily_id
    }

    /// Operating date/time encoded in the key.
    pub fn date(&self) -> NaiveDateTime {
        self.date
    }

    /// Position of the stop within the trip.
    pub fn sequence(&self) -> i32 {
        self.sequence
    }

    /// Derive the storage identifier for this key.
    pub fn stop_id(&self) -> StopId {
        StopId::derive(&self.raw)
    }
}

impl fmt::Debug for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NaturalKey({})", self.raw)
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Storage identifier of a stop (`hash_id`).
///
/// XXH64 of the natural key, shifted down by `2^63 - 1` so that it fits the
/// signed 64-bit primary key column. The derivation is a pure function of the
/// key string, so reprocessing always yields the same row.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StopId(i64);

impl StopId {
    const SHIFT: u64 = i64::MAX as u64;

    /// Hash a natural key string into its identifier.
    pub fn derive(natural_key: &str) -> Self {
        let hash = XxHash64::oneshot(0, natural_key.as_bytes());
        StopId(hash.wrapping_sub(Self::SHIFT) as i64)
    }

    /// Wrap an identifier read back from storage.
    pub fn from_raw(raw: i64) -> Self {
        StopId(raw)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StopId({})", self.0)
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
