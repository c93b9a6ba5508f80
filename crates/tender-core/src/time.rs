//! # Timestamps and Clock
//!
//! All tender timestamps are ISO 8601 with an explicit offset. Values
//! without an offset are read as Kyiv local time.
//!
//! ## Kyiv Offset
//! ```text
//! last Sunday of March ──► +03:00 (summer) ──► last Sunday of October
//!                                                        │
//!        +02:00 (winter) ◄───────────────────────────────┘
//! ```
//! The switch is applied per calendar date, which is precise enough for
//! cutover constants and for naive input timestamps.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, SecondsFormat,
    TimeDelta, Utc, Weekday,
};

/// A point in time with its original offset.
pub type Timestamp = DateTime<FixedOffset>;

const HOUR: i32 = 3600;

/// Returns the Kyiv UTC offset for a calendar date.
pub fn kyiv_offset(date: NaiveDate) -> FixedOffset {
    let year = date.year();
    let summer_start = last_sunday(year, 3);
    let summer_end = last_sunday(year, 10);
    let hours = if date >= summer_start && date < summer_end { 3 } else { 2 };
    FixedOffset::east_opt(hours * HOUR).unwrap_or_else(utc_offset)
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

fn last_sunday(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let mut day = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MIN);
    while day.weekday() != Weekday::Sun {
        day = day.pred_opt().unwrap_or(NaiveDate::MIN);
    }
    day
}

/// Builds a Kyiv midnight timestamp for a calendar date.
pub fn kyiv_midnight(year: i32, month: u32, day: u32) -> Timestamp {
    let date = NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN);
    let offset = kyiv_offset(date);
    localize(offset, date.and_time(NaiveTime::MIN))
}

/// Attaches an offset to a naive local datetime.
pub fn localize(offset: FixedOffset, naive: NaiveDateTime) -> Timestamp {
    // A fixed offset never produces an ambiguous local time.
    DateTime::from_naive_utc_and_offset(naive - offset, offset)
}

/// Truncates a timestamp to midnight of its own local day.
pub fn at_midnight(ts: Timestamp) -> Timestamp {
    ts - ts.time().signed_duration_since(NaiveTime::MIN)
}

/// Formats a timestamp the way it is stored and rendered in messages.
pub fn format_iso(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Parses an ISO 8601 timestamp; naive values are read as Kyiv time.
pub fn parse_iso(raw: &str) -> Result<Timestamp, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(localize(kyiv_offset(naive.date()), naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(localize(kyiv_offset(date), date.and_time(NaiveTime::MIN)));
    }
    Err(format!("Could not parse {}. Should be ISO8601.", raw))
}

// =============================================================================
// Clock
// =============================================================================

/// Source of "now" for validators and guards.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock in Kyiv time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let now = Utc::now();
        now.with_timezone(&kyiv_offset(now.date_naive()))
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// One calendar day.
pub fn days(n: i64) -> TimeDelta {
    TimeDelta::days(n)
}

// =============================================================================
// Serde Helpers
// =============================================================================

/// `#[serde(with = "crate::time::iso")]` for `Timestamp` fields.
pub mod iso {
    use super::{format_iso, parse_iso, Timestamp};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_iso(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_iso(&raw).map_err(de::Error::custom)
    }
}

/// `#[serde(with = "crate::time::iso_opt")]` for `Option<Timestamp>` fields.
pub mod iso_opt {
    use super::{format_iso, parse_iso, Timestamp};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ts: &Option<Timestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_str(&format_iso(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse_iso(&raw).map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
