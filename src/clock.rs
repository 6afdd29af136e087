//! Wall-clock access and the `processed_at` timestamp format.
//!
//! Catalog timestamps are naive (`YYYY-MM-DD HH:MM:SS`) and interpreted in a
//! single configured UTC offset. Directory modification times are converted
//! into the same offset before they are compared.

use std::time::SystemTime;

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{Error, Result};

const PROCESSED_AT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// A source of "now" for retention cutoffs and archive timestamps.
pub trait Clock {
    /// Current wall-clock time in the catalog's offset.
    fn now(&self) -> PrimitiveDateTime;

    fn offset(&self) -> UtcOffset;
}

/// A clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> PrimitiveDateTime {
        to_local(SystemTime::now(), self.offset)
    }

    fn offset(&self) -> UtcOffset {
        self.offset
    }
}

/// A clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: PrimitiveDateTime,
    offset: UtcOffset,
}

impl FixedClock {
    pub fn new(now: PrimitiveDateTime, offset: UtcOffset) -> Self {
        Self { now, offset }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> PrimitiveDateTime {
        self.now
    }

    fn offset(&self) -> UtcOffset {
        self.offset
    }
}

pub fn to_local(ts: SystemTime, offset: UtcOffset) -> PrimitiveDateTime {
    let dt = OffsetDateTime::from(ts).to_offset(offset);
    PrimitiveDateTime::new(dt.date(), dt.time())
}

pub fn to_system_time(ts: PrimitiveDateTime, offset: UtcOffset) -> SystemTime {
    ts.assume_offset(offset).into()
}

pub fn parse_processed_at(value: &str) -> Result<PrimitiveDateTime> {
    PrimitiveDateTime::parse(value, PROCESSED_AT).map_err(|err| Error::Timestamp {
        value: value.to_string(),
        reason: err.to_string(),
    })
}

pub fn format_processed_at(ts: PrimitiveDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        ts.year(),
        ts.month() as u8,
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second()
    )
}

/// Month bucket (`YYYY-MM`) a record is archived under.
pub fn year_month(ts: PrimitiveDateTime) -> String {
    format!("{:04}-{:02}", ts.year(), ts.month() as u8)
}

pub fn rfc3339(ts: PrimitiveDateTime, offset: UtcOffset) -> String {
    ts.assume_offset(offset)
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| format_processed_at(ts))
}

/// serde adapter storing timestamps in the catalog's `processed_at` format.
pub(crate) mod processed_at_format {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::PrimitiveDateTime;

    pub fn serialize<S: Serializer>(ts: &PrimitiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_processed_at(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PrimitiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_processed_at(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    #[test]
    fn test_processed_at_round_trips_through_text() {
        let ts = parse_processed_at("2025-06-03 14:05:09").expect("parse");
        assert_eq!(ts, datetime!(2025-06-03 14:05:09));
        assert_eq!(format_processed_at(ts), "2025-06-03 14:05:09");
    }

    #[test]
    fn test_rejects_malformed_processed_at() {
        let err = parse_processed_at("2025/06/03").unwrap_err();
        assert!(matches!(err, Error::Timestamp { .. }));
    }

    #[test]
    fn test_year_month_bucket() {
        assert_eq!(year_month(datetime!(2024-11-30 23:59:59)), "2024-11");
    }

    #[test]
    fn test_system_time_conversion_honours_offset() {
        let local = datetime!(2025-01-01 08:30:00);
        let st = to_system_time(local, offset!(+9));
        assert_eq!(to_local(st, offset!(+9)), local);
        assert_eq!(to_local(st, UtcOffset::UTC), datetime!(2024-12-31 23:30:00));
    }
}
