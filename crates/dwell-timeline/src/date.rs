//! Date normalization
//!
//! Records arrive with dates in whatever shape the upstream store produced:
//! typed instants, several string layouts, epoch milliseconds, or nothing at
//! all. [`normalize`] folds all of them into `Option<DateTime<Utc>>` and never
//! fails. `None` means "unknown" and must never be read as epoch zero or now.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Offset-carrying layouts tried after RFC 3339.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

/// Layouts without an offset, read as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Calendar-date layout used on the presentation boundary.
pub const CALENDAR_DATE_FORMAT: &str = "%Y-%m-%d";

/// An unvalidated date-like value as supplied by the record source
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RawDate {
    /// Already-typed instant
    Instant(DateTime<Utc>),
    /// Free-form text (ISO-like, store-specific, or garbage)
    Text(String),
    /// Milliseconds since the Unix epoch
    EpochMillis(i64),
    /// Null, undefined, or absent
    #[default]
    Missing,
}

impl RawDate {
    /// Text value
    #[inline]
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Whether the value is absent outright
    #[inline]
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl From<DateTime<Utc>> for RawDate {
    fn from(at: DateTime<Utc>) -> Self {
        Self::Instant(at)
    }
}

impl From<Option<DateTime<Utc>>> for RawDate {
    fn from(at: Option<DateTime<Utc>>) -> Self {
        at.map_or(Self::Missing, Self::Instant)
    }
}

impl From<&str> for RawDate {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl Serialize for RawDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Instant(at) => serializer.serialize_str(&at.to_rfc3339()),
            Self::Text(text) => serializer.serialize_str(text),
            Self::EpochMillis(ms) => serializer.serialize_i64(*ms),
            Self::Missing => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for RawDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawDateVisitor)
    }
}

struct RawDateVisitor;

impl<'de> Visitor<'de> for RawDateVisitor {
    type Value = RawDate;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a date string, epoch milliseconds, or null")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<RawDate, E> {
        Ok(RawDate::Text(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<RawDate, E> {
        Ok(RawDate::Text(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<RawDate, E> {
        Ok(RawDate::EpochMillis(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<RawDate, E> {
        Ok(i64::try_from(value).map_or(RawDate::Missing, RawDate::EpochMillis))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn visit_f64<E: de::Error>(self, value: f64) -> Result<RawDate, E> {
        if value.is_finite() && value.abs() < 9.0e15 {
            Ok(RawDate::EpochMillis(value.trunc() as i64))
        } else {
            Ok(RawDate::Missing)
        }
    }

    fn visit_bool<E: de::Error>(self, _value: bool) -> Result<RawDate, E> {
        Ok(RawDate::Missing)
    }

    fn visit_none<E: de::Error>(self) -> Result<RawDate, E> {
        Ok(RawDate::Missing)
    }

    fn visit_unit<E: de::Error>(self) -> Result<RawDate, E> {
        Ok(RawDate::Missing)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<RawDate, D::Error> {
        deserializer.deserialize_any(RawDateVisitor)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<RawDate, A::Error> {
        while seq.next_element::<de::IgnoredAny>()?.is_some() {}
        Ok(RawDate::Missing)
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<RawDate, A::Error> {
        while map
            .next_entry::<de::IgnoredAny, de::IgnoredAny>()?
            .is_some()
        {}
        Ok(RawDate::Missing)
    }
}

/// Normalize a raw date into a UTC instant
///
/// Returns `None` for anything that is absent, empty, or unparseable.
#[must_use]
pub fn normalize(value: &RawDate) -> Option<DateTime<Utc>> {
    match value {
        RawDate::Instant(at) => Some(*at),
        RawDate::EpochMillis(ms) => DateTime::from_timestamp_millis(*ms),
        RawDate::Text(text) => parse_text(text),
        RawDate::Missing => None,
    }
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(at.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(at) = DateTime::parse_from_str(trimmed, format) {
            return Some(at.with_timezone(&Utc));
        }
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, CALENDAR_DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Whole days elapsed from `start` to `end`, floored
///
/// Returns `None` when `end` precedes `start`: a negative span is corrupt
/// input, not a zero-length period.
#[inline]
#[must_use]
pub fn whole_days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<i64> {
    let span = end.signed_duration_since(start);
    if span < chrono::TimeDelta::zero() {
        None
    } else {
        Some(span.num_days())
    }
}

/// Render an instant as `YYYY-MM-DD`
#[inline]
#[must_use]
pub fn format_calendar_date(at: &DateTime<Utc>) -> String {
    at.format(CALENDAR_DATE_FORMAT).to_string()
}

/// Serde adapter writing instants as calendar dates
pub mod calendar_date {
    use super::format_calendar_date;
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    /// Serialize as `YYYY-MM-DD`
    ///
    /// # Errors
    /// Propagates serializer failures.
    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_calendar_date(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn normalize_typed_instant_passes_through() {
        let at = utc(2024, 3, 1, 12, 0, 0);
        assert_eq!(normalize(&RawDate::Instant(at)), Some(at));
    }

    #[test]
    fn normalize_rfc3339() {
        let parsed = normalize(&RawDate::text("2024-03-01T12:00:00Z"));
        assert_eq!(parsed, Some(utc(2024, 3, 1, 12, 0, 0)));
    }

    #[test]
    fn normalize_store_offset_without_colon() {
        let parsed = normalize(&RawDate::text("2024-03-01T12:00:00.000+0000"));
        assert_eq!(parsed, Some(utc(2024, 3, 1, 12, 0, 0)));
    }

    #[test]
    fn normalize_non_utc_offset_is_converted() {
        let parsed = normalize(&RawDate::text("2024-03-01T12:00:00+02:00"));
        assert_eq!(parsed, Some(utc(2024, 3, 1, 10, 0, 0)));
    }

    #[test]
    fn normalize_naive_datetime_reads_as_utc() {
        let parsed = normalize(&RawDate::text("2024-03-01 08:30:00"));
        assert_eq!(parsed, Some(utc(2024, 3, 1, 8, 30, 0)));
    }

    #[test]
    fn normalize_calendar_date_is_midnight() {
        let parsed = normalize(&RawDate::text("2024-03-01"));
        assert_eq!(parsed, Some(utc(2024, 3, 1, 0, 0, 0)));
    }

    #[test]
    fn normalize_epoch_millis() {
        let at = utc(2024, 3, 1, 0, 0, 0);
        let parsed = normalize(&RawDate::EpochMillis(at.timestamp_millis()));
        assert_eq!(parsed, Some(at));
    }

    #[test]
    fn normalize_rejects_garbage_without_failing() {
        for raw in ["", "   ", "not a date", "2024-13-45", "yesterday", "01/02/2024"] {
            assert_eq!(normalize(&RawDate::text(raw)), None, "input {raw:?}");
        }
        assert_eq!(normalize(&RawDate::Missing), None);
    }

    #[test]
    fn whole_days_floors_partial_days() {
        let start = utc(2024, 1, 1, 0, 0, 0);
        assert_eq!(whole_days_between(start, utc(2024, 1, 3, 23, 59, 59)), Some(2));
        assert_eq!(whole_days_between(start, start), Some(0));
    }

    #[test]
    fn whole_days_rejects_negative_span() {
        let start = utc(2024, 1, 5, 0, 0, 0);
        assert_eq!(whole_days_between(start, utc(2024, 1, 4, 0, 0, 0)), None);
    }

    #[test]
    fn deserialize_accepts_mixed_shapes() {
        let values: Vec<RawDate> =
            serde_json::from_str(r#"["2024-01-01", null, 1704067200000, {"x": 1}, true]"#)
                .unwrap();
        assert_eq!(values[0], RawDate::text("2024-01-01"));
        assert_eq!(values[1], RawDate::Missing);
        assert_eq!(values[2], RawDate::EpochMillis(1_704_067_200_000));
        assert_eq!(values[3], RawDate::Missing);
        assert_eq!(values[4], RawDate::Missing);
    }

    #[test]
    fn calendar_date_format() {
        assert_eq!(format_calendar_date(&utc(2024, 7, 9, 23, 0, 0)), "2024-07-09");
    }
}
