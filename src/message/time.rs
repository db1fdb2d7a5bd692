//! Calendar values stored in leaves.
//!
//! HL7 writes dates in three shapes, all strict fixed-width digits:
//!
//! - date: `YYYYMMDD`
//! - date and time: `YYYYMMDDHHMM`
//! - timestamp: `YYYYMMDDHHMMSS[.SSS]+HHMM` (the zone offset sign is mandatory)
//!
//! Every function here works on anything implementing [`Value`], so a field, component or
//! subcomponent can be read or written the same way.
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use thiserror::Error;

use super::Value;

const DATE_FORMAT: &str = "%Y%m%d";
const DATE_TIME_FORMAT: &str = "%Y%m%d%H%M";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%z";
const TIMESTAMP_MILLIS_FORMAT: &str = "%Y%m%d%H%M%S%.3f%z";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("'{0}' does not match any supported date layout")]
    Layout(String),
}

/// Most specific calendar value a leaf could be read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Instant(DateTime<FixedOffset>),
}

/// Read a timestamp, falling back to date-time and then date.
pub fn timestamp<V: Value + ?Sized>(value: &V) -> Result<Timestamp, TimeError> {
    instant(value)
        .map(Timestamp::Instant)
        .or_else(|_| date_time(value).map(Timestamp::DateTime))
        .or_else(|_| date(value).map(Timestamp::Date))
}

pub fn date<V: Value + ?Sized>(value: &V) -> Result<NaiveDate, TimeError> {
    let text = value.value();
    if !is_digits(text, 8) {
        return Err(TimeError::Layout(text.to_string()));
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|_| TimeError::Layout(text.to_string()))
}

pub fn date_time<V: Value + ?Sized>(value: &V) -> Result<NaiveDateTime, TimeError> {
    let text = value.value();
    if !is_digits(text, 12) {
        return Err(TimeError::Layout(text.to_string()));
    }
    NaiveDateTime::parse_from_str(text, DATE_TIME_FORMAT)
        .map_err(|_| TimeError::Layout(text.to_string()))
}

pub fn instant<V: Value + ?Sized>(value: &V) -> Result<DateTime<FixedOffset>, TimeError> {
    let text = value.value();
    let format = match timestamp_shape(text) {
        Some(true) => TIMESTAMP_MILLIS_FORMAT,
        Some(false) => TIMESTAMP_FORMAT,
        None => return Err(TimeError::Layout(text.to_string())),
    };
    DateTime::parse_from_str(text, format).map_err(|_| TimeError::Layout(text.to_string()))
}

pub fn set_date<V: Value + ?Sized>(value: &mut V, date: NaiveDate) {
    value.set_value(&date.format(DATE_FORMAT).to_string());
}

pub fn set_date_time<V: Value + ?Sized>(value: &mut V, date_time: NaiveDateTime) {
    value.set_value(&date_time.format(DATE_TIME_FORMAT).to_string());
}

/// Write a timestamp with millisecond precision and the instant's own offset.
pub fn set_instant<V, Tz>(value: &mut V, instant: DateTime<Tz>)
where
    V: Value + ?Sized,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    value.set_value(&instant.format(TIMESTAMP_MILLIS_FORMAT).to_string());
}

fn is_digits(text: &str, len: usize) -> bool {
    text.len() == len && text.bytes().all(|b| b.is_ascii_digit())
}

/// `Some(has_millis)` when `text` is shaped like a timestamp.
fn timestamp_shape(text: &str) -> Option<bool> {
    let (body, zone) = text.split_at_checked(text.len().checked_sub(5)?)?;
    let mut zone = zone.bytes();
    if !matches!(zone.next(), Some(b'+' | b'-')) || !zone.all(|b| b.is_ascii_digit()) {
        return None;
    }

    match body.len() {
        14 if is_digits(body, 14) => Some(false),
        18 => {
            let (seconds, millis) = body.split_at_checked(14)?;
            (is_digits(seconds, 14)
                && millis.starts_with('.')
                && is_digits(&millis[1..], 3))
            .then_some(true)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike, Utc};

    use super::*;
    use crate::message::SubComponent;

    #[test]
    fn reads_each_layout() {
        let leaf = SubComponent::new("20160722");
        assert_eq!(
            timestamp(&leaf).unwrap(),
            Timestamp::Date(NaiveDate::from_ymd_opt(2016, 7, 22).unwrap())
        );

        let leaf = SubComponent::new("201607221538");
        let Timestamp::DateTime(dt) = timestamp(&leaf).unwrap() else {
            panic!("expected a date-time");
        };
        assert_eq!((dt.hour(), dt.minute()), (15, 38));

        let leaf = SubComponent::new("20160722153849-0400");
        let Timestamp::Instant(at) = timestamp(&leaf).unwrap() else {
            panic!("expected an instant");
        };
        assert_eq!(at.offset().local_minus_utc(), -4 * 3600);
        assert_eq!(at.second(), 49);

        let leaf = SubComponent::new("20160722153849.854-0400");
        let Timestamp::Instant(at) = timestamp(&leaf).unwrap() else {
            panic!("expected an instant");
        };
        assert_eq!(at.timestamp_subsec_millis(), 854);
    }

    #[test]
    fn rejects_loose_layouts() {
        for text in [
            "",
            "2016072",
            "2016-07-22",
            "20161322",
            "20160722153849",
            "201607221538490400",
            "20160722153849.85-0400",
            "2016072215384é123+0400",
        ] {
            let leaf = SubComponent::new(text);
            assert_eq!(
                timestamp(&leaf),
                Err(TimeError::Layout(text.to_string())),
                "{text}"
            );
        }
    }

    #[test]
    fn writes_each_layout() {
        let mut leaf = SubComponent::default();
        let day = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();

        set_date(&mut leaf, day);
        assert_eq!(leaf.value(), "20230101");
        assert_eq!(date(&leaf).unwrap().year(), 2023);

        set_date_time(&mut leaf, day.and_hms_opt(9, 5, 0).unwrap());
        assert_eq!(leaf.value(), "202301010905");

        let at = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        set_instant(&mut leaf, at);
        assert_eq!(leaf.value(), "20230101000000.000+0000");
        assert_eq!(instant(&leaf).unwrap(), at);
    }
}
