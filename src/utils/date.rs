//! Utilities for dealing with dates.

use std::fmt;
use chrono::{DateTime, Local, TimeZone, Utc};
use chrono::format::{Item, Numeric, Pad};


/// The date and time part shared by all our ISO 8601 formats.
const ISO_DATE_TIME: &[Item<'static>] = &[
    Item::Numeric(Numeric::Year, Pad::Zero),
    Item::Literal("-"),
    Item::Numeric(Numeric::Month, Pad::Zero),
    Item::Literal("-"),
    Item::Numeric(Numeric::Day, Pad::Zero),
    Item::Literal("T"),
    Item::Numeric(Numeric::Hour, Pad::Zero),
    Item::Literal(":"),
    Item::Numeric(Numeric::Minute, Pad::Zero),
    Item::Literal(":"),
    Item::Numeric(Numeric::Second, Pad::Zero),
];

/// Formats a UTC date as an ISO 8601 string with a trailing `Z`.
pub fn format_iso_date(date: DateTime<Utc>) -> impl fmt::Display {
    date.format_with_items(
        ISO_DATE_TIME.iter().chain(Some(&Item::Literal("Z")))
    )
}

/// Formats a local date as an ISO 8601 string without time zone.
pub fn format_local_iso_date(date: DateTime<Local>) -> impl fmt::Display {
    date.format_with_items(ISO_DATE_TIME.iter())
}

/// Converts seconds since the epoch into a UTC date.
///
/// Returns `None` if the value is outside the range chrono can represent.
pub fn epoch_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn iso_date() {
        assert_eq!(
            format_iso_date(epoch_to_utc(1577836800).unwrap()).to_string(),
            "2020-01-01T00:00:00Z"
        );
        assert_eq!(
            format_iso_date(epoch_to_utc(-1).unwrap()).to_string(),
            "1969-12-31T23:59:59Z"
        );
        assert!(epoch_to_utc(i64::MAX).is_none());
    }
}
