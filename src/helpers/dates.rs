//! Conversions between calendar dates and the string encodings WebUntis uses.
//!
//! The homework endpoints speak compact `YYYYMMDD` (often as a bare number), the
//! timetable endpoints speak ISO `YYYY-MM-DD`, and reports show `DD.MM.YYYY`.
//! No timezone conversion happens anywhere in here.

use chrono::NaiveDate;
use std::fmt::Display;

pub const UNKNOWN_DATE: &str = "Unknown Date";

pub fn to_compact_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

pub fn to_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses a compact date, given either as a number (`20250101`) or a string.
pub fn compact_date_to_calendar_date<D: Display>(compact: D) -> Option<NaiveDate> {
    let compact = compact.to_string();
    let compact = compact.trim();
    if compact.len() != 8 || !compact.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(compact, "%Y%m%d").ok()
}

pub fn iso_date_to_calendar_date(iso: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(iso.trim(), "%Y-%m-%d").ok()
}

/// Renders a compact date as `DD.MM.YYYY`.
///
/// Absent, zero or unparseable input yields [`UNKNOWN_DATE`] instead of an error,
/// since this only ever feeds human-readable output.
pub fn to_display_date<D: Display>(compact: Option<D>) -> String {
    compact
        .and_then(compact_date_to_calendar_date)
        .map(|date| date.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}
