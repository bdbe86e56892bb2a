use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use super::lenient::{lenient_items, lenient_list, null_as_default};

/// Body of `GET /api/rest/view/v1/timetable/entries`.
///
/// Days are kept as raw JSON so that one malformed day cannot fail the
/// decoding of the whole range.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct TimetablePayload {
    #[serde(default, deserialize_with = "lenient_list")]
    pub days: Vec<Value>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawDay {
    #[serde(deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(deserialize_with = "lenient_list")]
    pub grid_entries: Vec<Value>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawGridEntry {
    #[serde(deserialize_with = "null_as_default")]
    pub ids: Vec<i64>,
    pub duration: Option<RawDuration>,
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub status: Option<String>,
    /// Teacher slot.
    #[serde(deserialize_with = "lenient_items")]
    pub position1: Vec<RawPosition>,
    /// Subject slot.
    #[serde(deserialize_with = "lenient_items")]
    pub position2: Vec<RawPosition>,
    /// Room slot.
    #[serde(deserialize_with = "lenient_items")]
    pub position3: Vec<RawPosition>,
    #[serde(deserialize_with = "lenient_items")]
    pub icons: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub texts: Vec<Value>,
    pub lesson_text: Option<String>,
    pub lesson_info: Option<String>,
    pub substitution_text: Option<String>,
    pub notes_all: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct RawDuration {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct RawPosition {
    pub current: Option<RawPositionValue>,
    pub removed: Option<RawPositionValue>,
}

/// One element of a position slot. `removed` is set when the lesson lost
/// this teacher, subject or room compared to the regular plan.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPositionValue {
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub display_name: Option<String>,
}

/// One flattened timetable period
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecord {
    pub id: Option<i64>,
    /// ISO `YYYY-MM-DD` of the containing day.
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(rename = "type")]
    pub lesson_type: String,
    pub status: String,
    pub teacher: String,
    pub teacher_long: String,
    pub subject: String,
    pub subject_long: String,
    pub room: String,
    pub room_long: String,
    pub icons: BTreeSet<String>,
    pub has_homework: bool,
    pub is_exam: bool,
    pub is_cancelled: bool,
    pub is_additional: bool,
    pub is_changed: bool,
    pub substitution_text: String,
    pub notes: String,
    pub lesson_info: String,
    pub texts: Vec<Value>,
    pub raw_entry: Value,
}
