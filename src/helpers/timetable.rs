use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::{
    Error, Result,
    helpers::{dates, session::SessionManager},
    models::timetable::{LessonRecord, RawDay, RawGridEntry, RawPosition, TimetablePayload},
};

pub const UNKNOWN_TEACHER: &str = "Unknown Teacher";
pub const UNKNOWN_SUBJECT: &str = "Unknown Subject";
pub const UNKNOWN_ROOM: &str = "Unknown Room";

const STUDENT_RESOURCE: &str = "STUDENT";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TimetableOptions {
    pub skip_cancelled: bool,
    /// Copy notes, lesson info and free texts into the records.
    pub include_notes: bool,
}

/// Result of flattening with the bookkeeping kept
#[derive(Debug, Default)]
pub struct FlattenOutcome {
    pub lessons: Vec<LessonRecord>,
    pub skipped_cancelled: usize,
    pub failed_entries: usize,
}

/// Fetches the raw timetable grid of a student for a date range.
///
/// `resource_id` falls back to the configured one. `Ok(None)` means the
/// range holds no days.
pub async fn fetch_timetable_raw(
    manager: &SessionManager,
    start: NaiveDate,
    end: NaiveDate,
    resource_id: Option<i64>,
) -> Result<Option<TimetablePayload>> {
    let resource_id = resource_id
        .or(manager.config().resource_id)
        .ok_or_else(|| {
            Error::Configuration(
                "timetable requests need a resource id, pass one or set UNTIS_RESOURCE_ID"
                    .to_string(),
            )
        })?;
    if !manager.is_authenticated() {
        return Err(Error::Unauthenticated);
    }

    let start = dates::to_iso_date(start);
    let end = dates::to_iso_date(end);
    let resource = resource_id.to_string();
    let url = manager.api_url(
        "/api/rest/view/v1/timetable/entries",
        &[
            ("start", start.as_str()),
            ("end", end.as_str()),
            ("format", "4"),
            ("resourceType", STUDENT_RESOURCE),
            ("resources", resource.as_str()),
            ("periodTypes", ""),
            ("timetableType", "MY_TIMETABLE"),
        ],
    )?;
    info!(
        "Fetching timetable for resource {} from {} to {}",
        resource_id, start, end
    );

    let response = manager.get(&url).await?;
    let payload: TimetablePayload = response.json()?;

    if payload.days.is_empty() {
        info!("Timetable response contained no days");
        return Ok(None);
    }
    info!("Received timetable with {} days", payload.days.len());
    Ok(Some(payload))
}

/// Fetches and flattens in one go.
pub async fn list_timetable(
    manager: &SessionManager,
    start: NaiveDate,
    end: NaiveDate,
    resource_id: Option<i64>,
    options: TimetableOptions,
) -> Result<Option<Vec<LessonRecord>>> {
    Ok(fetch_timetable_raw(manager, start, end, resource_id)
        .await?
        .and_then(|payload| flatten_timetable(&payload, options)))
}

/// Turns the per-day grid into a flat lesson list; `None` when nothing is left.
pub fn flatten_timetable(
    payload: &TimetablePayload,
    options: TimetableOptions,
) -> Option<Vec<LessonRecord>> {
    let outcome = flatten_timetable_detailed(payload, options);
    if outcome.lessons.is_empty() {
        None
    } else {
        Some(outcome.lessons)
    }
}

/// Flattens every day independently. A day or entry that cannot be decoded is
/// counted in `failed_entries` and the rest carries on.
pub fn flatten_timetable_detailed(
    payload: &TimetablePayload,
    options: TimetableOptions,
) -> FlattenOutcome {
    let mut outcome = FlattenOutcome::default();

    for (index, raw_day) in payload.days.iter().enumerate() {
        let day = match RawDay::deserialize(raw_day) {
            Ok(day) => day,
            Err(e) => {
                warn!("Skipping malformed timetable day #{}: {}", index, e);
                outcome.failed_entries += 1;
                continue;
            }
        };
        debug!("Day {} has {} grid entries", day.date, day.grid_entries.len());

        for raw_entry in &day.grid_entries {
            match lesson_from_entry(&day.date, raw_entry, options) {
                Ok(Some(lesson)) => outcome.lessons.push(lesson),
                Ok(None) => outcome.skipped_cancelled += 1,
                Err(e) => {
                    warn!("Skipping malformed grid entry on {}: {}", day.date, e);
                    outcome.failed_entries += 1;
                }
            }
        }
    }

    info!(
        "Flattened timetable into {} lessons ({} cancelled skipped, {} failed)",
        outcome.lessons.len(),
        outcome.skipped_cancelled,
        outcome.failed_entries
    );
    outcome
}

/// `Ok(None)` for a cancelled entry that the options say to skip.
fn lesson_from_entry(
    date: &str,
    raw_entry: &Value,
    options: TimetableOptions,
) -> std::result::Result<Option<LessonRecord>, serde_json::Error> {
    let entry = RawGridEntry::deserialize(raw_entry)?;

    let status = entry.status.clone().unwrap_or_default();
    let lesson_type = entry.entry_type.clone().unwrap_or_default();
    let is_cancelled = status.eq_ignore_ascii_case("CANCELLED");
    if is_cancelled && options.skip_cancelled {
        return Ok(None);
    }

    let icons: BTreeSet<String> = entry.icons.iter().cloned().collect();
    let has_icon = |tag: &str| icons.iter().any(|icon| icon.eq_ignore_ascii_case(tag));

    let (teacher, teacher_long) = slot_names(&entry.position1, UNKNOWN_TEACHER);
    let (subject, subject_long) = slot_names(&entry.position2, UNKNOWN_SUBJECT);
    let (room, room_long) = slot_names(&entry.position3, UNKNOWN_ROOM);

    let (notes, lesson_info, texts) = if options.include_notes {
        (
            entry.notes_all.clone().unwrap_or_default(),
            entry
                .lesson_info
                .clone()
                .or_else(|| entry.lesson_text.clone())
                .unwrap_or_default(),
            entry.texts.clone(),
        )
    } else {
        (String::new(), String::new(), Vec::new())
    };

    Ok(Some(LessonRecord {
        id: entry.ids.first().copied(),
        date: date.to_string(),
        start_time: clock_time(entry.duration.as_ref().and_then(|d| d.start.as_deref())),
        end_time: clock_time(entry.duration.as_ref().and_then(|d| d.end.as_deref())),
        has_homework: has_icon("HOMEWORK"),
        is_exam: lesson_type.eq_ignore_ascii_case("EXAM") || has_icon("EXAM"),
        is_cancelled,
        is_additional: status.eq_ignore_ascii_case("ADDITIONAL"),
        is_changed: status.eq_ignore_ascii_case("CHANGED")
            || status.eq_ignore_ascii_case("SUBSTITUTION")
            || lost_a_position(&entry),
        substitution_text: entry.substitution_text.clone().unwrap_or_default(),
        lesson_type,
        status,
        teacher,
        teacher_long,
        subject,
        subject_long,
        room,
        room_long,
        icons,
        notes,
        lesson_info,
        texts,
        raw_entry: raw_entry.clone(),
    }))
}

/// A teacher, subject or room of the regular plan was taken away.
fn lost_a_position(entry: &RawGridEntry) -> bool {
    [&entry.position1, &entry.position2, &entry.position3]
        .into_iter()
        .flatten()
        .any(|position| position.removed.is_some())
}

/// Short and long name of the first element of a position slot.
///
/// The short name degrades to `fallback`, the long name to an empty string.
fn slot_names(slot: &[RawPosition], fallback: &str) -> (String, String) {
    let current = slot.first().and_then(|position| position.current.as_ref());

    let short = current
        .and_then(|value| value.short_name.as_deref().or(value.display_name.as_deref()))
        .filter(|name| !name.is_empty())
        .unwrap_or(fallback);
    let long = current
        .and_then(|value| value.long_name.as_deref())
        .unwrap_or_default();

    (short.to_string(), long.to_string())
}

/// `HH:MM` from an ISO local date-time like `2025-01-06T07:50`.
fn clock_time(date_time: Option<&str>) -> String {
    date_time
        .and_then(|value| value.split_once('T'))
        .map(|(_, time)| time.chars().take(5).collect())
        .unwrap_or_default()
}
