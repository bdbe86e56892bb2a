use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::{
    Error, Result,
    helpers::{dates, session::SessionManager},
    models::homework::{HomeworkPayload, HomeworkRecord},
};

pub const UNKNOWN_SUBJECT: &str = "Unknown Subject";

const RULE: &str = "──────────────────────────────";

/// Which homework to list, relative to today
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct HomeworkQuery {
    pub days: u32,
    pub only_incomplete: bool,
    /// Start the window tomorrow instead of today.
    pub exclude_today: bool,
}

impl Default for HomeworkQuery {
    fn default() -> Self {
        Self {
            days: 7,
            only_incomplete: true,
            exclude_today: false,
        }
    }
}

impl HomeworkQuery {
    /// Inclusive date range covered by this query.
    pub fn window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = if self.exclude_today {
            today.checked_add_days(Days::new(1)).unwrap_or(today)
        } else {
            today
        };
        let end = start
            .checked_add_days(Days::new(u64::from(self.days)))
            .unwrap_or(start);
        (start, end)
    }
}

/// Fetches homework, lessons and teachers for a date range.
pub async fn fetch_homework_raw(
    manager: &SessionManager,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<HomeworkPayload> {
    if !manager.is_authenticated() {
        return Err(Error::Unauthenticated);
    }

    let start = dates::to_compact_date(start);
    let end = dates::to_compact_date(end);
    let url = manager.api_url(
        "/api/homeworks/lessons",
        &[("startDate", start.as_str()), ("endDate", end.as_str())],
    )?;
    info!("Fetching homework from {} to {}", start, end);

    let response = manager.get(&url).await?;
    let payload = HomeworkPayload::from_body(response.json()?)?;

    info!(
        "Received {} homework entries, {} lessons, {} teachers",
        payload.homeworks.len(),
        payload.lessons.len(),
        payload.teachers.len()
    );
    Ok(payload)
}

/// Lists homework for the query window starting today.
///
/// `Ok(None)` means nothing matched; an empty list is never returned.
pub async fn list_homework(
    manager: &SessionManager,
    query: HomeworkQuery,
) -> Result<Option<Vec<HomeworkRecord>>> {
    list_homework_from(manager, query, Local::now().date_naive()).await
}

/// Same as [`list_homework`] with an explicit "today".
pub async fn list_homework_from(
    manager: &SessionManager,
    query: HomeworkQuery,
    today: NaiveDate,
) -> Result<Option<Vec<HomeworkRecord>>> {
    let (start, end) = query.window(today);
    let payload = fetch_homework_raw(manager, start, end).await?;
    Ok(normalize_homework(payload, query.only_incomplete))
}

/// Joins subjects and teachers onto the raw homework, filters and sorts by
/// due date. Records with equal due dates keep their upstream order.
pub fn normalize_homework(
    payload: HomeworkPayload,
    only_incomplete: bool,
) -> Option<Vec<HomeworkRecord>> {
    let subjects: HashMap<i64, &str> = payload
        .lessons
        .iter()
        .filter(|lesson| !lesson.subject.is_empty())
        .map(|lesson| (lesson.id, lesson.subject.as_str()))
        .collect();
    let teachers: HashMap<i64, &str> = payload
        .teachers
        .iter()
        .map(|teacher| (teacher.id, teacher.name.as_str()))
        .collect();
    let teacher_of: HashMap<i64, i64> = payload
        .records
        .iter()
        .filter_map(|record| record.teacher_id.map(|id| (record.homework_id, id)))
        .collect();

    let total = payload.homeworks.len();
    let mut records: Vec<HomeworkRecord> = payload
        .homeworks
        .iter()
        .filter(|homework| !only_incomplete || !homework.completed)
        .map(|homework| {
            let subject_name = subjects
                .get(&homework.lesson_id)
                .copied()
                .or(homework.subject.as_deref().filter(|s| !s.is_empty()))
                .unwrap_or(UNKNOWN_SUBJECT)
                .to_string();
            let teacher_name = teacher_of
                .get(&homework.id)
                .and_then(|teacher_id| teachers.get(teacher_id))
                .map(|name| name.to_string());

            HomeworkRecord {
                id: homework.id,
                lesson_id: homework.lesson_id,
                due_date: homework.due_date,
                date: homework.date,
                text: homework.text.clone(),
                completed: homework.completed,
                remark: homework.remark.clone(),
                attachments: homework.attachments.clone(),
                subject_name,
                teacher_name,
            }
        })
        .collect();

    // sort_by_key is stable
    records.sort_by_key(|record| record.due_date);

    if records.is_empty() {
        info!("No matching homework among {} entries", total);
        return None;
    }
    if records.iter().any(|record| record.due_date == 0) {
        warn!("Some homework entries carry no due date");
    }
    info!("{} of {} homework entries selected", records.len(), total);
    Some(records)
}

/// Renders the homework list as a plain-text report.
///
/// An empty or missing list renders as a single "No ... homework found" line.
pub fn format_homework_report(
    homework: Option<&[HomeworkRecord]>,
    days: u32,
    only_incomplete: bool,
) -> String {
    let open = if only_incomplete { "open " } else { "" };

    let homework = match homework {
        Some(list) if !list.is_empty() => list,
        _ => return format!("No {open}homework found for the next {days} days."),
    };

    let mut report = format!(
        "Homework for the next {} days: {} {}assignment{}\n",
        days,
        homework.len(),
        open,
        if homework.len() == 1 { "" } else { "s" }
    );

    for record in homework {
        let glyph = if record.completed { "✅" } else { "📝" };
        report.push_str(&format!(
            "{RULE}\n{} {}\nDue: {}\n{}\n",
            glyph,
            record.subject_name,
            dates::to_display_date(Some(record.due_date)),
            record.text.trim()
        ));
        if let Some(remark) = record.remark.as_deref().filter(|r| !r.trim().is_empty()) {
            report.push_str(&format!("Note: {}\n", remark.trim()));
        }
    }
    report.push_str(RULE);

    report
}
