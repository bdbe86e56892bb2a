use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{Days, Local, NaiveDate};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    Error, HomeworkRecord, LessonRecord, Result, UntisConfig,
    helpers::{
        dates,
        homework::{self, HomeworkQuery},
        session::SessionCache,
        timetable::{self, TimetableOptions},
    },
};

/// Default span of `/timetable` when no end date is given.
const DEFAULT_TIMETABLE_DAYS: u64 = 6;

/// The digest service that owns the WebUntis session and serves normalized
/// homework and timetable data
pub struct DigestService {
    pub config: UntisConfig,
    sessions: Mutex<SessionCache>,
}

impl DigestService {
    /// Create a new digest service instance
    pub fn new(config: UntisConfig, sessions: SessionCache) -> Self {
        info!("Creating new DigestService instance");
        Self {
            config,
            sessions: Mutex::new(sessions),
        }
    }

    /// Create a service with the transport named in the configuration
    pub fn from_config(config: UntisConfig) -> Result<Self> {
        let sessions = SessionCache::for_transport(config.transport)?;
        Ok(Self::new(config, sessions))
    }

    /// Create an Axum router for the digest service
    pub fn router(self) -> Router {
        info!("Creating digest service router");
        let shared_state = Arc::new(self);

        Router::new()
            .route("/homework", get(homework_report))
            .route("/homework/json", get(homework_json))
            .route("/timetable", get(timetable_json))
            .route("/session/reset", post(session_reset))
            .with_state(shared_state)
    }

    pub async fn homework(&self, query: HomeworkQuery) -> Result<Option<Vec<HomeworkRecord>>> {
        info!(
            "Listing homework for {} days (only incomplete: {}, exclude today: {})",
            query.days, query.only_incomplete, query.exclude_today
        );
        let mut sessions = self.sessions.lock().await;

        let result = {
            let manager = sessions.get_or_create(&self.config).await?;
            homework::list_homework(manager, query).await
        };
        if is_session_rejected(&result) {
            sessions.clear().await;
        }
        result
    }

    pub async fn homework_report(&self, query: HomeworkQuery) -> Result<String> {
        let list = self.homework(query).await?;
        Ok(homework::format_homework_report(
            list.as_deref(),
            query.days,
            query.only_incomplete,
        ))
    }

    pub async fn timetable(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        resource_id: Option<i64>,
        options: TimetableOptions,
    ) -> Result<Option<Vec<LessonRecord>>> {
        info!("Listing timetable from {} to {}", start, end);
        let mut sessions = self.sessions.lock().await;

        let result = {
            let manager = sessions.get_or_create(&self.config).await?;
            timetable::list_timetable(manager, start, end, resource_id, options).await
        };
        if is_session_rejected(&result) {
            sessions.clear().await;
        }
        result
    }

    /// Drop the cached session so the next request logs in again
    pub async fn reset_session(&self) {
        info!("Resetting WebUntis session");
        self.sessions.lock().await.clear().await;
    }
}

/// An expired or revoked session shows up as 401/403 on data requests.
fn is_session_rejected<T>(result: &Result<T>) -> bool {
    match result {
        Err(Error::Http { status, .. }) if *status == 401 || *status == 403 => {
            warn!("WebUntis rejected the session (HTTP {}), dropping it", status);
            true
        }
        _ => false,
    }
}

fn status_for(e: &Error) -> StatusCode {
    match e {
        Error::Configuration(_) | Error::UnsupportedEnvironment(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Error::Authentication(_) | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
        Error::Http { .. } | Error::Transport(_) | Error::Rpc { .. } | Error::Decode(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

fn failure(context: &str, e: Error) -> (StatusCode, String) {
    error!("{}: {}", context, e);
    (status_for(&e), format!("{context}: {e}"))
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct TimetableParams {
    start: Option<String>,
    end: Option<String>,
    resource_id: Option<i64>,
    skip_cancelled: bool,
    include_notes: bool,
}

impl TimetableParams {
    fn range(&self, today: NaiveDate) -> std::result::Result<(NaiveDate, NaiveDate), String> {
        let start = match self.start.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => today,
        };
        let end = match self.end.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => start
                .checked_add_days(Days::new(DEFAULT_TIMETABLE_DAYS))
                .unwrap_or(start),
        };
        Ok((start, end))
    }
}

fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    dates::iso_date_to_calendar_date(raw)
        .ok_or_else(|| format!("invalid date '{raw}', expected YYYY-MM-DD"))
}

// Route handlers
async fn homework_report(
    State(service): State<Arc<DigestService>>,
    Query(query): Query<HomeworkQuery>,
) -> std::result::Result<String, (StatusCode, String)> {
    info!("Received homework report request");

    service
        .homework_report(query)
        .await
        .map_err(|e| failure("Error fetching homework", e))
}

async fn homework_json(
    State(service): State<Arc<DigestService>>,
    Query(query): Query<HomeworkQuery>,
) -> std::result::Result<Json<Option<Vec<HomeworkRecord>>>, (StatusCode, String)> {
    info!("Received homework JSON request");

    service
        .homework(query)
        .await
        .map(Json)
        .map_err(|e| failure("Error fetching homework", e))
}

async fn timetable_json(
    State(service): State<Arc<DigestService>>,
    Query(params): Query<TimetableParams>,
) -> std::result::Result<Json<Option<Vec<LessonRecord>>>, (StatusCode, String)> {
    info!("Received timetable request");

    let (start, end) = params
        .range(Local::now().date_naive())
        .map_err(|message| (StatusCode::BAD_REQUEST, message))?;
    let options = TimetableOptions {
        skip_cancelled: params.skip_cancelled,
        include_notes: params.include_notes,
    };

    service
        .timetable(start, end, params.resource_id, options)
        .await
        .map(Json)
        .map_err(|e| failure("Error fetching timetable", e))
}

async fn session_reset(State(service): State<Arc<DigestService>>) -> &'static str {
    service.reset_session().await;
    "session cleared"
}
