//! WebUntis Digest Library
//!
//! This library logs into a WebUntis school server, fetches homework and
//! timetable data, and normalizes it into stable records for reports,
//! calendars and notifications.

pub mod config;
pub mod error;
pub mod helpers;
pub mod models;
pub mod service;

pub use config::{TransportKind, UntisConfig};
pub use error::{Error, Result};
pub use service::DigestService;

// Re-export key types for convenience
pub use helpers::homework::{HomeworkQuery, format_homework_report, list_homework};
pub use helpers::session::{Session, SessionCache, SessionManager, SessionState};
pub use helpers::timetable::{TimetableOptions, flatten_timetable, list_timetable};
pub use helpers::transport::{Transport, TransportRequest, TransportResponse};
pub use models::homework::HomeworkRecord;
pub use models::timetable::LessonRecord;
