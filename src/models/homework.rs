use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient::null_as_default;

/// Body of `GET /api/homeworks/lessons`
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct HomeworkPayload {
    #[serde(deserialize_with = "null_as_default")]
    pub homeworks: Vec<RawHomework>,
    #[serde(deserialize_with = "null_as_default")]
    pub lessons: Vec<RawLesson>,
    #[serde(deserialize_with = "null_as_default")]
    pub teachers: Vec<RawTeacher>,
    #[serde(deserialize_with = "null_as_default")]
    pub records: Vec<RawHomeworkRecord>,
}

impl HomeworkPayload {
    /// Decodes a response body, unwrapping the `data` envelope when present.
    pub fn from_body(body: Value) -> serde_json::Result<Self> {
        let body = match body {
            Value::Object(mut fields) => fields
                .remove("data")
                .unwrap_or(Value::Object(fields)),
            other => other,
        };
        if body.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(body)
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct RawHomework {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub lesson_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub date: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub due_date: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub text: String,
    pub remark: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub completed: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub attachments: Vec<Value>,
    pub subject: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLesson {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub subject: String,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct RawTeacher {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct RawHomeworkRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub homework_id: i64,
    pub teacher_id: Option<i64>,
}

/// A homework assignment with its subject resolved
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkRecord {
    pub id: i64,
    pub lesson_id: i64,
    /// Compact `YYYYMMDD`.
    pub due_date: u32,
    /// Date the homework was given, compact `YYYYMMDD`.
    pub date: u32,
    pub text: String,
    pub completed: bool,
    pub remark: Option<String>,
    pub attachments: Vec<Value>,
    pub subject_name: String,
    pub teacher_name: Option<String>,
}
