mod common;

use common::{config, mock_with_login};
use serde_json::json;
use untis_digest::{DigestService, Error, HomeworkQuery, SessionCache};

fn homework_body() -> String {
    json!({
        "data": {
            "lessons": [{ "id": 1, "subject": "M" }],
            "homeworks": [{ "id": 9, "lessonId": 1, "dueDate": 20990101, "completed": false, "text": "p.5" }]
        }
    })
    .to_string()
}

#[tokio::test]
async fn repeated_reports_share_one_login() {
    let mock = mock_with_login();
    mock.on_get("/api/homeworks/lessons", 200, homework_body());
    let service = DigestService::new(config(), SessionCache::new(mock.clone()));

    let first = service.homework_report(HomeworkQuery::default()).await.unwrap();
    let second = service.homework_report(HomeworkQuery::default()).await.unwrap();

    assert_eq!(first, second);
    assert!(first.starts_with("Homework for the next 7 days: 1 open assignment"));
    assert!(first.contains("📝 M"));
    assert!(first.contains("Due: 01.01.2099"));
    assert_eq!(mock.rpc_calls("authenticate"), 1);
}

#[tokio::test]
async fn rejected_session_is_dropped_and_renewed() {
    let mock = mock_with_login();
    mock.on_get("/api/homeworks/lessons", 401, "session expired");
    let service = DigestService::new(config(), SessionCache::new(mock.clone()));

    let err = service.homework(HomeworkQuery::default()).await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 401, .. }));

    mock.on_get("/api/homeworks/lessons", 200, homework_body());
    let list = service.homework(HomeworkQuery::default()).await.unwrap();

    assert_eq!(list.unwrap().len(), 1);
    assert_eq!(mock.rpc_calls("authenticate"), 2);
}

#[tokio::test]
async fn reset_forces_a_new_login() {
    let mock = mock_with_login();
    mock.on_get("/api/homeworks/lessons", 200, homework_body());
    let service = DigestService::new(config(), SessionCache::new(mock.clone()));

    service.homework(HomeworkQuery::default()).await.unwrap();
    service.reset_session().await;
    service.homework(HomeworkQuery::default()).await.unwrap();

    assert_eq!(mock.rpc_calls("authenticate"), 2);
    assert_eq!(mock.rpc_calls("logout"), 1);
}

#[tokio::test]
async fn timetable_without_resource_is_a_configuration_error() {
    let mock = mock_with_login();
    let service = DigestService::new(config(), SessionCache::new(mock));
    let day = chrono::NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();

    let result = service
        .timetable(day, day, None, Default::default())
        .await;
    assert!(matches!(result, Err(Error::Configuration(_))));
}
