mod common;

use common::{MockTransport, config, mock_with_login};
use serde_json::{Value, json};
use untis_digest::{Error, SessionCache, SessionManager, SessionState};

#[tokio::test]
async fn authenticate_stores_the_session() {
    let mock = mock_with_login();
    let mut manager = SessionManager::new(config(), mock.clone());

    manager.authenticate().await.unwrap();

    assert_eq!(manager.state(), SessionState::Authenticated);
    let session = manager.session().unwrap();
    assert_eq!(session.session_id, "SID-1");
    assert_eq!(session.person_id, 42);
    assert_eq!(session.person_type, 5);
    assert!(!manager.has_bearer());
}

#[tokio::test]
async fn authenticate_sends_a_json_rpc_call() {
    let mock = mock_with_login();
    let mut manager = SessionManager::new(config(), mock.clone());
    manager.authenticate().await.unwrap();

    let requests = mock.requests();
    let login = &requests[0];
    assert_eq!(
        login.url,
        "https://mese.webuntis.com/WebUntis/jsonrpc.do?school=demo-school"
    );
    assert!(login.header_value("Cookie").is_none());

    let body: Value = serde_json::from_str(login.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["method"], "authenticate");
    assert_eq!(body["params"]["user"], "student");
    assert_eq!(body["params"]["password"], "secret");
    assert_eq!(body["params"]["client"], "untis-digest");
    assert!(body["id"].is_string());
}

#[tokio::test]
async fn bearer_token_is_attached_when_granted() {
    let mock = mock_with_login();
    mock.on_get("/api/token/new", 200, "eyJ.token.sig\n");
    mock.on_get("/api/homeworks/lessons", 200, r#"{"data":{}}"#);

    let mut manager = SessionManager::new(config(), mock.clone());
    manager.authenticate().await.unwrap();
    assert!(manager.has_bearer());

    manager
        .get("https://mese.webuntis.com/WebUntis/api/homeworks/lessons")
        .await
        .unwrap();

    let fetch = mock.gets("/api/homeworks/lessons").pop().unwrap();
    assert_eq!(
        fetch.header_value("Authorization"),
        Some("Bearer eyJ.token.sig")
    );
    assert_eq!(
        fetch.header_value("Cookie"),
        Some("JSESSIONID=SID-1; schoolname=\"_ZGVtby1zY2hvb2w=\"")
    );
}

#[tokio::test]
async fn bearer_failures_do_not_abort_login() {
    for status in [403, 500] {
        let mock = mock_with_login();
        mock.on_get("/api/token/new", status, "nope");

        let mut manager = SessionManager::new(config(), mock.clone());
        manager.authenticate().await.unwrap();

        assert_eq!(manager.state(), SessionState::Authenticated);
        assert!(!manager.has_bearer());
    }
}

#[tokio::test]
async fn missing_result_is_an_authentication_failure() {
    let mock = MockTransport::new();
    mock.on_rpc("authenticate", 200, json!({ "jsonrpc": "2.0", "id": "1" }));

    let mut manager = SessionManager::new(config(), mock.clone());
    let err = manager.authenticate().await.unwrap_err();

    assert!(matches!(err, Error::Authentication(_)));
    assert!(manager.session().is_none());
    assert_eq!(manager.state(), SessionState::Unauthenticated);
    // no bearer attempt without a session
    assert!(mock.gets("/api/token/new").is_empty());
}

#[tokio::test]
async fn rejected_credentials_carry_the_upstream_message() {
    let mock = MockTransport::new();
    mock.on_rpc(
        "authenticate",
        200,
        json!({ "jsonrpc": "2.0", "id": "1", "error": { "message": "bad credentials", "code": -8504 } }),
    );

    let mut manager = SessionManager::new(config(), mock);
    match manager.authenticate().await {
        Err(Error::Authentication(message)) => {
            assert!(message.contains("bad credentials"));
            assert!(message.contains("-8504"));
        }
        other => panic!("expected authentication failure, got {other:?}"),
    }
}

#[tokio::test]
async fn logout_clears_local_state_even_when_upstream_fails() {
    let mock = mock_with_login();
    mock.on_rpc("logout", 500, json!({}));

    let mut manager = SessionManager::new(config(), mock.clone());
    manager.authenticate().await.unwrap();
    manager.logout().await;

    assert!(manager.session().is_none());
    assert_eq!(manager.state(), SessionState::Unauthenticated);
    assert_eq!(mock.rpc_calls("logout"), 1);

    let logout = mock
        .requests()
        .into_iter()
        .find(|request| request.body.as_deref().is_some_and(|b| b.contains("logout")))
        .unwrap();
    assert!(logout.header_value("Cookie").unwrap().contains("SID-1"));

    // second logout is a silent no-op
    manager.logout().await;
    assert_eq!(mock.rpc_calls("logout"), 1);
}

#[tokio::test]
async fn rpc_errors_are_surfaced_with_code() {
    let mock = mock_with_login();
    mock.on_rpc(
        "getSubjects",
        200,
        json!({ "jsonrpc": "2.0", "id": "1", "error": { "message": "no right", "code": -8509 } }),
    );

    let mut manager = SessionManager::new(config(), mock);
    manager.authenticate().await.unwrap();

    match manager.rpc("getSubjects", json!({})).await {
        Err(Error::Rpc { code, message }) => {
            assert_eq!(code, -8509);
            assert_eq!(message, "no right");
        }
        other => panic!("expected rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn cache_reuses_a_live_session() {
    let mock = mock_with_login();
    let mut cache = SessionCache::new(mock.clone());

    let first = cache.get_or_create(&config()).await.unwrap().fingerprint().to_string();
    let second = cache.get_or_create(&config()).await.unwrap().fingerprint().to_string();

    assert_eq!(first, second);
    assert_eq!(mock.rpc_calls("authenticate"), 1);
}

#[tokio::test]
async fn cache_logs_in_again_when_the_server_changes() {
    let mock = mock_with_login();
    let mut cache = SessionCache::new(mock.clone());

    cache.get_or_create(&config()).await.unwrap();
    let mut moved = config();
    moved.server = "nessa.webuntis.com".to_string();
    let manager = cache.get_or_create(&moved).await.unwrap();

    assert_eq!(manager.config().server, "nessa.webuntis.com");
    assert_eq!(mock.rpc_calls("authenticate"), 2);
    assert_eq!(mock.rpc_calls("logout"), 1);
}

#[tokio::test]
async fn cache_ignores_resource_id_changes() {
    let mock = mock_with_login();
    let mut cache = SessionCache::new(mock.clone());

    cache.get_or_create(&config()).await.unwrap();
    cache
        .get_or_create(&config().with_resource_id(7))
        .await
        .unwrap();

    assert_eq!(mock.rpc_calls("authenticate"), 1);
}

#[tokio::test]
async fn cache_replaces_a_logged_out_session() {
    let mock = mock_with_login();
    let mut cache = SessionCache::new(mock.clone());

    cache.get_or_create(&config()).await.unwrap().logout().await;
    let manager = cache.get_or_create(&config()).await.unwrap();

    assert!(manager.is_authenticated());
    assert_eq!(mock.rpc_calls("authenticate"), 2);
}

#[tokio::test]
async fn cache_stays_empty_after_failed_login() {
    let mock = MockTransport::new();
    mock.on_rpc("authenticate", 200, json!({ "result": null }));
    let mut cache = SessionCache::new(mock.clone());

    assert!(matches!(
        cache.get_or_create(&config()).await,
        Err(Error::Authentication(_))
    ));
    assert!(cache.current().is_none());
}

#[tokio::test]
async fn clear_logs_out_and_empties_the_cache() {
    let mock = mock_with_login();
    let mut cache = SessionCache::new(mock.clone());

    cache.get_or_create(&config()).await.unwrap();
    cache.clear().await;

    assert!(cache.current().is_none());
    assert_eq!(mock.rpc_calls("logout"), 1);

    cache.clear().await;
    assert_eq!(mock.rpc_calls("logout"), 1);
}

#[tokio::test]
async fn separate_caches_hold_separate_sessions() {
    let mock = mock_with_login();
    let mut first = SessionCache::new(mock.clone());
    let mut second = SessionCache::new(mock.clone());

    first.get_or_create(&config()).await.unwrap();
    second.get_or_create(&config()).await.unwrap();

    assert_eq!(mock.rpc_calls("authenticate"), 2);
}
