//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

use untis_digest::{
    Result, Transport, TransportRequest, TransportResponse, UntisConfig,
    helpers::transport::Method,
};

enum Matcher {
    Rpc(String),
    Get(String),
}

struct Route {
    matcher: Matcher,
    response: TransportResponse,
}

/// Answers requests from a list of canned routes and records every request.
///
/// Later routes win over earlier ones, so tests can override a default.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_rpc(&self, method: &str, status: u16, body: Value) {
        self.routes.lock().unwrap().push(Route {
            matcher: Matcher::Rpc(method.to_string()),
            response: TransportResponse::new(status, body.to_string()),
        });
    }

    pub fn on_get(&self, url_fragment: &str, status: u16, body: impl Into<String>) {
        self.routes.lock().unwrap().push(Route {
            matcher: Matcher::Get(url_fragment.to_string()),
            response: TransportResponse::new(status, body),
        });
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn rpc_calls(&self, method: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| rpc_method(request).as_deref() == Some(method))
            .count()
    }

    pub fn gets(&self, url_fragment: &str) -> Vec<TransportRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == Method::Get && request.url.contains(url_fragment))
            .collect()
    }
}

fn rpc_method(request: &TransportRequest) -> Option<String> {
    if request.method != Method::Post {
        return None;
    }
    let body: Value = serde_json::from_str(request.body.as_deref()?).ok()?;
    body["method"].as_str().map(str::to_string)
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn request(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let method = rpc_method(&request);
        let routes = self.routes.lock().unwrap();
        let hit = routes.iter().rev().find(|route| match &route.matcher {
            Matcher::Rpc(name) => method.as_deref() == Some(name.as_str()),
            Matcher::Get(fragment) => {
                request.method == Method::Get && request.url.contains(fragment.as_str())
            }
        });

        Ok(match hit {
            Some(route) => route.response.clone(),
            None => TransportResponse::new(404, "no route"),
        })
    }
}

pub fn config() -> UntisConfig {
    UntisConfig::new("demo-school", "student", "secret", "mese.webuntis.com")
}

/// Successful login, no bearer token (403), accepting logout.
pub fn mock_with_login() -> Arc<MockTransport> {
    let mock = MockTransport::new();
    mock.on_rpc(
        "authenticate",
        200,
        json!({
            "jsonrpc": "2.0",
            "id": "1",
            "result": { "sessionId": "SID-1", "personId": 42, "personType": 5, "klasseId": 3 }
        }),
    );
    mock.on_get("/api/token/new", 403, "Forbidden");
    mock.on_rpc("logout", 200, json!({ "jsonrpc": "2.0", "id": "1", "result": null }));
    mock
}
