use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    Error, Result,
    config::{TransportKind, UntisConfig},
    helpers::transport::{self, Transport, TransportRequest, TransportResponse},
    models::rpc::{AuthResult, RpcRequest, RpcResponse},
};

/// Client identifier sent with every `authenticate` call.
pub const CLIENT_NAME: &str = "untis-digest";

/// Credentials of a logged-in WebUntis session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub person_id: i64,
    pub person_type: i64,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// Owns the login of one [`UntisConfig`] and signs requests with it.
pub struct SessionManager {
    config: UntisConfig,
    fingerprint: String,
    transport: Arc<dyn Transport>,
    session: Option<Session>,
    state: SessionState,
}

impl SessionManager {
    pub fn new(config: UntisConfig, transport: Arc<dyn Transport>) -> Self {
        let fingerprint = config.fingerprint();
        Self {
            config,
            fingerprint,
            transport,
            session: None,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn config(&self) -> &UntisConfig {
        &self.config
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn has_bearer(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.bearer_token.is_some())
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Logs in with the configured credentials.
    ///
    /// Any previous session held by this manager is dropped first. After a
    /// successful login a bearer token is requested as well; failing to get
    /// one is logged and otherwise ignored.
    pub async fn authenticate(&mut self) -> Result<()> {
        info!(
            "Authenticating '{}' at school '{}' on {}",
            self.config.username, self.config.school, self.config.server
        );
        self.session = None;
        self.state = SessionState::Authenticating;

        match self.request_session().await {
            Ok(session) => {
                info!(
                    "Authenticated as person {} (type {})",
                    session.person_id, session.person_type
                );
                self.session = Some(session);
                self.state = SessionState::Authenticated;
            }
            Err(e) => {
                error!("Authentication failed: {}", e);
                self.state = SessionState::Unauthenticated;
                return Err(e);
            }
        }

        match self.request_bearer_token().await {
            Ok(Some(token)) => {
                if let Some(session) = self.session.as_mut() {
                    session.bearer_token = Some(token);
                }
                info!("Bearer token acquired");
            }
            Ok(None) => {}
            Err(e) => warn!("Could not acquire bearer token, continuing without it: {}", e),
        }

        Ok(())
    }

    async fn request_session(&self) -> Result<Session> {
        let params = json!({
            "user": self.config.username,
            "password": self.config.password,
            "client": CLIENT_NAME,
        });
        let response = self.post_rpc("authenticate", params, None).await?;

        if let Some(rpc_error) = response.error {
            return Err(Error::Authentication(format!(
                "{} (code {})",
                rpc_error.message, rpc_error.code
            )));
        }
        let result = response
            .result
            .filter(|result| !result.is_null())
            .ok_or_else(|| Error::Authentication("response carried no result".to_string()))?;

        let auth: AuthResult = serde_json::from_value(result)?;
        let session_id = auth
            .session_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Authentication("response carried no session id".to_string()))?;

        Ok(Session {
            session_id,
            person_id: auth.person_id,
            person_type: auth.person_type,
            bearer_token: None,
        })
    }

    /// Asks for a REST bearer token. `Ok(None)` means the server refused (403),
    /// which many installations do for student accounts.
    async fn request_bearer_token(&self) -> Result<Option<String>> {
        let session = self.session.as_ref().ok_or(Error::Unauthenticated)?;
        let url = format!("{}/api/token/new", self.config.base_url());
        debug!("Requesting bearer token");

        let request = self.sign(TransportRequest::get(&url), session);
        let response = self.transport.request(request).await?;

        if response.status == 403 {
            info!("Bearer token not offered for this account (403), using session cookie only");
            return Ok(None);
        }

        let response = response.error_for_status(&url)?;
        let token = response.text().trim().trim_matches('"');
        if token.is_empty() {
            warn!("Bearer token endpoint returned an empty body");
            return Ok(None);
        }
        Ok(Some(token.to_string()))
    }

    /// Ends the session upstream and always forgets it locally.
    pub async fn logout(&mut self) {
        self.state = SessionState::Unauthenticated;
        let Some(session) = self.session.take() else {
            debug!("Logout requested without an active session");
            return;
        };

        info!("Logging out of WebUntis");
        match self.post_rpc("logout", json!({}), Some(&session)).await {
            Ok(RpcResponse {
                error: Some(rpc_error),
                ..
            }) => warn!(
                "Logout rejected ({}: {}), local session cleared anyway",
                rpc_error.code, rpc_error.message
            ),
            Ok(_) => info!("Logged out"),
            Err(e) => warn!("Logout request failed, local session cleared anyway: {}", e),
        }
    }

    /// Calls a JSON-RPC method within the current session.
    pub async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        let session = self.session.as_ref().ok_or(Error::Unauthenticated)?;
        let response = self.post_rpc(method, params, Some(session)).await?;

        if let Some(rpc_error) = response.error {
            error!(
                "WebUntis rejected '{}': {} (code {})",
                method, rpc_error.message, rpc_error.code
            );
            return Err(Error::Rpc {
                code: rpc_error.code,
                message: rpc_error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Authenticated GET; a non-2xx status becomes [`Error::Http`].
    pub async fn get(&self, url: &str) -> Result<TransportResponse> {
        let session = self.session.as_ref().ok_or(Error::Unauthenticated)?;
        let request = self.sign(TransportRequest::get(url), session);

        let response = self.transport.request(request).await?;
        match response.error_for_status(url) {
            Ok(response) => Ok(response),
            Err(e) => {
                error!("WebUntis request failed: {}", e);
                Err(e)
            }
        }
    }

    /// Builds `{base}{path}?{params}` with proper query encoding.
    pub fn api_url(&self, path: &str, params: &[(&str, &str)]) -> Result<String> {
        let base = format!("{}{}", self.config.base_url(), path);
        Url::parse_with_params(&base, params)
            .map(String::from)
            .map_err(|e| {
                Error::Configuration(format!("invalid server '{}': {e}", self.config.server))
            })
    }

    async fn post_rpc(
        &self,
        method: &str,
        params: Value,
        session: Option<&Session>,
    ) -> Result<RpcResponse> {
        let url = self.api_url("/jsonrpc.do", &[("school", self.config.school.as_str())])?;
        let id = format!("{}-{}", CLIENT_NAME, Utc::now().timestamp_millis());
        let body = serde_json::to_string(&RpcRequest::new(&id, method, params))?;

        let mut request = TransportRequest::post(&url, body);
        if let Some(session) = session {
            request = self.sign(request, session);
        }

        debug!("Calling JSON-RPC method '{}'", method);
        let response = self.transport.request(request).await?;
        response.error_for_status(&url)?.json()
    }

    fn sign(&self, request: TransportRequest, session: &Session) -> TransportRequest {
        let request = request.header("Cookie", session_cookie(session, &self.config.school));
        match &session.bearer_token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }
}

/// `Cookie` header value carrying a session.
pub fn session_cookie(session: &Session, school: &str) -> String {
    format!(
        "JSESSIONID={}; schoolname=\"_{}\"",
        session.session_id,
        STANDARD.encode(school)
    )
}

/// Holds at most one live [`SessionManager`] and hands it out again for as
/// long as the configuration fingerprint stays the same.
///
/// Methods take `&mut self`, so callers sharing a cache must serialize access
/// themselves (the service does so with a mutex).
pub struct SessionCache {
    transport: Arc<dyn Transport>,
    current: Option<SessionManager>,
}

impl SessionCache {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            current: None,
        }
    }

    pub fn for_transport(kind: TransportKind) -> Result<Self> {
        Ok(Self::new(transport::select(kind)?))
    }

    pub fn current(&self) -> Option<&SessionManager> {
        self.current.as_ref()
    }

    /// Returns the cached manager if it belongs to `config` and is still logged
    /// in; otherwise replaces it with a freshly authenticated one.
    pub async fn get_or_create(&mut self, config: &UntisConfig) -> Result<&mut SessionManager> {
        let fingerprint = config.fingerprint();
        let reusable = self.current.as_ref().is_some_and(|manager| {
            manager.fingerprint() == fingerprint && manager.is_authenticated()
        });

        if reusable {
            debug!("Reusing cached WebUntis session");
            return self.current.as_mut().ok_or(Error::Unauthenticated);
        }

        if let Some(mut stale) = self.current.take() {
            info!("Discarding cached session, configuration changed or session ended");
            stale.logout().await;
        }

        let mut manager = SessionManager::new(config.clone(), Arc::clone(&self.transport));
        manager.authenticate().await?;
        Ok(self.current.insert(manager))
    }

    /// Logs out the cached session, if any, and empties the cache.
    pub async fn clear(&mut self) {
        match self.current.take() {
            Some(mut manager) => {
                info!("Clearing cached WebUntis session");
                manager.logout().await;
            }
            None => debug!("Session cache already empty"),
        }
    }
}
