use async_trait::async_trait;
use reqwest::{Client, header};
use serde::de::DeserializeOwned;
use std::{fmt, sync::Arc};
use tracing::{debug, error, info};

use crate::{Error, Result, config::TransportKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body.into()),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Uniform response shape, whichever transport produced it.
///
/// The body is read eagerly; JSON decoding happens only when asked for.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Turns a non-2xx response into [`Error::Http`].
    pub fn error_for_status(self, url: &str) -> Result<Self> {
        if self.ok() {
            Ok(self)
        } else {
            Err(Error::Http {
                status: self.status,
                url: url.to_string(),
                body: self.body,
            })
        }
    }
}

/// Something that can carry an HTTP request to WebUntis.
///
/// Implementations never fail on a non-2xx status; only on requests that
/// could not be performed at all.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn request(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// Picks the transport for the given kind.
///
/// Fails with [`Error::UnsupportedEnvironment`] when the requested client was
/// not compiled into this build.
pub fn select(kind: TransportKind) -> Result<Arc<dyn Transport>> {
    info!("Selecting {:?} transport", kind);
    match kind {
        TransportKind::Async => Ok(Arc::new(ReqwestTransport::new()?)),
        #[cfg(feature = "blocking")]
        TransportKind::Blocking => Ok(Arc::new(UreqTransport::new())),
        #[cfg(not(feature = "blocking"))]
        TransportKind::Blocking => {
            error!("Blocking transport requested but the 'blocking' feature is disabled");
            Err(Error::UnsupportedEnvironment(
                "blocking transport requires the 'blocking' feature".to_string(),
            ))
        }
    }
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        match Client::builder().default_headers(headers).build() {
            Ok(client) => {
                debug!("reqwest client initialized");
                Ok(Self { client })
            }
            Err(e) => {
                error!("Failed to build reqwest client: {}", e);
                Err(Error::UnsupportedEnvironment(format!(
                    "cannot build HTTP client: {e}"
                )))
            }
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    async fn request(&self, request: TransportRequest) -> Result<TransportResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);

        for (name, value) in &request.headers {
            let mut value = header::HeaderValue::from_str(value)
                .map_err(|e| Error::Transport(format!("invalid header '{name}': {e}")))?;
            if is_sensitive(name) {
                value.set_sensitive(true);
            }
            builder = builder.header(name.as_str(), value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            error!("Failed to send {} request: {}", request.method, e);
            Error::Transport(e.to_string())
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read response body: {}", e);
            Error::Transport(e.to_string())
        })?;

        debug!("{} {} -> {}", request.method, request.url, status);
        Ok(TransportResponse { status, body })
    }
}

#[cfg(feature = "blocking")]
pub struct UreqTransport {
    agent: ureq::Agent,
}

#[cfg(feature = "blocking")]
impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    fn perform(agent: &ureq::Agent, request: TransportRequest) -> Result<TransportResponse> {
        let mut call = agent.request(&request.method.to_string(), &request.url);
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }

        let outcome = match request.body {
            Some(body) => call.send_string(&body),
            None => call.call(),
        };

        // ureq reports 4xx/5xx as errors; fold them back into a plain response
        let response = match outcome {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(e)) => {
                error!("Failed to send {} request: {}", request.method, e);
                return Err(Error::Transport(e.to_string()));
            }
        };

        let status = response.status();
        let body = response
            .into_string()
            .map_err(|e| Error::Transport(format!("failed to read response body: {e}")))?;

        debug!("{} {} -> {}", request.method, request.url, status);
        Ok(TransportResponse { status, body })
    }
}

#[cfg(feature = "blocking")]
impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "blocking")]
#[async_trait]
impl Transport for UreqTransport {
    fn name(&self) -> &'static str {
        "ureq"
    }

    async fn request(&self, request: TransportRequest) -> Result<TransportResponse> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || Self::perform(&agent, request))
            .await
            .map_err(|e| Error::Transport(format!("blocking request task failed: {e}")))?
    }
}

fn is_sensitive(name: &str) -> bool {
    name.eq_ignore_ascii_case("authorization") || name.eq_ignore_ascii_case("cookie")
}
