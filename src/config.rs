use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{env, str::FromStr};
use tracing::info;

use crate::{Error, Result};

/// Which HTTP stack carries requests to WebUntis.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Native async client (reqwest).
    #[default]
    Async,
    /// Blocking client (ureq) run on tokio's blocking pool.
    Blocking,
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "async" | "reqwest" => Ok(TransportKind::Async),
            "blocking" | "ureq" => Ok(TransportKind::Blocking),
            other => Err(Error::Configuration(format!(
                "unknown transport '{other}', expected 'async' or 'blocking'"
            ))),
        }
    }
}

/// Connection settings for one WebUntis account
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UntisConfig {
    pub school: String,
    pub username: String,
    pub password: String,
    /// Bare host like `mese.webuntis.com`, or a full base URL.
    pub server: String,
    /// Default student id for timetable lookups.
    #[serde(default)]
    pub resource_id: Option<i64>,
    #[serde(default)]
    pub transport: TransportKind,
}

#[derive(Serialize)]
struct FingerprintFields<'a> {
    school: &'a str,
    username: &'a str,
    password: &'a str,
    server: &'a str,
}

impl UntisConfig {
    pub fn new(
        school: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        Self {
            school: school.into(),
            username: username.into(),
            password: password.into(),
            server: server.into(),
            resource_id: None,
            transport: TransportKind::default(),
        }
    }

    pub fn with_resource_id(mut self, resource_id: i64) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Load configuration from `UNTIS_*` environment variables
    pub fn from_env() -> Result<Self> {
        info!("Loading WebUntis configuration from environment");

        let resource_id = match optional_var("UNTIS_RESOURCE_ID") {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|e| {
                Error::Configuration(format!("UNTIS_RESOURCE_ID '{raw}' is not an integer: {e}"))
            })?),
            None => None,
        };
        let transport = match optional_var("UNTIS_TRANSPORT") {
            Some(raw) => raw.parse()?,
            None => TransportKind::default(),
        };

        let config = Self {
            school: required_var("UNTIS_SCHOOL")?,
            username: required_var("UNTIS_USERNAME")?,
            password: required_var("UNTIS_PASSWORD")?,
            server: required_var("UNTIS_SERVER")?,
            resource_id,
            transport,
        };

        info!(
            "Configuration loaded for school '{}' on {} ({:?} transport)",
            config.school, config.server, config.transport
        );
        Ok(config)
    }

    /// Stable hash over the fields that identify a login.
    ///
    /// Two configs with the same fingerprint can share a session. The resource
    /// id and transport choice do not take part.
    pub fn fingerprint(&self) -> String {
        let fields = FingerprintFields {
            school: &self.school,
            username: &self.username,
            password: &self.password,
            server: &self.server,
        };
        // serializing a struct of &str cannot fail
        let serialized = serde_json::to_vec(&fields).unwrap_or_default();
        hex::encode(Sha256::digest(&serialized))
    }

    /// Base URL of the WebUntis installation, without trailing slash.
    pub fn base_url(&self) -> String {
        let server = self.server.trim().trim_end_matches('/');
        if server.starts_with("http://") || server.starts_with("https://") {
            server.to_string()
        } else {
            format!("https://{server}/WebUntis")
        }
    }
}

fn required_var(name: &str) -> Result<String> {
    optional_var(name).ok_or_else(|| Error::Configuration(format!("{name} is not set")))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
