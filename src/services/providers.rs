// AI Detection Provider Service
// Implements GPTZero, ZeroGPT and Sapling request shapes

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use super::config_store::{Environment, PipeConfig};
use crate::models::{FailureKind, ProviderKind};

const GPTZERO_DEFAULT_URL: &str = "https://api.gptzero.me/v2/predict/text";
const ZEROGPT_DEFAULT_URL: &str = "https://api.zerogpt.com/api/detect/detectText";
const SAPLING_DEFAULT_URL: &str = "https://api.sapling.ai/api/v1/aidetect";

const SAPLING_SESSION_ID: &str = "cli_pipe_session";

/// Every user-visible failure. `Display` is the exact text printed by the pipe.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("No input received")]
    EmptyInput,
    #[error("{0} environment variable not set")]
    MissingCredential(&'static str),
    #[error("API request failed: {}", error_chain(.0))]
    Transport(#[source] reqwest::Error),
    #[error("API response error: {status}, message='{reason}', url='{url}'")]
    Status {
        status: u16,
        reason: String,
        url: String,
    },
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl DetectorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DetectorError::EmptyInput => FailureKind::EmptyInput,
            DetectorError::MissingCredential(_) => FailureKind::MissingCredential,
            DetectorError::Transport(_) => FailureKind::ClientTransportError,
            DetectorError::Status { .. } => FailureKind::HttpStatusError,
            DetectorError::Unexpected(_) => FailureKind::UnexpectedError,
        }
    }
}

/// `err` followed by each distinct cause, e.g.
/// `error sending request for url (..): client error (Connect): Connection refused`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

impl From<reqwest::Error> for DetectorError {
    fn from(e: reqwest::Error) -> Self {
        // Builder errors never reach the network (bad URL, bad header value).
        if e.is_builder() {
            DetectorError::Unexpected(e.to_string())
        } else {
            DetectorError::Transport(e)
        }
    }
}

/// One provider, resolved for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub endpoint_url: String,
    pub credential_env_var: &'static str,
}

impl ProviderKind {
    pub fn default_url(self) -> &'static str {
        match self {
            ProviderKind::GptZero => GPTZERO_DEFAULT_URL,
            ProviderKind::ZeroGpt => ZEROGPT_DEFAULT_URL,
            ProviderKind::Sapling => SAPLING_DEFAULT_URL,
        }
    }

    pub fn credential_env_var(self) -> &'static str {
        match self {
            ProviderKind::GptZero => "GPTZERO_API_KEY",
            ProviderKind::ZeroGpt => "ZEROGPT_API_KEY",
            ProviderKind::Sapling => "SAPLING_API_KEY",
        }
    }

    pub fn url_env_var(self) -> &'static str {
        match self {
            ProviderKind::GptZero => "GPTZERO_API_URL",
            ProviderKind::ZeroGpt => "ZEROGPT_API_URL",
            ProviderKind::Sapling => "SAPLING_API_URL",
        }
    }

    /// Endpoint from `<PROVIDER>_API_URL`, then the config file, then the built-in default.
    pub fn config(self, settings: &PipeConfig, env: &impl Environment) -> ProviderConfig {
        let endpoint_url = env
            .var(self.url_env_var())
            .filter(|u| !u.trim().is_empty())
            .or_else(|| settings.provider_url(self).map(str::to_string))
            .unwrap_or_else(|| self.default_url().to_string());

        ProviderConfig {
            kind: self,
            endpoint_url,
            credential_env_var: self.credential_env_var(),
        }
    }
}

impl ProviderConfig {
    pub fn headers(&self, credential: &str) -> Vec<(&'static str, String)> {
        match self.kind {
            ProviderKind::GptZero => vec![
                ("Accept", "application/json".to_string()),
                ("Content-Type", "application/json".to_string()),
                ("x-api-key", credential.to_string()),
            ],
            ProviderKind::ZeroGpt => vec![
                ("Content-Type", "application/json".to_string()),
                ("ApiKey", credential.to_string()),
            ],
            ProviderKind::Sapling => vec![
                ("Content-Type", "application/json".to_string()),
                ("Authorization", format!("Bearer {}", credential)),
            ],
        }
    }

    pub fn body(&self, text: &str) -> Value {
        match self.kind {
            ProviderKind::GptZero => json!({
                "document": text,
                "multilingual": false
            }),
            ProviderKind::ZeroGpt => json!({
                "input_text": text
            }),
            ProviderKind::Sapling => json!({
                "text": text,
                "session_id": SAPLING_SESSION_ID
            }),
        }
    }

    pub fn build_request(&self, text: &str, credential: &str) -> DetectionRequest {
        DetectionRequest {
            url: self.endpoint_url.clone(),
            headers: self.headers(credential),
            body: self.body(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

/// A single JSON POST. Implementations must not retry.
#[async_trait]
pub trait DetectionTransport: Send + Sync {
    async fn post_json(&self, request: &DetectionRequest) -> Result<Value, DetectorError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// No timeout unless one is given; reqwest's default is to wait indefinitely.
    pub fn new(timeout: Option<Duration>, proxy_url: Option<&str>) -> Result<Self, DetectorError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(url) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }
        let client = builder
            .build()
            .map_err(|e| DetectorError::Unexpected(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(settings: &PipeConfig, env: &impl Environment) -> Result<Self, DetectorError> {
        let proxy = settings.proxy.as_ref().and_then(|p| p.active_url());
        Self::new(settings.request_timeout(env), proxy)
    }
}

/// Stands in when the HTTP client could not be built (e.g. a malformed proxy URL),
/// so input and credential checks still run first.
pub struct UnavailableTransport {
    reason: String,
}

impl UnavailableTransport {
    pub fn new(err: DetectorError) -> Self {
        let reason = match err {
            DetectorError::Unexpected(reason) => reason,
            other => other.to_string(),
        };
        Self { reason }
    }
}

#[async_trait]
impl DetectionTransport for UnavailableTransport {
    async fn post_json(&self, _request: &DetectionRequest) -> Result<Value, DetectorError> {
        Err(DetectorError::Unexpected(self.reason.clone()))
    }
}

fn header_map(headers: &[(&'static str, String)]) -> Result<HeaderMap, DetectorError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| DetectorError::Unexpected(format!("invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| DetectorError::Unexpected(format!("invalid value for header {}: {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl DetectionTransport for HttpTransport {
    async fn post_json(&self, request: &DetectionRequest) -> Result<Value, DetectorError> {
        let headers = header_map(&request.headers)?;
        let start = Instant::now();

        debug!(url = %request.url, "detect.request");
        let response = self
            .client
            .post(&request.url)
            .headers(headers)
            .json(&request.body)
            .send()
            .await?;

        let status = response.status();
        let url = response.url().to_string();
        info!(
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "detect.response"
        );

        if !status.is_success() {
            return Err(DetectorError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                url,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            DetectorError::Unexpected(format!("response from {} is not valid JSON: {}", url, e))
        })
    }
}
