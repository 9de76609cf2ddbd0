use log::info;
use reqwest::Url;
use serde::Serialize;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

pub const ALERT_WEBHOOK_URL_ENV: &str = "ALERT_WEBHOOK_URL";

static WEBHOOK_ENDPOINT: OnceLock<String> = OnceLock::new();

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("no alert webhook configured; set ALERT_WEBHOOK_URL to receive alerts")]
    NotConfigured,
    #[error("alert webhook endpoint was already initialised")]
    AlreadyInitialized,
    #[error("invalid alert webhook endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("failed to build alert HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("alert webhook request failed")]
    Transport(#[from] reqwest::Error),
    #[error("alert webhook responded with status {0}")]
    Status(reqwest::StatusCode),
}

/// Structured description of a training abort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub observed_rows: usize,
    pub required_rows: usize,
    pub instrument_count: usize,
}

impl AlertPayload {
    pub fn message(&self) -> String {
        format!(
            "CRITICAL ABORT: insufficient data for training. Found {} valid rows across {} instruments; minimum required is {}. Check the upstream data providers for outages or rate limiting.",
            self.observed_rows, self.instrument_count, self.required_rows
        )
    }
}

/// Best-effort delivery of an abort alert.
pub trait AlertNotifier: Send + Sync {
    fn send(&self, payload: &AlertPayload) -> Result<(), AlertError>;
}

// Discord reads `content`, Slack reads `text`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookBody<'a> {
    content: &'a str,
    text: &'a str,
    #[serde(flatten)]
    payload: &'a AlertPayload,
}

pub struct WebhookNotifier {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, AlertError> {
        let endpoint = validate_endpoint(endpoint)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AlertError::Client)?;
        Ok(Self { client, endpoint })
    }
}

impl AlertNotifier for WebhookNotifier {
    fn send(&self, payload: &AlertPayload) -> Result<(), AlertError> {
        let message = payload.message();
        let body = WebhookBody {
            content: &message,
            text: &message,
            payload,
        };
        let response = self.client.post(&self.endpoint).json(&body).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::Status(status));
        }
        info!("Alert dispatched to webhook");
        Ok(())
    }
}

/// Stand-in used when no endpoint was configured at startup.
pub struct UnconfiguredNotifier;

impl AlertNotifier for UnconfiguredNotifier {
    fn send(&self, _payload: &AlertPayload) -> Result<(), AlertError> {
        Err(AlertError::NotConfigured)
    }
}

fn validate_endpoint(raw: &str) -> Result<String, AlertError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|err| AlertError::InvalidEndpoint(err.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(AlertError::InvalidEndpoint(format!(
            "unsupported scheme {}",
            url.scheme()
        )));
    }
    Ok(trimmed.to_string())
}

/// Installs the process-wide webhook endpoint. May only be called once.
pub fn init_webhook_endpoint(endpoint: &str) -> Result<(), AlertError> {
    let endpoint = validate_endpoint(endpoint)?;
    WEBHOOK_ENDPOINT
        .set(endpoint)
        .map_err(|_| AlertError::AlreadyInitialized)
}

pub fn configured_webhook_endpoint() -> Option<&'static str> {
    WEBHOOK_ENDPOINT.get().map(String::as_str)
}

/// Reads the endpoint from the environment and installs it, if present.
pub fn init_webhook_endpoint_from_env() -> Result<bool, AlertError> {
    let Some(value) = env::var(ALERT_WEBHOOK_URL_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    else {
        return Ok(false);
    };
    init_webhook_endpoint(&value)?;
    Ok(true)
}

pub fn configured_notifier(timeout: Duration) -> Result<Box<dyn AlertNotifier>, AlertError> {
    match configured_webhook_endpoint() {
        Some(endpoint) => Ok(Box::new(WebhookNotifier::new(endpoint, timeout)?)),
        None => Ok(Box::new(UnconfiguredNotifier)),
    }
}
