//! HTTP client for the structured-output completions endpoint.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::errors::{ApiErrorEnvelope, ClientError, classify_status};
use crate::format::{ChatResponse, CompletionRequest};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection and request timeouts, in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClientTimeout {
    pub connect: f64,
    pub request: f64,
}

impl Default for ClientTimeout {
    fn default() -> Self {
        Self {
            connect: 10.0,
            request: 120.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: ClientTimeout,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: ClientTimeout::default(),
        }
    }

    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        Some(config)
    }
}

/// Thin client around the completions endpoint. Schema encoding and
/// response decoding happen in the value types; this layer only moves
/// bytes and classifies failures.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    config: ClientConfig,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.config.base_url)
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key)).map_err(|error| {
                ClientError::Configuration(format!("invalid api key header: {error}"))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs_f64(config.timeout.connect))
            .timeout(Duration::from_secs_f64(config.timeout.request))
            .default_headers(headers)
            .build()
            .map_err(|error| ClientError::Network(error.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        let config = ClientConfig::from_env().ok_or_else(|| {
            ClientError::Configuration("OPENAI_API_KEY is not set".to_string())
        })?;
        Self::new(config)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Send a completion request and decode the response.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<ChatResponse, ClientError> {
        tracing::debug!(model = %request.model, "sending completion request");
        let response = self
            .http
            .post(self.endpoint())
            .json(request)
            .send()
            .await
            .map_err(|error| ClientError::Network(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(build_api_error(status.as_u16(), &body, retry_after));
        }

        let body = response
            .text()
            .await
            .map_err(|error| ClientError::Network(error.to_string()))?;
        let parsed = serde_json::from_str::<ChatResponse>(&body)?;
        tracing::debug!(id = %parsed.id, "completion response received");
        Ok(parsed)
    }
}

fn build_api_error(status: u16, body: &str, retry_after: Option<f64>) -> ClientError {
    let envelope = serde_json::from_str::<ApiErrorEnvelope>(body).unwrap_or_default();
    let (kind, retryable) = classify_status(status);
    let message = envelope
        .error
        .message
        .unwrap_or_else(|| body.to_string());
    ClientError::Api {
        status,
        kind,
        message,
        code: envelope.error.code,
        param: envelope.error.param,
        retryable,
        retry_after,
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<f64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok())
}
