//! HTTP transport for the Gemini REST API.
//!
//! Shared by the embedding and generation services. Each call carries its own
//! timeout; failures are classified into [`ApiFailure`] so callers can decide
//! what to retry.

pub mod wire;

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::models::GeminiConfig;

const API_KEY_HEADER: &str = "x-goog-api-key";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// A failed call to the API, before it is mapped to a service error.
#[derive(Debug, Error)]
pub enum ApiFailure {
    #[error("API key is not configured")]
    MissingApiKey,

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, ApiFailure> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ApiFailure::MissingApiKey)?
            .to_string();

        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ApiFailure::Connect(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a model method, e.g. `{base}/models/embedding-001:embedContent`.
    pub fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/{}:{}", self.base_url, model_path(model), method)
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post<Req, Resp>(
        &self,
        url: &str,
        body: &Req,
        timeout: Duration,
    ) -> Result<Resp, ApiFailure>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        debug!(url, "gemini request");
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiFailure::Status {
                status: status.as_u16(),
                body: truncate(body.trim(), MAX_ERROR_BODY),
            });
        }

        let bytes = response.bytes().await.map_err(classify)?;
        serde_json::from_slice(&bytes).map_err(|e| ApiFailure::Decode(e.to_string()))
    }
}

/// Model resource name; bare ids get the `models/` prefix.
pub fn model_path(model: &str) -> String {
    if model.contains('/') {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

fn classify(e: reqwest::Error) -> ApiFailure {
    if e.is_timeout() {
        ApiFailure::Timeout
    } else if e.is_connect() {
        ApiFailure::Connect(e.to_string())
    } else {
        ApiFailure::Request(e)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
