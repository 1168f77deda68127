//! HTTP client for the generation backend.

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::models::{GenerateRequest, GenerateResponse, HealthStatus, ResponseEnvelope};

/// Errors raised while talking to the backend.
///
/// Every variant ends the submission that produced it; nothing here is
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend unreachable at {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("backend returned HTTP {status}")]
    Status { status: u16 },

    #[error("could not decode backend response: {message}")]
    Decode { message: String },

    #[error("backend rejected the request: {message}")]
    Rejected { message: String },
}

/// A service that turns a short prompt into an elaborated one.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Human-readable location, shown in the status bar.
    fn describe(&self) -> String;

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, BackendError>;

    async fn health(&self) -> Result<HealthStatus, BackendError>;
}

/// [`Backend`] reached over HTTP with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn describe(&self) -> String {
        self.base_url().to_string()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, BackendError> {
        let url = self.endpoint("/generate");
        debug!(
            %url,
            tone = %request.tone,
            format = %request.format,
            prompt_len = request.user_prompt.len(),
            "generate_request"
        );
        trace!(user_prompt = %request.user_prompt, persona = %request.persona, "generate_request_body");

        let res = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "backend_unreachable");
                BackendError::Unreachable {
                    url: url.clone(),
                    message: e.to_string(),
                }
            })?;

        let body = read_body(&url, res).await?;
        decode_generate(&body)
    }

    async fn health(&self) -> Result<HealthStatus, BackendError> {
        let url = self.endpoint("/");
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Unreachable {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let body = read_body(&url, res).await?;
        serde_json::from_slice(&body).map_err(|e| BackendError::Decode {
            message: e.to_string(),
        })
    }
}

async fn read_body(url: &str, res: reqwest::Response) -> Result<Vec<u8>, BackendError> {
    let status = res.status();
    if !status.is_success() {
        warn!(%url, status = status.as_u16(), "backend_status_error");
        return Err(BackendError::Status {
            status: status.as_u16(),
        });
    }

    let bytes = res.bytes().await.map_err(|e| BackendError::Unreachable {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    Ok(bytes.to_vec())
}

/// Decode a `/generate` body, surfacing backend-declared failures.
pub fn decode_generate(body: &[u8]) -> Result<GenerateResponse, BackendError> {
    let envelope: ResponseEnvelope =
        serde_json::from_slice(body).map_err(|e| BackendError::Decode {
            message: e.to_string(),
        })?;

    if envelope.status.as_deref() == Some("error") {
        let message = envelope
            .message
            .unwrap_or_else(|| "unspecified backend error".to_string());
        warn!(%message, "backend_rejected");
        return Err(BackendError::Rejected { message });
    }

    serde_json::from_slice(body).map_err(|e| BackendError::Decode {
        message: e.to_string(),
    })
}
