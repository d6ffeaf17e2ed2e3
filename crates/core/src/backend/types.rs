//! Types for transcription backend operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to the transcription backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Non-200 response. The body is kept as opaque text.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_connect() {
            BackendError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Http(e.to_string())
        }
    }
}

/// Body of an accepted upload.
///
/// Some backend versions answer the upload with an immediate transcript and
/// summary. The polling flow never depends on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAck {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Outcome of one successful status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepReport {
    /// Full cumulative log history reported by the backend.
    Logs(Vec<String>),
    /// The backend answered 200 but the body had no usable `logs` array.
    NoLogs,
}

/// Raw body of the status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StepResponse {
    pub logs: Vec<String>,
}

/// Raw body of the result endpoint. Either field may be absent or null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Remote video processing backend.
///
/// Implemented by [`HttpBackend`](super::HttpBackend) for the real service
/// and by `testing::MockBackend` for tests.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Upload a video for processing.
    async fn upload(&self, filename: &str, content: Vec<u8>) -> Result<UploadAck, BackendError>;

    /// Fetch the current processing log.
    async fn current_step(&self) -> Result<StepReport, BackendError>;

    /// Fetch transcript and summary for a processed file.
    async fn fetch_result(&self, filename: &str) -> Result<ResultPayload, BackendError>;
}
