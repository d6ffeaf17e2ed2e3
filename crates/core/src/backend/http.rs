//! HTTP transcription backend.
//!
//! Endpoints, relative to the configured base URL:
//! - `POST /process_video/` (multipart, one part named `file`)
//! - `GET /current_step/` returning `{"logs": [..]}`
//! - `GET /results/{filename}` returning `{"transcript": .., "summary": ..}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode};
use tracing::{debug, warn};

use crate::config::BackendConfig;

use super::types::StepResponse;
use super::{BackendError, ResultPayload, StepReport, TranscriptionBackend, UploadAck};

/// Multipart field name expected by the upload endpoint.
const UPLOAD_FIELD: &str = "file";

/// reqwest-based backend client.
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Create a new HTTP backend.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.config.upload_timeout_secs)
    }

    pub(crate) fn upload_url(&self) -> String {
        format!("{}/process_video/", self.base_url())
    }

    pub(crate) fn status_url(&self) -> String {
        format!("{}/current_step/", self.base_url())
    }

    pub(crate) fn result_url(&self, filename: &str) -> String {
        format!(
            "{}/results/{}",
            self.base_url(),
            urlencoding::encode(filename)
        )
    }

    /// Turn a non-200 response into an error carrying the body as opaque text.
    async fn ensure_ok(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl TranscriptionBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload(&self, filename: &str, content: Vec<u8>) -> Result<UploadAck, BackendError> {
        let url = self.upload_url();
        debug!(
            "Uploading {} ({} bytes) to {}",
            filename,
            content.len(),
            url
        );

        let part = multipart::Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str(&self.config.upload_mime_type)
            .map_err(|e| BackendError::Http(format!("invalid upload MIME type: {}", e)))?;
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(&url)
            .timeout(self.upload_timeout())
            .multipart(form)
            .send()
            .await?;
        let response = Self::ensure_ok(response).await?;

        // A body cut short means the upload did not land; its content is
        // informational only
        let body = response.text().await?;
        match serde_json::from_str::<UploadAck>(&body) {
            Ok(ack) => Ok(ack),
            Err(e) => {
                debug!("Upload response is not a result object: {}", e);
                Ok(UploadAck::default())
            }
        }
    }

    async fn current_step(&self) -> Result<StepReport, BackendError> {
        let url = self.status_url();
        debug!("Polling {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout())
            .send()
            .await?;
        let response = Self::ensure_ok(response).await?;
        let body = response.text().await?;

        match serde_json::from_str::<StepResponse>(&body) {
            Ok(step) => Ok(StepReport::Logs(step.logs)),
            Err(e) => {
                warn!("Status response has no usable logs: {}", e);
                Ok(StepReport::NoLogs)
            }
        }
    }

    async fn fetch_result(&self, filename: &str) -> Result<ResultPayload, BackendError> {
        let url = self.result_url(filename);
        debug!("Fetching result from {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout())
            .send()
            .await?;
        let response = Self::ensure_ok(response).await?;
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| {
            BackendError::Decode(format!("Failed to parse result response: {}", e))
        })
    }
}
