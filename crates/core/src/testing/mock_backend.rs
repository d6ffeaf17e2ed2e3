//! Mock transcription backend for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::backend::{BackendError, ResultPayload, StepReport, TranscriptionBackend, UploadAck};

/// A recorded backend call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Upload { filename: String, size: usize },
    CurrentStep,
    FetchResult { filename: String },
}

/// A recorded call with the time it was made.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub call: RecordedCall,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the TranscriptionBackend trait.
///
/// Provides controllable behavior for testing:
/// - Script status responses poll by poll
/// - Track every request for assertions
/// - Simulate failures and slow responses
///
/// Status responses are consumed in order; once the script runs out, the
/// last response is repeated.
///
/// # Example
///
/// ```rust,ignore
/// use vidscribe_core::testing::{fixtures, MockBackend};
///
/// let backend = MockBackend::new();
/// backend.push_logs(fixtures::logs(&["[Step 1] start"])).await;
/// backend.push_logs(fixtures::completed_logs()).await;
/// backend.set_result(fixtures::result("hello", "hi")).await;
///
/// // ... run a job ...
/// assert_eq!(backend.poll_count().await, 2);
/// ```
#[derive(Debug)]
pub struct MockBackend {
    /// Response to every upload.
    upload_response: Arc<RwLock<Result<UploadAck, BackendError>>>,
    /// Scripted status responses, consumed front to back.
    steps: Arc<RwLock<VecDeque<Result<StepReport, BackendError>>>>,
    /// Response repeated once the script is exhausted.
    last_step: Arc<RwLock<Result<StepReport, BackendError>>>,
    /// Response to every result fetch.
    result_response: Arc<RwLock<Result<ResultPayload, BackendError>>>,
    /// Recorded requests.
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
    upload_delay: Arc<RwLock<Duration>>,
    step_delay: Arc<RwLock<Duration>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a mock that accepts uploads and reports an empty log.
    pub fn new() -> Self {
        Self {
            upload_response: Arc::new(RwLock::new(Ok(UploadAck::default()))),
            steps: Arc::new(RwLock::new(VecDeque::new())),
            last_step: Arc::new(RwLock::new(Ok(StepReport::Logs(Vec::new())))),
            result_response: Arc::new(RwLock::new(Ok(ResultPayload::default()))),
            requests: Arc::new(RwLock::new(Vec::new())),
            upload_delay: Arc::new(RwLock::new(Duration::ZERO)),
            step_delay: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Make uploads fail with the given error.
    pub async fn set_upload_error(&self, error: BackendError) {
        *self.upload_response.write().await = Err(error);
    }

    /// Make uploads succeed with the given body.
    pub async fn set_upload_ack(&self, ack: UploadAck) {
        *self.upload_response.write().await = Ok(ack);
    }

    /// Queue a status response with the given log history.
    pub async fn push_logs(&self, logs: Vec<String>) {
        self.push_step(Ok(StepReport::Logs(logs))).await;
    }

    /// Queue an arbitrary status response.
    pub async fn push_step(&self, step: Result<StepReport, BackendError>) {
        self.steps.write().await.push_back(step);
    }

    /// Set the result endpoint response.
    pub async fn set_result(&self, payload: ResultPayload) {
        *self.result_response.write().await = Ok(payload);
    }

    /// Make result fetches fail with the given error.
    pub async fn set_result_error(&self, error: BackendError) {
        *self.result_response.write().await = Err(error);
    }

    /// Delay every upload by the given duration.
    pub async fn set_upload_delay(&self, delay: Duration) {
        *self.upload_delay.write().await = delay;
    }

    /// Delay every status response by the given duration.
    pub async fn set_step_delay(&self, delay: Duration) {
        *self.step_delay.write().await = delay;
    }

    // =========================================================================
    // Assertions
    // =========================================================================

    /// Get all recorded requests, oldest first.
    pub async fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    /// Get the recorded calls without timestamps.
    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.requests
            .read()
            .await
            .iter()
            .map(|r| r.call.clone())
            .collect()
    }

    pub async fn upload_count(&self) -> usize {
        self.count(|c| matches!(c, RecordedCall::Upload { .. }))
            .await
    }

    pub async fn poll_count(&self) -> usize {
        self.count(|c| matches!(c, RecordedCall::CurrentStep)).await
    }

    pub async fn fetch_count(&self) -> usize {
        self.count(|c| matches!(c, RecordedCall::FetchResult { .. }))
            .await
    }

    /// Clear recorded requests.
    pub async fn clear_recorded(&self) {
        self.requests.write().await.clear();
    }

    async fn count(&self, pred: impl Fn(&RecordedCall) -> bool) -> usize {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| pred(&r.call))
            .count()
    }

    async fn record(&self, call: RecordedCall) {
        self.requests.write().await.push(RecordedRequest {
            call,
            timestamp: Utc::now(),
        });
    }
}

#[async_trait]
impl TranscriptionBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(&self, filename: &str, content: Vec<u8>) -> Result<UploadAck, BackendError> {
        self.record(RecordedCall::Upload {
            filename: filename.to_string(),
            size: content.len(),
        })
        .await;

        let delay = *self.upload_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.upload_response.read().await.clone()
    }

    async fn current_step(&self) -> Result<StepReport, BackendError> {
        self.record(RecordedCall::CurrentStep).await;

        let delay = *self.step_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let next = self.steps.write().await.pop_front();
        match next {
            Some(step) => {
                *self.last_step.write().await = step.clone();
                step
            }
            None => self.last_step.read().await.clone(),
        }
    }

    async fn fetch_result(&self, filename: &str) -> Result<ResultPayload, BackendError> {
        self.record(RecordedCall::FetchResult {
            filename: filename.to_string(),
        })
        .await;

        self.result_response.read().await.clone()
    }
}
