//! Types for the job orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::backend::BackendError;

/// Log line the backend emits once processing has finished.
pub const SUCCESS_MARKER: &str = "[Step 9] Processing complete.";

/// Substring that marks a backend-side failure in a log line.
pub const ERROR_MARKER: &str = "[Error]";

/// Placeholder used when the result has no transcript.
pub const NO_TRANSCRIPT: &str = "No transcript available";

/// Placeholder used when the result has no summary.
pub const NO_SUMMARY: &str = "No summary available";

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Idle,
    Uploading,
    Polling,
    Complete,
    Failed,
}

impl JobStatus {
    /// Returns the string representation for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Uploading => "uploading",
            JobStatus::Polling => "polling",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether no further transitions can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a job failure, for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UploadFailed,
    PollFailed,
    RemoteProcessingError,
    ResultFetchFailed,
    NoFilename,
    EmptyPayload,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UploadFailed => "upload_failed",
            FailureKind::PollFailed => "poll_failed",
            FailureKind::RemoteProcessingError => "remote_processing_error",
            FailureKind::ResultFetchFailed => "result_fetch_failed",
            FailureKind::NoFilename => "no_filename",
            FailureKind::EmptyPayload => "empty_payload",
        }
    }
}

/// Errors that end a job.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    /// Upload was rejected or could not be sent.
    #[error("Upload failed: {0}")]
    UploadFailed(BackendError),

    /// A status poll was rejected or could not be sent.
    #[error("Failed to get logs: {0}")]
    PollFailed(BackendError),

    /// The poll ceiling was reached before a terminal marker appeared.
    #[error("Gave up waiting for processing after {attempts} polls")]
    PollTimedOut { attempts: u32 },

    /// The backend reported an `[Error]` line. Details are in the logs.
    #[error("Backend reported a processing error")]
    RemoteProcessingError,

    /// Processing succeeded but the result could not be retrieved.
    #[error("Failed to fetch results: {0}")]
    ResultFetchFailed(BackendError),

    #[error("No filename available")]
    NoFilename,

    #[error("Video content is empty")]
    EmptyPayload,
}

impl JobError {
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::UploadFailed(_) => FailureKind::UploadFailed,
            JobError::PollFailed(_) | JobError::PollTimedOut { .. } => FailureKind::PollFailed,
            JobError::RemoteProcessingError => FailureKind::RemoteProcessingError,
            JobError::ResultFetchFailed(_) => FailureKind::ResultFetchFailed,
            JobError::NoFilename => FailureKind::NoFilename,
            JobError::EmptyPayload => FailureKind::EmptyPayload,
        }
    }

    /// Message shown to the caller. Remote processing errors carry none:
    /// the log lines already describe them.
    pub fn user_message(&self) -> Option<String> {
        match self {
            JobError::RemoteProcessingError => None,
            other => Some(other.to_string()),
        }
    }
}

/// Final transcript and summary of a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub transcript: String,
    pub summary: String,
}

/// Read-only view of a job, published on every state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Job ID (fresh per submission, nil before the first one).
    pub job_id: Uuid,
    pub filename: String,
    pub status: JobStatus,
    /// Full log history from the most recent successful poll.
    pub log_lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TranscriptResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Short progress text, e.g. "Uploading...".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    /// Set when the caller abandoned the job. Status is left as it was.
    pub cancelled: bool,
    /// Number of status polls issued.
    pub poll_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl JobSnapshot {
    /// Snapshot of an orchestrator that has not run a job yet.
    pub fn idle() -> Self {
        Self {
            job_id: Uuid::nil(),
            filename: String::new(),
            status: JobStatus::Idle,
            log_lines: Vec::new(),
            result: None,
            error_message: None,
            failure: None,
            progress_message: None,
            cancelled: false,
            poll_count: 0,
            started_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether the job has stopped, either terminally or by cancellation.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal() || self.cancelled
    }
}

impl Default for JobSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}
