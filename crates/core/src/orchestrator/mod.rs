//! Job orchestrator for video transcription.
//!
//! The orchestrator drives one job at a time through the state machine:
//! - **Upload**: multipart POST, awaited by `submit`
//! - **Polling**: background task reading the full processing log every interval
//! - **Result**: transcript and summary fetched after the success marker
//!
//! Callers observe progress through `JobSnapshot` values only.

mod config;
mod handle;
mod runner;
mod types;

pub use config::PollingConfig;
pub use handle::JobHandle;
pub use runner::{JobOrchestrator, JobUpdateCallback};
pub use types::{
    FailureKind, JobError, JobSnapshot, JobStatus, TranscriptResult, ERROR_MARKER, NO_SUMMARY,
    NO_TRANSCRIPT, SUCCESS_MARKER,
};
