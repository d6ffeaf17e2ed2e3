//! Testing utilities and mock implementations.
//!
//! This module provides a mock of the transcription backend so the
//! orchestrator can be exercised without a real processing service.
//!
//! # Example
//!
//! ```rust,ignore
//! use vidscribe_core::testing::{fixtures, MockBackend};
//!
//! let backend = MockBackend::new();
//! backend.push_logs(fixtures::completed_logs()).await;
//! backend.set_result(fixtures::result("hello", "hi")).await;
//! ```

mod mock_backend;

pub use mock_backend::{MockBackend, RecordedCall, RecordedRequest};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::backend::ResultPayload;
    use crate::orchestrator::{PollingConfig, SUCCESS_MARKER};

    /// Build a log history from string slices.
    pub fn logs(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|line| line.to_string()).collect()
    }

    /// A log history that ends with the success marker.
    pub fn completed_logs() -> Vec<String> {
        vec![
            "[Step 1] Video received.".to_string(),
            "[Step 2] Extracting audio.".to_string(),
            SUCCESS_MARKER.to_string(),
        ]
    }

    /// A log history that ends with a backend error line.
    pub fn errored_logs(detail: &str) -> Vec<String> {
        vec![
            "[Step 1] Video received.".to_string(),
            format!("[Error] {}", detail),
        ]
    }

    /// Result payload with both fields present.
    pub fn result(transcript: &str, summary: &str) -> ResultPayload {
        ResultPayload {
            transcript: Some(transcript.to_string()),
            summary: Some(summary.to_string()),
        }
    }

    /// Polling config with a short interval for tests.
    pub fn fast_polling() -> PollingConfig {
        PollingConfig {
            interval_ms: 10,
            max_attempts: None,
            max_duration_secs: Some(30),
        }
    }

    /// Fake video bytes.
    pub fn video_bytes() -> Vec<u8> {
        b"\x00\x00\x00\x18ftypmp42fake-video-payload".to_vec()
    }
}
