//! Transcription backend abstraction.
//!
//! This module provides a `TranscriptionBackend` trait for the remote video
//! processing service, plus the reqwest-based HTTP implementation.

mod http;
mod types;

pub use http::HttpBackend;
pub use types::*;
