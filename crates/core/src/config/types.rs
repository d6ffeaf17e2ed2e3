use serde::{Deserialize, Serialize};

use crate::orchestrator::PollingConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Transcription backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend base URL (e.g., "http://192.168.1.106:8000")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Timeout for status and result requests in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Timeout for the upload request in seconds (default: 600)
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
    /// MIME type sent with the uploaded file part
    #[serde(default = "default_upload_mime_type")]
    pub upload_mime_type: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            upload_timeout_secs: default_upload_timeout(),
            upload_mime_type: default_upload_mime_type(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_upload_timeout() -> u64 {
    600
}

fn default_upload_mime_type() -> String {
    "video/mp4".to_string()
}
