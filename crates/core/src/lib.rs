pub mod backend;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod testing;

pub use backend::{
    BackendError, HttpBackend, ResultPayload, StepReport, TranscriptionBackend, UploadAck,
};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, BackendConfig,
    Config, ConfigError,
};
pub use orchestrator::{
    FailureKind, JobError, JobHandle, JobOrchestrator, JobSnapshot, JobStatus, JobUpdateCallback,
    PollingConfig, TranscriptResult,
};
