//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Jobs (submissions, outcomes, duration)
//! - Polling (status requests by outcome)
//! - Backend requests (latency and status per operation)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs submitted total.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("vidscribe_jobs_submitted_total", "Total jobs submitted").unwrap()
});

/// Jobs finished total by result.
pub static JOB_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidscribe_job_outcomes_total", "Total jobs finished"),
        &["result"], // "complete", "failed", "cancelled"
    )
    .unwrap()
});

/// Job failures total by failure kind.
pub static JOB_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidscribe_job_failures_total", "Total job failures"),
        &["kind"],
    )
    .unwrap()
});

/// Job duration in seconds, from submission to terminal state.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("vidscribe_job_duration_seconds", "Duration of jobs").buckets(vec![
            1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
        ]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Polling Metrics
// =============================================================================

/// Status polls total by outcome.
pub static POLL_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidscribe_poll_requests_total", "Total status polls"),
        &["outcome"], // "logs", "no_logs", "error"
    )
    .unwrap()
});

// =============================================================================
// Backend Metrics
// =============================================================================

/// Backend request duration.
pub static BACKEND_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vidscribe_backend_request_duration_seconds",
            "Duration of backend requests",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0]),
        &["operation"],
    )
    .unwrap()
});

/// Backend requests total.
pub static BACKEND_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidscribe_backend_requests_total", "Total backend requests"),
        &["operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Jobs
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOB_OUTCOMES.clone()),
        Box::new(JOB_FAILURES.clone()),
        Box::new(JOB_DURATION.clone()),
        // Polling
        Box::new(POLL_REQUESTS.clone()),
        // Backend
        Box::new(BACKEND_REQUEST_DURATION.clone()),
        Box::new(BACKEND_REQUESTS.clone()),
    ]
}
