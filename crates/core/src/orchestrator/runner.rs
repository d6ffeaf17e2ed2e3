//! Job orchestrator implementation.
//!
//! Drives one job at a time through the state machine:
//! - Upload: single request, awaited by `submit`
//! - Polling: background task, one status request per interval
//! - Result: fetched once the success marker shows up in the log

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{BackendError, ResultPayload, StepReport, TranscriptionBackend};
use crate::metrics::{
    BACKEND_REQUESTS, BACKEND_REQUEST_DURATION, JOBS_SUBMITTED, JOB_DURATION, JOB_FAILURES,
    JOB_OUTCOMES, POLL_REQUESTS,
};

use super::config::PollingConfig;
use super::handle::JobHandle;
use super::types::{
    JobError, JobSnapshot, JobStatus, TranscriptResult, ERROR_MARKER, NO_SUMMARY, NO_TRANSCRIPT,
    SUCCESS_MARKER,
};

/// Buffer size for the snapshot broadcast channel.
const SNAPSHOT_BUFFER_SIZE: usize = 256;

const UPLOADING_MESSAGE: &str = "Uploading...";
const PROCESSING_MESSAGE: &str = "Processing...";
const NO_LOGS_MESSAGE: &str = "No logs available";
const COMPLETE_MESSAGE: &str = "Processing complete";

/// Callback invoked synchronously with every published snapshot.
pub type JobUpdateCallback = Arc<dyn Fn(&JobSnapshot) + Send + Sync>;

/// What the latest log history says about the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogVerdict {
    Pending,
    Succeeded,
    Errored,
}

/// The success marker must match a whole line; the error marker may appear
/// anywhere in a line. Success wins when both are present.
pub(crate) fn classify_logs(lines: &[String]) -> LogVerdict {
    if lines.iter().any(|line| line == SUCCESS_MARKER) {
        LogVerdict::Succeeded
    } else if lines.iter().any(|line| line.contains(ERROR_MARKER)) {
        LogVerdict::Errored
    } else {
        LogVerdict::Pending
    }
}

fn into_transcript(payload: ResultPayload) -> TranscriptResult {
    TranscriptResult {
        transcript: payload
            .transcript
            .unwrap_or_else(|| NO_TRANSCRIPT.to_string()),
        summary: payload.summary.unwrap_or_else(|| NO_SUMMARY.to_string()),
    }
}

/// Run a backend call, recording its latency and outcome.
async fn metered<T, F>(operation: &str, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    let start = Instant::now();
    let result = call.await;
    BACKEND_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());
    let status = if result.is_ok() { "success" } else { "error" };
    BACKEND_REQUESTS
        .with_label_values(&[operation, status])
        .inc();
    result
}

async fn fetch_transcript(
    backend: &dyn TranscriptionBackend,
    filename: &str,
) -> Result<TranscriptResult, JobError> {
    if filename.is_empty() {
        return Err(JobError::NoFilename);
    }

    metered("fetch_result", backend.fetch_result(filename))
        .await
        .map(into_transcript)
        .map_err(JobError::ResultFetchFailed)
}

fn record_outcome(result: &str, started: Instant) {
    JOB_OUTCOMES.with_label_values(&[result]).inc();
    JOB_DURATION
        .with_label_values(&[result])
        .observe(started.elapsed().as_secs_f64());
}

/// Mutable job state. Only ever touched while holding the lock.
struct JobState {
    /// Bumped on every submission; runs from older epochs are ignored.
    epoch: u64,
    cancel: CancellationToken,
    started: Option<Instant>,
    snapshot: JobSnapshot,
}

struct Shared {
    state: Mutex<JobState>,
    events: broadcast::Sender<JobSnapshot>,
    /// Shared by every clone, so a callback set on one is seen by all.
    callback: RwLock<Option<JobUpdateCallback>>,
}

impl Shared {
    fn new() -> Self {
        let (events, _) = broadcast::channel(SNAPSHOT_BUFFER_SIZE);
        Self {
            state: Mutex::new(JobState {
                epoch: 0,
                cancel: CancellationToken::new(),
                started: None,
                snapshot: JobSnapshot::idle(),
            }),
            events,
            callback: RwLock::new(None),
        }
    }

    /// Must be called with the state lock held so subscribers see changes in order.
    fn publish(&self, snapshot: &JobSnapshot) {
        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(snapshot);
        }
        // Ignore send errors - they just mean no one is listening
        let _ = self.events.send(snapshot.clone());
    }
}

/// Everything a single run needs to report progress.
#[derive(Clone)]
struct RunContext {
    epoch: u64,
    job_id: Uuid,
    filename: String,
    started: Instant,
    token: CancellationToken,
    polls: Arc<AtomicU32>,
    shared: Arc<Shared>,
}

impl RunContext {
    /// Apply a change and publish it, unless this run was cancelled or superseded.
    async fn update<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut JobSnapshot),
    {
        let mut state = self.shared.state.lock().await;
        if state.epoch != self.epoch || self.token.is_cancelled() {
            debug!("Dropping update for stopped job {}", self.job_id);
            return false;
        }

        mutate(&mut state.snapshot);
        state.snapshot.poll_count = self.polls.load(Ordering::SeqCst);
        state.snapshot.updated_at = Utc::now();
        self.shared.publish(&state.snapshot);
        true
    }

    async fn fail(&self, error: JobError) {
        self.fail_with_logs(error, None).await;
    }

    async fn fail_with_logs(&self, error: JobError, log_lines: Option<Vec<String>>) {
        let kind = error.kind();
        let message = error.user_message();

        let applied = self
            .update(|s| {
                if let Some(lines) = log_lines {
                    s.log_lines = lines;
                }
                s.status = JobStatus::Failed;
                s.failure = Some(kind);
                s.error_message = message;
                s.progress_message = None;
            })
            .await;

        if applied {
            warn!("Job {} failed: {}", self.job_id, error);
            JOB_FAILURES.with_label_values(&[kind.as_str()]).inc();
            record_outcome("failed", self.started);
        }
    }

    async fn complete(&self, result: TranscriptResult) {
        let applied = self
            .update(|s| {
                s.result = Some(result);
                s.status = JobStatus::Complete;
                s.progress_message = None;
            })
            .await;

        if applied {
            info!("Job {} complete", self.job_id);
            record_outcome("complete", self.started);
        }
    }
}

/// Drives transcription jobs against a backend, one job at a time.
///
/// Cloning is cheap; clones share the same job.
#[derive(Clone)]
pub struct JobOrchestrator {
    backend: Arc<dyn TranscriptionBackend>,
    config: PollingConfig,
    shared: Arc<Shared>,
}

impl JobOrchestrator {
    /// Create a new orchestrator.
    pub fn new(backend: Arc<dyn TranscriptionBackend>, config: PollingConfig) -> Self {
        Self {
            backend,
            config,
            shared: Arc::new(Shared::new()),
        }
    }

    /// Set a callback invoked with every snapshot.
    pub fn with_update_callback(self, callback: JobUpdateCallback) -> Self {
        self.set_update_callback(callback);
        self
    }

    /// Replace the update callback. Applies to every clone and to
    /// snapshots published from now on; subscribers are unaffected.
    pub fn set_update_callback(&self, callback: JobUpdateCallback) {
        *self
            .shared
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    /// Subscribe to snapshots published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobSnapshot> {
        self.shared.events.subscribe()
    }

    /// Current snapshot of the job.
    pub async fn snapshot(&self) -> JobSnapshot {
        self.shared.state.lock().await.snapshot.clone()
    }

    /// Submit a video for processing.
    ///
    /// Stops any job already in flight, uploads the file, and on success
    /// starts polling in the background. Returns once the upload has
    /// finished; every outcome, including failures, is reported as state.
    pub async fn submit(
        &self,
        content: impl Into<Vec<u8>>,
        filename: impl Into<String>,
    ) -> JobHandle {
        let content = content.into();
        let filename = filename.into();
        let (ctx, handle) = self.begin(&filename).await;

        JOBS_SUBMITTED.inc();
        info!(
            "Submitting job {} for {:?} ({} bytes) via {} backend",
            ctx.job_id,
            filename,
            content.len(),
            self.backend.name()
        );

        if filename.is_empty() {
            ctx.fail(JobError::NoFilename).await;
            return handle;
        }
        if content.is_empty() {
            ctx.fail(JobError::EmptyPayload).await;
            return handle;
        }

        let upload = tokio::select! {
            biased;

            _ = ctx.token.cancelled() => {
                info!("Job {} cancelled during upload", ctx.job_id);
                return handle;
            }
            result = metered("upload", self.backend.upload(&filename, content)) => result,
        };

        match upload {
            Ok(ack) => {
                if ack.transcript.is_some() || ack.summary.is_some() {
                    debug!(
                        "Upload response for job {} carried an early result, waiting for the log anyway",
                        ctx.job_id
                    );
                }

                let polling = ctx
                    .update(|s| {
                        s.status = JobStatus::Polling;
                        s.progress_message = Some(PROCESSING_MESSAGE.to_string());
                    })
                    .await;

                if polling {
                    info!("Job {} uploaded, polling for progress", ctx.job_id);
                    tokio::spawn(poll_until_done(
                        ctx,
                        Arc::clone(&self.backend),
                        self.config.clone(),
                    ));
                }
            }
            Err(e) => ctx.fail(JobError::UploadFailed(e)).await,
        }

        handle
    }

    /// Stop the current job without further network calls.
    ///
    /// The status is left as it was and the snapshot is flagged as
    /// cancelled. Returns false (and changes nothing) when there is no
    /// running job.
    pub async fn cancel(&self) -> bool {
        let mut state = self.shared.state.lock().await;
        if state.snapshot.status == JobStatus::Idle || state.snapshot.is_finished() {
            debug!("No running job to cancel");
            return false;
        }

        state.cancel.cancel();
        state.snapshot.cancelled = true;
        state.snapshot.updated_at = Utc::now();
        self.shared.publish(&state.snapshot);

        info!(
            "Job {} cancelled while {}",
            state.snapshot.job_id, state.snapshot.status
        );
        if let Some(started) = state.started {
            record_outcome("cancelled", started);
        }
        true
    }

    /// Fetch transcript and summary for a processed file.
    pub async fn fetch_result(&self, filename: &str) -> Result<TranscriptResult, JobError> {
        fetch_transcript(self.backend.as_ref(), filename).await
    }

    /// Reset state for a new job, stopping the previous one.
    async fn begin(&self, filename: &str) -> (RunContext, JobHandle) {
        let mut state = self.shared.state.lock().await;

        let previous = &state.snapshot;
        if previous.status != JobStatus::Idle && !previous.is_finished() {
            info!("Stopping job {} to start a new one", previous.job_id);
            if let Some(started) = state.started {
                record_outcome("cancelled", started);
            }
        }
        state.cancel.cancel();

        let started = Instant::now();
        let now = Utc::now();
        state.epoch += 1;
        state.cancel = CancellationToken::new();
        state.started = Some(started);
        state.snapshot = JobSnapshot {
            job_id: Uuid::new_v4(),
            filename: filename.to_string(),
            status: JobStatus::Uploading,
            progress_message: Some(UPLOADING_MESSAGE.to_string()),
            started_at: Some(now),
            updated_at: now,
            ..JobSnapshot::idle()
        };
        self.shared.publish(&state.snapshot);

        // Subscribed under the lock, so the handle misses nothing after this snapshot
        let handle = JobHandle::new(state.snapshot.clone(), self.shared.events.subscribe());
        let ctx = RunContext {
            epoch: state.epoch,
            job_id: state.snapshot.job_id,
            filename: filename.to_string(),
            started,
            token: state.cancel.clone(),
            polls: Arc::new(AtomicU32::new(0)),
            shared: Arc::clone(&self.shared),
        };

        (ctx, handle)
    }
}

/// Poll the status endpoint until the job reaches a terminal state or is stopped.
async fn poll_until_done(
    ctx: RunContext,
    backend: Arc<dyn TranscriptionBackend>,
    config: PollingConfig,
) {
    let polling_since = Instant::now();

    loop {
        if ctx.token.is_cancelled() {
            debug!("Poll loop for job {} stopped", ctx.job_id);
            return;
        }

        let attempts = ctx.polls.load(Ordering::SeqCst);
        let out_of_attempts = config.max_attempts.is_some_and(|max| attempts >= max);
        let out_of_time = config
            .max_duration()
            .is_some_and(|max| polling_since.elapsed() >= max);
        if out_of_attempts || out_of_time {
            ctx.fail(JobError::PollTimedOut { attempts }).await;
            return;
        }

        ctx.polls.fetch_add(1, Ordering::SeqCst);
        let report = tokio::select! {
            biased;

            _ = ctx.token.cancelled() => {
                debug!("Poll loop for job {} stopped mid-request", ctx.job_id);
                return;
            }
            report = metered("current_step", backend.current_step()) => report,
        };

        match report {
            Err(e) => {
                POLL_REQUESTS.with_label_values(&["error"]).inc();
                ctx.fail(JobError::PollFailed(e)).await;
                return;
            }
            Ok(StepReport::NoLogs) => {
                POLL_REQUESTS.with_label_values(&["no_logs"]).inc();
                let kept = ctx
                    .update(|s| s.progress_message = Some(NO_LOGS_MESSAGE.to_string()))
                    .await;
                if !kept {
                    return;
                }
            }
            Ok(StepReport::Logs(lines)) => {
                POLL_REQUESTS.with_label_values(&["logs"]).inc();
                let verdict = classify_logs(&lines);
                debug!(
                    "Job {} poll returned {} log lines ({:?})",
                    ctx.job_id,
                    lines.len(),
                    verdict
                );

                match verdict {
                    LogVerdict::Pending => {
                        let kept = ctx
                            .update(|s| {
                                s.log_lines = lines;
                                s.progress_message = Some(PROCESSING_MESSAGE.to_string());
                            })
                            .await;
                        if !kept {
                            return;
                        }
                    }
                    LogVerdict::Errored => {
                        ctx.fail_with_logs(JobError::RemoteProcessingError, Some(lines))
                            .await;
                        return;
                    }
                    LogVerdict::Succeeded => {
                        let kept = ctx
                            .update(|s| {
                                s.log_lines = lines;
                                s.progress_message = Some(COMPLETE_MESSAGE.to_string());
                            })
                            .await;
                        if !kept {
                            return;
                        }

                        info!("Job {} processed, fetching result", ctx.job_id);
                        let fetched = tokio::select! {
                            biased;

                            _ = ctx.token.cancelled() => return,
                            fetched = fetch_transcript(backend.as_ref(), &ctx.filename) => fetched,
                        };
                        match fetched {
                            Ok(result) => ctx.complete(result).await,
                            Err(e) => ctx.fail(e).await,
                        }
                        return;
                    }
                }
            }
        }

        tokio::select! {
            biased;

            _ = ctx.token.cancelled() => {
                debug!("Poll loop for job {} stopped while waiting", ctx.job_id);
                return;
            }
            _ = tokio::time::sleep(config.interval()) => {}
        }
    }
}
