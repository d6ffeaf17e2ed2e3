//! Caller-side handle for a submitted job.

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use uuid::Uuid;

use super::types::JobSnapshot;

/// Read-only view of one submitted job.
///
/// Receives the snapshots published after submission. Once the job is
/// finished (terminal or cancelled) or replaced by a newer submission, the
/// handle stops yielding updates.
#[derive(Debug)]
pub struct JobHandle {
    job_id: Uuid,
    updates: broadcast::Receiver<JobSnapshot>,
    last: JobSnapshot,
    superseded: bool,
}

impl JobHandle {
    pub(crate) fn new(initial: JobSnapshot, updates: broadcast::Receiver<JobSnapshot>) -> Self {
        Self {
            job_id: initial.job_id,
            updates,
            last: initial,
            superseded: false,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Most recent snapshot seen by this handle.
    pub fn last_snapshot(&self) -> &JobSnapshot {
        &self.last
    }

    /// Whether a newer submission replaced this job.
    pub fn is_superseded(&self) -> bool {
        self.superseded
    }

    /// Wait for the next snapshot of this job.
    ///
    /// Returns `None` once the job has finished, was superseded, or the
    /// orchestrator is gone.
    pub async fn next_update(&mut self) -> Option<JobSnapshot> {
        if self.last.is_finished() || self.superseded {
            return None;
        }

        loop {
            match self.updates.recv().await {
                Ok(snapshot) if snapshot.job_id == self.job_id => {
                    self.last = snapshot.clone();
                    return Some(snapshot);
                }
                Ok(_) => {
                    self.superseded = true;
                    return None;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Job {} handle lagged, skipped {} snapshots",
                        self.job_id, skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Wait until the job stops and return its last snapshot.
    pub async fn wait(mut self) -> JobSnapshot {
        while self.next_update().await.is_some() {}
        self.last
    }
}
