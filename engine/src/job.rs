use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};

use crate::accumulator::Segment;
use crate::error::SegmentationError;
use crate::sampler::FrameSampler;
use crate::segmenter::{CancelToken, Segmenter};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Queued,
    Running,
    Finished(Vec<Segment>),
    Failed(String),
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished(_) | JobStatus::Failed(_) | JobStatus::Cancelled
        )
    }
}

/// Runs segmentations in the background and reports their progress.
///
/// Each submitted run gets its own blocking worker; a semaphore caps how
/// many sample at once. Status travels over a `watch` channel so callers
/// can poll it or wait for the terminal state.
pub struct JobRunner {
    permits: Arc<Semaphore>,
}

impl JobRunner {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Queue a run. Must be called from within a tokio runtime.
    pub fn submit<S>(&self, label: impl Into<String>, mut segmenter: Segmenter<S>) -> JobHandle
    where
        S: FrameSampler + 'static,
    {
        let id = NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed);
        let label = label.into();
        let (status_tx, status_rx) = watch::channel(JobStatus::Queued);
        let cancel = CancelToken::new();

        let permits = self.permits.clone();
        let token = cancel.clone();
        let job_label = label.clone();
        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    status_tx.send_replace(JobStatus::Failed("job runner closed".into()));
                    return;
                }
            };
            if token.is_cancelled() {
                info!(job_id = id, label = %job_label, "job cancelled before start");
                status_tx.send_replace(JobStatus::Cancelled);
                return;
            }

            status_tx.send_replace(JobStatus::Running);
            info!(job_id = id, label = %job_label, "job started");

            let result =
                tokio::task::spawn_blocking(move || segmenter.run_with_cancel(&token)).await;

            let status = match result {
                Ok(Ok(segments)) => {
                    info!(job_id = id, label = %job_label, segments = segments.len(), "job finished");
                    JobStatus::Finished(segments)
                }
                Ok(Err(SegmentationError::Cancelled { t })) => {
                    warn!(job_id = id, label = %job_label, t, "job cancelled");
                    JobStatus::Cancelled
                }
                Ok(Err(e)) => {
                    error!(job_id = id, label = %job_label, error = %e, "job failed");
                    JobStatus::Failed(e.to_string())
                }
                Err(e) => {
                    error!(job_id = id, label = %job_label, error = %e, "job worker panicked");
                    JobStatus::Failed(format!("worker panicked: {e}"))
                }
            };
            status_tx.send_replace(status);
        });

        JobHandle {
            id,
            label,
            status: status_rx,
            cancel,
        }
    }
}

pub struct JobHandle {
    id: u64,
    label: String,
    status: watch::Receiver<JobStatus>,
    cancel: CancelToken,
}

impl JobHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// Ask the run to stop. Takes effect before the next sample.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Resolve once the job reaches a terminal status.
    pub async fn wait(&mut self) -> JobStatus {
        if let Ok(status) = self.status.wait_for(JobStatus::is_terminal).await {
            return (*status).clone();
        }
        // The job task went away without a verdict.
        let last = self.status();
        if last.is_terminal() {
            last
        } else {
            JobStatus::Failed("job ended without reporting a result".into())
        }
    }
}
