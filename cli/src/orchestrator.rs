use std::path::{Path, PathBuf};

use tracing::{error, info, warn};
use vsegment_common::config::Config;
use vsegment_engine::{CancelToken, JobHandle, JobRunner, JobStatus, Segmenter};

use crate::catalog::CatalogWriter;
use crate::source;

/// A submitted track and the job segmenting it.
pub struct TrackJob {
    pub path: PathBuf,
    pub duration: u32,
    pub handle: JobHandle,
}

#[derive(Debug, Default)]
pub struct Report {
    pub written: Vec<PathBuf>,
    pub failed: usize,
    pub cancelled: usize,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

pub struct Orchestrator<W> {
    config: Config,
    runner: JobRunner,
    writer: W,
}

impl<W: CatalogWriter> Orchestrator<W> {
    pub fn new(config: Config, writer: W) -> Self {
        let runner = JobRunner::new(config.jobs.max_concurrent);
        Self {
            config,
            runner,
            writer,
        }
    }

    /// Open every track and queue a job for it. Tracks that cannot be opened
    /// are counted as failures in `report`.
    pub async fn submit_all(&self, tracks: &[PathBuf], report: &mut Report) -> Vec<TrackJob> {
        let mut jobs = Vec::with_capacity(tracks.len());
        for path in tracks {
            match self.submit(path).await {
                Some(job) => jobs.push(job),
                None => report.failed += 1,
            }
        }
        jobs
    }

    async fn submit(&self, path: &Path) -> Option<TrackJob> {
        let track = match source::open_track(path, &self.config.source).await {
            Ok(track) => track,
            Err(e) => {
                error!(path = path.display().to_string(), error = %e, "failed to open track");
                return None;
            }
        };

        let segmenter = match Segmenter::new(track.sampler, track.duration, &self.config.segmenter)
        {
            Ok(segmenter) => segmenter,
            Err(e) => {
                error!(path = path.display().to_string(), error = %e, "cannot segment track");
                return None;
            }
        };

        let handle = self.runner.submit(path.display().to_string(), segmenter);
        info!(
            job_id = handle.id(),
            path = path.display().to_string(),
            duration = track.duration,
            "track queued"
        );
        Some(TrackJob {
            path: track.path,
            duration: track.duration,
            handle,
        })
    }

    /// Wait for every job and write a catalog for each finished one.
    pub async fn collect(&self, jobs: Vec<TrackJob>, report: &mut Report) {
        for mut job in jobs {
            match job.handle.wait().await {
                JobStatus::Finished(segments) => {
                    match self.writer.write(&job.path, job.duration, &segments) {
                        Ok(path) => report.written.push(path),
                        Err(e) => {
                            error!(
                                path = job.path.display().to_string(),
                                error = %e,
                                "failed to write catalog"
                            );
                            report.failed += 1;
                        }
                    }
                }
                JobStatus::Cancelled => {
                    warn!(job_id = job.handle.id(), label = job.handle.label(), "track cancelled");
                    report.cancelled += 1;
                }
                JobStatus::Failed(msg) => {
                    error!(
                        job_id = job.handle.id(),
                        label = job.handle.label(),
                        error = %msg,
                        "track failed"
                    );
                    report.failed += 1;
                }
                JobStatus::Queued | JobStatus::Running => {
                    report.failed += 1;
                }
            }
        }
    }
}

/// Cancel every job once Ctrl-C arrives.
pub fn cancel_on_interrupt(jobs: &[TrackJob]) {
    let tokens: Vec<CancelToken> = jobs.iter().map(|job| job.handle.cancel_token()).collect();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(jobs = tokens.len(), "interrupted, cancelling all jobs");
            for token in &tokens {
                token.cancel();
            }
        }
    });
}
