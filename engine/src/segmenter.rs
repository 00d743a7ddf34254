use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use vsegment_common::config::SegmenterConfig;

use crate::accumulator::{Segment, SegmentAccumulator};
use crate::compare::FrameComparator;
use crate::error::SegmentationError;
use crate::machine::{RunState, SegmentationMachine};
use crate::sampler::FrameSampler;

/// Shared flag asking a run to stop. Checked before every sample.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters from the most recent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub samples: u64,
    pub rewinds: u64,
    pub segments: usize,
}

/// Segments one track: owns the sampler and drives the state machine from
/// the first sample to the end of the track.
pub struct Segmenter<S> {
    sampler: S,
    duration: u32,
    machine: SegmentationMachine,
    stats: RunStats,
}

impl<S: FrameSampler> Segmenter<S> {
    /// Validates the configuration and duration before anything is sampled.
    pub fn new(
        sampler: S,
        duration: u32,
        config: &SegmenterConfig,
    ) -> Result<Self, SegmentationError> {
        config.validate()?;
        if duration < 1 {
            return Err(SegmentationError::Configuration(
                "track duration must be at least 1s".into(),
            ));
        }

        let comparator = FrameComparator::new(config.change_threshold, config.pixel_tolerance);
        Ok(Self {
            sampler,
            duration,
            machine: SegmentationMachine::new(comparator, config.stability_window_secs),
            stats: RunStats::default(),
        })
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn run(&mut self) -> Result<Vec<Segment>, SegmentationError> {
        self.run_with_cancel(&CancelToken::new())
    }

    /// Run to completion unless `cancel` is raised. A cancelled or failed
    /// run returns no segments at all.
    pub fn run_with_cancel(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<Vec<Segment>, SegmentationError> {
        let name = self.sampler.name().to_string();
        let mut state = RunState::initial();
        let mut accumulator = SegmentAccumulator::new(self.duration);
        self.stats = RunStats::default();

        info!(
            sampler = %name,
            duration = self.duration,
            window = self.machine.window(),
            threshold = self.machine.comparator().change_threshold(),
            "segmentation started"
        );

        while state.t < self.duration {
            let t = state.t;
            if cancel.is_cancelled() {
                warn!(sampler = %name, t, "segmentation cancelled");
                return Err(SegmentationError::Cancelled { t });
            }

            let frame = self.sampler.sample(t).map_err(|source| {
                error!(sampler = %name, t, error = %source, "frame unavailable, aborting run");
                SegmentationError::FrameUnavailable {
                    t,
                    change_threshold: self.machine.comparator().change_threshold(),
                    stability_window: self.machine.window(),
                    source,
                }
            })?;
            self.stats.samples += 1;

            let (next, event) = self.machine.step(state, frame);
            if next.t < t {
                self.stats.rewinds += 1;
            }
            if let Some(event) = event {
                accumulator.record(event);
            }
            state = next;
        }

        debug!(
            start = state.start_of_segment,
            index = state.segment_index,
            "closing final segment"
        );
        let segments = accumulator.finish(state.start_of_segment, state.segment_index)?;
        self.stats.segments = segments.len();

        info!(
            sampler = %name,
            segments = self.stats.segments,
            samples = self.stats.samples,
            rewinds = self.stats.rewinds,
            "segmentation finished"
        );
        Ok(segments)
    }
}
