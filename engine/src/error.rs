use vsegment_common::config::ConfigError;

use crate::sampler::SampleError;

/// Why a segmentation run produced no segment list.
///
/// None of these are retried inside the engine. A caller that wants another
/// attempt re-runs the whole track.
#[derive(Debug, thiserror::Error)]
pub enum SegmentationError {
    /// Rejected before the first sample was taken.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(
        "frame unavailable at {t}s (change_threshold={change_threshold}, \
         stability_window={stability_window}s): {source}"
    )]
    FrameUnavailable {
        t: u32,
        change_threshold: f64,
        stability_window: u32,
        #[source]
        source: SampleError,
    },

    /// The produced list broke a coverage or ordering rule. Always a defect.
    #[error("segment invariant violated: {0}")]
    InvariantViolation(String),

    #[error("run cancelled at {t}s")]
    Cancelled { t: u32 },
}

impl From<ConfigError> for SegmentationError {
    fn from(e: ConfigError) -> Self {
        SegmentationError::Configuration(e.to_string())
    }
}
