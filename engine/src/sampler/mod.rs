pub mod cache;
pub mod ffmpeg;
pub mod sequence;

use std::time::Duration;

use vsegment_common::frame::{Frame, FrameError};

pub use cache::CachingSampler;
pub use ffmpeg::{check_ffmpeg_available, probe_duration, FfmpegSampler};
pub use sequence::ImageSequenceSampler;

/// Seek-and-grab interface over a decoded video track.
///
/// Every sampler positions its source at a whole second and decodes exactly
/// one frame. Calls may go backwards in time: the scanner rewinds after an
/// overshooting coarse jump, so no sampler may assume monotonic offsets.
pub trait FrameSampler: Send {
    /// Position the source at second `t` and decode one frame.
    fn sample(&mut self, t: u32) -> Result<Frame, SampleError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

impl<S: FrameSampler + ?Sized> FrameSampler for Box<S> {
    fn sample(&mut self, t: u32) -> Result<Frame, SampleError> {
        (**self).sample(t)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("offset {t}s is outside the track (duration {duration}s)")]
    OutOfRange { t: u32, duration: u32 },
    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },
    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),
    #[error("failed to probe duration: {0}")]
    Probe(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Decode(#[from] FrameError),
    #[error("no frame within {0:?}")]
    Timeout(Duration),
}
