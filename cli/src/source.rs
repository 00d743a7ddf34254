use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;
use vsegment_common::config::SourceConfig;
use vsegment_engine::sampler::{
    probe_duration, CachingSampler, FfmpegSampler, ImageSequenceSampler,
};
use vsegment_engine::{FrameSampler, SampleError};

/// A track ready to be segmented.
pub struct Track {
    pub path: PathBuf,
    pub duration: u32,
    pub sampler: Box<dyn FrameSampler>,
}

/// Open `path` as a track. A directory is read as a one-image-per-second
/// sequence; anything else is seeked with ffmpeg after probing its length.
/// Every ffmpeg and ffprobe call is bounded by `sample_timeout_secs`.
pub async fn open_track(path: &Path, config: &SourceConfig) -> Result<Track, SampleError> {
    let timeout =
        (config.sample_timeout_secs > 0).then(|| Duration::from_secs(config.sample_timeout_secs));

    let (sampler, duration): (Box<dyn FrameSampler>, u32) = if path.is_dir() {
        let sequence = ImageSequenceSampler::open(path)?;
        let duration = sequence.duration();
        (Box::new(sequence), duration)
    } else {
        let duration = probe_duration(&config.ffprobe_path, path, timeout).await?;
        (
            Box::new(FfmpegSampler::new(&config.ffmpeg_path, path, duration, timeout)),
            duration,
        )
    };

    let sampler: Box<dyn FrameSampler> = match NonZeroUsize::new(config.cache_frames) {
        Some(capacity) => Box::new(CachingSampler::new(sampler, capacity)),
        None => sampler,
    };

    info!(
        path = path.display().to_string(),
        duration,
        sampler = sampler.name(),
        cache_frames = config.cache_frames,
        timeout = ?timeout,
        "track opened"
    );

    Ok(Track {
        path: path.to_path_buf(),
        duration,
        sampler,
    })
}
