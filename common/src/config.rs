use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parameters of the scanning state machine and the frame comparator.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmenterConfig {
    /// Largest fraction of changed pixels for which two frames still count
    /// as the same. Must lie in (0, 1].
    #[serde(default = "default_change_threshold")]
    pub change_threshold: f64,
    /// Consecutive identical samples needed before a scene is stable.
    #[serde(default = "default_stability_window")]
    pub stability_window_secs: u32,
    /// A pixel is changed when any channel moves by more than this.
    #[serde(default = "default_pixel_tolerance")]
    pub pixel_tolerance: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
    /// Upper bound for a single seek+decode. 0 disables the bound.
    #[serde(default = "default_sample_timeout")]
    pub sample_timeout_secs: u64,
    /// Decoded frames kept around to make rewinds cheap. 0 disables caching.
    #[serde(default = "default_cache_frames")]
    pub cache_frames: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            change_threshold: default_change_threshold(),
            stability_window_secs: default_stability_window(),
            pixel_tolerance: default_pixel_tolerance(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            sample_timeout_secs: default_sample_timeout(),
            cache_frames: default_cache_frames(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        debug!(path = path.display().to_string(), "config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.segmenter.validate()?;
        if self.jobs.max_concurrent < 1 {
            return Err(ConfigError::Invalid(
                "jobs.max_concurrent must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl SegmenterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // NaN fails both comparisons and is rejected here too.
        if !(self.change_threshold > 0.0 && self.change_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "change_threshold must lie in (0, 1], got {}",
                self.change_threshold
            )));
        }
        if self.stability_window_secs < 1 {
            return Err(ConfigError::Invalid(
                "stability_window_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_change_threshold() -> f64 {
    0.75
}
fn default_stability_window() -> u32 {
    5
}
fn default_pixel_tolerance() -> u8 {
    0
}
fn default_ffmpeg_path() -> String {
    "ffmpeg".into()
}
fn default_ffprobe_path() -> String {
    "ffprobe".into()
}
fn default_sample_timeout() -> u64 {
    30
}
fn default_cache_frames() -> usize {
    16
}
fn default_max_concurrent() -> usize {
    2
}
fn default_output_dir() -> String {
    "segments".into()
}
fn default_log_level() -> String {
    "info".into()
}
