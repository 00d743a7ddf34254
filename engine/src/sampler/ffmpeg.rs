use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};
use vsegment_common::frame::Frame;

use super::{FrameSampler, SampleError};

/// Grabs single frames from a media file by seeking with an `ffmpeg`
/// subprocess per sample.
///
/// Every call spawns ffmpeg with an input seek (`-ss` before `-i`), asks for
/// one video frame and reads it back as PNG from stdout. This keeps the
/// sampler stateless, so rewinds cost the same as forward jumps.
///
/// With a timeout set, an ffmpeg that has not exited in time is killed and
/// reaped before the sample fails with `SampleError::Timeout`.
pub struct FfmpegSampler {
    ffmpeg_path: String,
    source: PathBuf,
    duration: u32,
    timeout: Option<Duration>,
    label: String,
}

impl FfmpegSampler {
    pub fn new(ffmpeg_path: &str, source: &Path, duration: u32, timeout: Option<Duration>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.to_string(),
            source: source.to_path_buf(),
            duration,
            timeout,
            label: format!("ffmpeg:{}", source.display()),
        }
    }

    async fn grab(&self, t: u32) -> Result<Vec<u8>, SampleError> {
        let seek = t.to_string();

        let mut child = Command::new(&self.ffmpeg_path)
            .args(["-v", "error", "-ss", &seek, "-i"])
            .arg(&self.source)
            .args([
                "-frames:v", "1",
                "-an",
                "-f", "image2pipe",
                "-c:v", "png",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SampleError::Spawn {
                program: self.ffmpeg_path.clone(),
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let collect = async { tokio::try_join!(read_pipe(stdout), read_pipe(stderr), child.wait()) };

        let result = match self.timeout {
            Some(limit) => {
                let outcome = tokio::time::timeout(limit, collect).await;
                match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        error!(t, timeout = ?limit, sampler = %self.label, "ffmpeg timed out, killing it");
                        if let Err(e) = child.kill().await {
                            warn!(error = %e, sampler = %self.label, "failed to kill ffmpeg");
                        }
                        return Err(SampleError::Timeout(limit));
                    }
                }
            }
            None => collect.await,
        };
        let (stdout, stderr, status) = result?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            error!(t, stderr = %stderr, "ffmpeg exited with error");
            return Err(SampleError::Ffmpeg(stderr.trim().to_string()));
        }
        if stdout.is_empty() {
            return Err(SampleError::Ffmpeg(format!("no frame decoded at {t}s")));
        }

        Ok(stdout)
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Drive `fut` to completion from synchronous sampler code.
///
/// Jobs sample on tokio's blocking pool, where the ambient runtime is
/// reused. Without one a current-thread runtime is built for the call.
/// Must not be called from inside an async task.
fn block_on<F: Future>(fut: F) -> Result<F::Output, SampleError> {
    match Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(fut)),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            Ok(runtime.block_on(fut))
        }
    }
}

impl FrameSampler for FfmpegSampler {
    fn sample(&mut self, t: u32) -> Result<Frame, SampleError> {
        if t >= self.duration {
            return Err(SampleError::OutOfRange {
                t,
                duration: self.duration,
            });
        }

        let png = block_on(self.grab(t))??;
        let frame = Frame::decode(&png)?;
        debug!(
            t,
            bytes = png.len(),
            width = frame.width(),
            height = frame.height(),
            "grabbed frame"
        );
        Ok(frame)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Ask ffprobe for the container duration, floored to whole seconds.
pub async fn probe_duration(
    ffprobe_path: &str,
    source: &Path,
    timeout: Option<Duration>,
) -> Result<u32, SampleError> {
    let lookup = Command::new(ffprobe_path)
        .args([
            "-v", "error",
            "-show_entries", "format=duration",
            "-of", "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(source)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, lookup)
            .await
            .map_err(|_| SampleError::Timeout(limit))?,
        None => lookup.await,
    }
    .map_err(|e| SampleError::Spawn {
        program: ffprobe_path.to_string(),
        reason: e.to_string(),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SampleError::Probe(stderr.trim().to_string()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let secs = parse_duration_secs(&stdout).ok_or_else(|| {
        SampleError::Probe(format!(
            "unknown duration for {}: {:?}",
            source.display(),
            stdout.trim()
        ))
    })?;
    debug!(source = source.display().to_string(), secs, "probed duration");
    Ok(secs)
}

/// Parse ffprobe's duration line ("123.456000") into whole seconds.
fn parse_duration_secs(raw: &str) -> Option<u32> {
    let secs: f64 = raw.lines().next()?.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 || secs > u32::MAX as f64 {
        return None;
    }
    Some(secs.floor() as u32)
}

/// Check whether ffmpeg is available. Logs a warning if not found.
pub async fn check_ffmpeg_available(ffmpeg_path: &str) -> bool {
    match Command::new(ffmpeg_path).arg("-version").output().await {
        Ok(out) if out.status.success() => {
            debug!(ffmpeg_path, "ffmpeg is available");
            true
        }
        Ok(_) => {
            warn!(ffmpeg_path, "ffmpeg returned non-zero for -version; sampling may fail");
            false
        }
        Err(e) => {
            warn!(
                error = %e,
                ffmpeg_path,
                "ffmpeg not found; only image-sequence tracks can be segmented"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler(ffmpeg: &str, timeout: Option<Duration>) -> FfmpegSampler {
        FfmpegSampler::new(ffmpeg, Path::new("/nonexistent/track.mjpeg"), 10, timeout)
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[test]
    fn parse_whole_and_fractional_durations() {
        assert_eq!(parse_duration_secs("20.000000\n"), Some(20));
        assert_eq!(parse_duration_secs("19.960000"), Some(19));
        assert_eq!(parse_duration_secs("0.4"), Some(0));
    }

    #[test]
    fn parse_unknown_duration() {
        assert_eq!(parse_duration_secs("N/A\n"), None);
        assert_eq!(parse_duration_secs(""), None);
        assert_eq!(parse_duration_secs("-3.0"), None);
    }

    #[test]
    fn out_of_range_never_spawns() {
        let err = sampler("/nonexistent/ffmpeg", None).sample(10).unwrap_err();
        assert!(matches!(err, SampleError::OutOfRange { t: 10, duration: 10 }));
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let err = sampler("/nonexistent/ffmpeg", None).sample(3).unwrap_err();
        assert!(matches!(err, SampleError::Spawn { .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_reported_unavailable() {
        assert!(!check_ffmpeg_available("/nonexistent/ffmpeg").await);
        let err = probe_duration("/nonexistent/ffprobe", Path::new("a.mp4"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SampleError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn frame_read_from_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("frame.png");
        image::RgbImage::from_pixel(3, 2, image::Rgb([9, 8, 7]))
            .save(&png)
            .unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), &format!("cat '{}'", png.display()));

        let frame = sampler(&ffmpeg, Some(Duration::from_secs(10))).sample(4).unwrap();
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.pixel(2, 1), Some([9, 8, 7]));
    }

    #[cfg(unix)]
    #[test]
    fn failing_ffmpeg_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "echo 'seek failed' >&2; exit 1");

        match sampler(&ffmpeg, None).sample(2) {
            Err(SampleError::Ffmpeg(msg)) => assert_eq!(msg, "seek failed"),
            other => panic!("expected ffmpeg error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn hung_ffmpeg_is_killed_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let ffmpeg = fake_ffmpeg(
            dir.path(),
            &format!("echo $$ > '{}'; exec sleep 30", pid_file.display()),
        );

        let started = std::time::Instant::now();
        let err = sampler(&ffmpeg, Some(Duration::from_millis(300)))
            .sample(1)
            .unwrap_err();
        assert!(matches!(err, SampleError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let proc_entry = PathBuf::from(format!("/proc/{}", pid.trim()));
        assert!(!proc_entry.exists(), "ffmpeg {} still running", pid.trim());
    }
}
