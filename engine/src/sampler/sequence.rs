use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vsegment_common::frame::Frame;

use super::{FrameSampler, SampleError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Reads a directory of still images holding one frame per second, as
/// produced by `ffmpeg -i <track> -r 1 <dir>/frame_%05d.png`.
///
/// Files are ordered by name; second `t` is the `t`-th file. The track
/// duration is the number of images.
pub struct ImageSequenceSampler {
    files: Vec<PathBuf>,
    label: String,
}

impl ImageSequenceSampler {
    pub fn open(dir: &Path) -> Result<Self, SampleError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                files.push(path);
            }
        }
        files.sort();

        info!(
            dir = dir.display().to_string(),
            frames = files.len(),
            "opened image sequence"
        );

        Ok(Self {
            files,
            label: format!("sequence:{}", dir.display()),
        })
    }

    /// Track length in seconds (one image per second).
    pub fn duration(&self) -> u32 {
        u32::try_from(self.files.len()).unwrap_or(u32::MAX)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSampler for ImageSequenceSampler {
    fn sample(&mut self, t: u32) -> Result<Frame, SampleError> {
        let path = self
            .files
            .get(t as usize)
            .ok_or(SampleError::OutOfRange {
                t,
                duration: self.duration(),
            })?;

        let data = std::fs::read(path)?;
        let frame = Frame::decode(&data)?;
        debug!(t, path = path.display().to_string(), "read frame");
        Ok(frame)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_frame(dir: &Path, name: &str, rgb: [u8; 3]) {
        RgbImage::from_pixel(8, 6, Rgb(rgb))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn frames_ordered_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "frame_00002.png", [0, 255, 0]);
        write_frame(dir.path(), "frame_00001.png", [255, 0, 0]);
        write_frame(dir.path(), "frame_00003.png", [0, 0, 255]);
        std::fs::write(dir.path().join("notes.txt"), b"not a frame").unwrap();

        let mut sampler = ImageSequenceSampler::open(dir.path()).unwrap();
        assert_eq!(sampler.duration(), 3);
        assert_eq!(sampler.sample(0).unwrap().pixel(0, 0), Some([255, 0, 0]));
        assert_eq!(sampler.sample(2).unwrap().pixel(0, 0), Some([0, 0, 255]));
        // rewinding re-reads the file
        assert_eq!(sampler.sample(1).unwrap().pixel(0, 0), Some([0, 255, 0]));
        assert_eq!(sampler.sample(0).unwrap().pixel(0, 0), Some([255, 0, 0]));
    }

    #[test]
    fn past_the_end_is_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "frame_00001.png", [1, 2, 3]);

        let mut sampler = ImageSequenceSampler::open(dir.path()).unwrap();
        let err = sampler.sample(1).unwrap_err();
        assert!(matches!(err, SampleError::OutOfRange { t: 1, duration: 1 }));
    }

    #[test]
    fn corrupt_image_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("frame_00001.png"), b"garbage").unwrap();

        let mut sampler = ImageSequenceSampler::open(dir.path()).unwrap();
        assert!(matches!(sampler.sample(0), Err(SampleError::Decode(_))));
    }

    #[test]
    fn missing_directory() {
        let result = ImageSequenceSampler::open(Path::new("/nonexistent/frames"));
        assert!(matches!(result, Err(SampleError::Io(_))));
    }
}
