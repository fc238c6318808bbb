use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::capture::domain::video_device::{DeviceFormat, VideoDevice};
use crate::orientation::domain::device_orientation::CameraPosition;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::sample_buffer::{CameraIntrinsics, SampleBuffer};

/// Replays a directory of still images as a camera.
///
/// Files are played in file-name order. With a frame rate set, samples are
/// paced in real time; at 0 fps they are produced as fast as they decode.
/// An image that fails to decode becomes a sample without an image.
pub struct ImageSequenceDevice {
    dir: PathBuf,
    fps: f64,
    looping: bool,
    position: CameraPosition,
    intrinsics: Option<CameraIntrinsics>,
    paths: Vec<PathBuf>,
}

impl ImageSequenceDevice {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fps: 0.0,
            looping: false,
            position: CameraPosition::Back,
            intrinsics: None,
            paths: Vec::new(),
        }
    }

    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.fps = fps.max(0.0);
        self
    }

    /// Restart from the first image after the last one.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_position(mut self, position: CameraPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_camera_intrinsics(mut self, intrinsics: Option<CameraIntrinsics>) -> Self {
        self.intrinsics = intrinsics;
        self
    }

    /// `None` replays unpaced, including rates too slow to represent.
    fn frame_interval(&self) -> Option<Duration> {
        if self.fps <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(1.0 / self.fps).ok()
    }
}

impl VideoDevice for ImageSequenceDevice {
    fn open(&mut self) -> Result<DeviceFormat, Box<dyn std::error::Error>> {
        let paths = list_images(&self.dir)?;
        let first = paths
            .first()
            .ok_or_else(|| format!("no images found in {}", self.dir.display()))?;
        let (width, height) = image::image_dimensions(first)?;

        log::debug!(
            "Image sequence {}: {} images, {width}x{height}",
            self.dir.display(),
            paths.len()
        );
        self.paths = paths;
        Ok(DeviceFormat {
            width,
            height,
            fps: self.fps,
            name: self.dir.display().to_string(),
        })
    }

    fn samples(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<SampleBuffer, Box<dyn std::error::Error>>> + '_> {
        if self.paths.is_empty() {
            return Box::new(std::iter::once(Err("ImageSequenceDevice: not opened".into())));
        }

        let interval = self.frame_interval();
        let intrinsics = self.intrinsics;
        let paths: Box<dyn Iterator<Item = &PathBuf> + '_> = if self.looping {
            Box::new(self.paths.iter().cycle())
        } else {
            Box::new(self.paths.iter())
        };
        let started = Instant::now();

        Box::new(paths.enumerate().map(move |(index, path)| {
            let timestamp = interval.map_or(Duration::ZERO, |i| i * index as u32);
            if interval.is_some() {
                // Hold each sample until its presentation time.
                if let Some(wait) = timestamp.checked_sub(started.elapsed()) {
                    std::thread::sleep(wait);
                }
            }
            let sample = match decode_rgb(path, index) {
                Ok(frame) => SampleBuffer::new(frame, timestamp),
                Err(e) => {
                    log::warn!("Could not decode {}: {e}", path.display());
                    SampleBuffer::without_image(timestamp)
                }
            };
            Ok(sample.with_camera_intrinsics(intrinsics))
        }))
    }

    fn close(&mut self) {
        self.paths.clear();
    }

    fn position(&self) -> CameraPosition {
        self.position
    }
}

fn decode_rgb(path: &Path, index: usize) -> Result<Frame, image::ImageError> {
    let rgb = image::open(path)?.to_rgb8();
    Ok(Frame::from_rgb_image(rgb, index))
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    paths.sort();
    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
