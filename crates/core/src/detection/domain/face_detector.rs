use thiserror::Error;

use crate::detection::domain::face_observation::FaceObservation;
use crate::detection::domain::image_request::ImageOptions;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("malformed image buffer: {width}x{height}x{channels} needs {expected} bytes, got {actual}")]
    MalformedBuffer {
        width: u32,
        height: u32,
        channels: u8,
        expected: usize,
        actual: usize,
    },
    #[error("unsupported pixel format: {channels} channels")]
    UnsupportedPixelFormat { channels: u8 },
    #[error("face detector failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DetectionError {
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        DetectionError::Backend(err.into())
    }
}

/// The face-detection capability.
///
/// Receives an upright frame and returns observations in normalized
/// coordinates of that frame. Implementations may keep state between
/// frames, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        options: &ImageOptions,
    ) -> Result<Vec<FaceObservation>, DetectionError>;
}
