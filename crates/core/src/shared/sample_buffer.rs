use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::frame::Frame;

/// Pinhole camera intrinsics as a row-major 3×3 matrix:
///
/// ```text
/// | fx  0  cx |
/// |  0 fy  cy |
/// |  0  0   1 |
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub matrix: [[f32; 3]; 3],
}

impl CameraIntrinsics {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self {
            matrix: [[fx, 0.0, cx], [0.0, fy, cy], [0.0, 0.0, 1.0]],
        }
    }

    pub fn focal_length(&self) -> (f32, f32) {
        (self.matrix[0][0], self.matrix[1][1])
    }

    pub fn principal_point(&self) -> (f32, f32) {
        (self.matrix[0][2], self.matrix[1][2])
    }
}

/// What a capture device hands to the video-data output for each tick.
///
/// The image is optional: a device may fail to produce a usable buffer for
/// a tick (decode or conversion failure) and still report the sample.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    image: Option<Frame>,
    presentation_time: Duration,
    camera_intrinsics: Option<CameraIntrinsics>,
}

impl SampleBuffer {
    pub fn new(image: Frame, presentation_time: Duration) -> Self {
        Self {
            image: Some(image),
            presentation_time,
            camera_intrinsics: None,
        }
    }

    pub fn without_image(presentation_time: Duration) -> Self {
        Self {
            image: None,
            presentation_time,
            camera_intrinsics: None,
        }
    }

    pub fn with_camera_intrinsics(mut self, intrinsics: Option<CameraIntrinsics>) -> Self {
        self.camera_intrinsics = intrinsics;
        self
    }

    pub fn image_buffer(&self) -> Option<&Frame> {
        self.image.as_ref()
    }

    pub fn presentation_time(&self) -> Duration {
        self.presentation_time
    }

    pub fn camera_intrinsics(&self) -> Option<&CameraIntrinsics> {
        self.camera_intrinsics.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsics_matrix_layout() {
        let k = CameraIntrinsics::new(500.0, 510.0, 320.0, 240.0);
        assert_eq!(k.focal_length(), (500.0, 510.0));
        assert_eq!(k.principal_point(), (320.0, 240.0));
        assert_eq!(k.matrix[2], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_sample_without_image() {
        let sample = SampleBuffer::without_image(Duration::from_millis(40));
        assert!(sample.image_buffer().is_none());
        assert!(sample.camera_intrinsics().is_none());
        assert_eq!(sample.presentation_time(), Duration::from_millis(40));
    }

    #[test]
    fn test_intrinsics_attachment() {
        let frame = Frame::new(vec![0u8; 12], 2, 2, 3, 0);
        let k = CameraIntrinsics::new(1.0, 1.0, 1.0, 1.0);
        let sample = SampleBuffer::new(frame, Duration::ZERO).with_camera_intrinsics(Some(k));
        assert_eq!(sample.camera_intrinsics(), Some(&k));
        assert_eq!(sample.image_buffer().unwrap().width(), 2);
    }
}
