use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::detection::domain::face_observation::FaceObservation;
use crate::orientation::domain::exif_orientation::ExifOrientation;
use crate::shared::frame::Frame;
use crate::shared::sample_buffer::CameraIntrinsics;

/// Auxiliary inputs passed alongside the image to every request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageOptions {
    pub camera_intrinsics: Option<CameraIntrinsics>,
}

/// Work to run against one upright image.
pub trait ImageRequest: Send {
    fn name(&self) -> &'static str;

    fn perform(&mut self, image: &Frame, options: &ImageOptions) -> Result<(), DetectionError>;
}

/// Called with the observations of every successfully processed frame.
pub type CompletionHandler = Box<dyn FnMut(Vec<FaceObservation>) + Send>;

/// Finds face rectangles and hands them to a completion handler.
///
/// The handler runs on whatever thread performs the request; it must not
/// touch rendering state directly.
pub struct FaceRectanglesRequest {
    detector: Box<dyn FaceDetector>,
    completion: CompletionHandler,
}

impl FaceRectanglesRequest {
    pub fn new(detector: Box<dyn FaceDetector>, completion: CompletionHandler) -> Self {
        Self {
            detector,
            completion,
        }
    }
}

impl ImageRequest for FaceRectanglesRequest {
    fn name(&self) -> &'static str {
        "face-rectangles"
    }

    fn perform(&mut self, image: &Frame, options: &ImageOptions) -> Result<(), DetectionError> {
        let observations = self.detector.detect(image, options)?;
        (self.completion)(observations);
        Ok(())
    }
}

/// One-shot handler binding a single frame, its orientation, and options.
///
/// Validates the buffer, turns it upright once, then runs each request in
/// order. The first failing request aborts the rest.
pub struct ImageRequestHandler<'a> {
    frame: &'a Frame,
    orientation: ExifOrientation,
    options: ImageOptions,
}

impl<'a> ImageRequestHandler<'a> {
    pub fn new(frame: &'a Frame, orientation: ExifOrientation, options: ImageOptions) -> Self {
        Self {
            frame,
            orientation,
            options,
        }
    }

    pub fn perform(&self, requests: &mut [Box<dyn ImageRequest>]) -> Result<(), DetectionError> {
        let frame = self.frame;
        if !frame.is_well_formed() {
            return Err(DetectionError::MalformedBuffer {
                width: frame.width(),
                height: frame.height(),
                channels: frame.channels(),
                expected: frame.expected_len(),
                actual: frame.data().len(),
            });
        }
        if frame.channels() != 3 {
            return Err(DetectionError::UnsupportedPixelFormat {
                channels: frame.channels(),
            });
        }

        let upright = self
            .orientation
            .apply(frame)
            .ok_or(DetectionError::UnsupportedPixelFormat {
                channels: frame.channels(),
            })?;

        for request in requests.iter_mut() {
            log::trace!("Performing {} on frame {}", request.name(), frame.index());
            request.perform(&upright, &self.options)?;
        }
        Ok(())
    }
}
