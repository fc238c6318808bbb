use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::capture::domain::sample_buffer_delegate::SampleBufferDelegate;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_observation::FaceObservation;
use crate::detection::domain::image_request::{
    CompletionHandler, FaceRectanglesRequest, ImageOptions, ImageRequest, ImageRequestHandler,
};
use crate::orientation::domain::device_orientation::CameraPosition;
use crate::orientation::domain::exif_orientation::ExifOrientation;
use crate::orientation::domain::orientation_source::OrientationSource;
use crate::pipeline::main_queue::MainQueueHandle;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::rendering::domain::overlay_surface::OverlaySurface;
use crate::rendering::preview_renderer::PreviewRenderer;
use crate::shared::sample_buffer::SampleBuffer;

/// Runs face detection on every delivered sample.
///
/// Lives on the delivery thread. Per sample it picks the orientation code,
/// builds a one-shot request handler and performs the face-rectangles
/// request synchronously. Failed samples are logged and dropped; only
/// successful results reach the completion handler.
pub struct DetectionDispatcher {
    requests: Vec<Box<dyn ImageRequest>>,
    orientation_source: Arc<dyn OrientationSource>,
    camera_position: CameraPosition,
    logger: Arc<Mutex<dyn PipelineLogger>>,
    frames_seen: usize,
    frames_dropped: usize,
}

impl DetectionDispatcher {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        orientation_source: Arc<dyn OrientationSource>,
        camera_position: CameraPosition,
        logger: Arc<Mutex<dyn PipelineLogger>>,
        mut on_results: CompletionHandler,
    ) -> Self {
        let metric_logger = logger.clone();
        let completion: CompletionHandler = Box::new(move |observations: Vec<FaceObservation>| {
            with_logger(&metric_logger, |l| l.metric("faces", observations.len() as f64));
            on_results(observations);
        });
        Self {
            requests: vec![Box::new(FaceRectanglesRequest::new(detector, completion))],
            orientation_source,
            camera_position,
            logger,
            frames_seen: 0,
            frames_dropped: 0,
        }
    }

    /// Posts every result to the main loop, where it replaces the
    /// renderer's overlays.
    pub fn forward_to_renderer<S: OverlaySurface + 'static>(
        detector: Box<dyn FaceDetector>,
        orientation_source: Arc<dyn OrientationSource>,
        camera_position: CameraPosition,
        logger: Arc<Mutex<dyn PipelineLogger>>,
        main_queue: MainQueueHandle<PreviewRenderer<S>>,
    ) -> Self {
        let on_results: CompletionHandler = Box::new(move |observations| {
            let posted = main_queue.dispatch(move |renderer: &mut PreviewRenderer<S>| {
                renderer.show_observations(&observations);
            });
            if !posted {
                log::debug!("Main loop has exited; detection result discarded");
            }
        });
        Self::new(
            detector,
            orientation_source,
            camera_position,
            logger,
            on_results,
        )
    }

    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }

    /// Samples that never reached the completion handler.
    pub fn frames_dropped(&self) -> usize {
        self.frames_dropped
    }

    fn drop_frame(&mut self) {
        self.frames_dropped += 1;
        with_logger(&self.logger, |l| l.metric("dropped_frames", 1.0));
    }
}

impl SampleBufferDelegate for DetectionDispatcher {
    fn did_output(&mut self, sample: SampleBuffer) {
        self.frames_seen += 1;
        let seen = self.frames_seen;
        with_logger(&self.logger, |l| l.progress(seen, None));

        let Some(frame) = sample.image_buffer() else {
            log::debug!(
                "Sample at {:?} carries no image buffer; skipped",
                sample.presentation_time()
            );
            self.drop_frame();
            return;
        };

        let orientation =
            ExifOrientation::from_device(self.orientation_source.current(), self.camera_position);
        let options = ImageOptions {
            camera_intrinsics: sample.camera_intrinsics().copied(),
        };

        let started = Instant::now();
        let result = ImageRequestHandler::new(frame, orientation, options).perform(&mut self.requests);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(()) => with_logger(&self.logger, |l| l.timing("detect", elapsed_ms)),
            Err(e) => {
                log::error!("Face detection failed on frame {}: {e}", frame.index());
                self.drop_frame();
            }
        }
    }
}

/// A poisoned logger only loses metrics, so recover it instead of
/// propagating the panic.
fn with_logger(logger: &Mutex<dyn PipelineLogger>, f: impl FnOnce(&mut dyn PipelineLogger)) {
    let mut guard = logger.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut *guard);
}
