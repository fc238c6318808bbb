use std::sync::Arc;

use crate::capture::preview_feed::PreviewFeed;
use crate::detection::domain::face_observation::FaceObservation;
use crate::orientation::domain::device_orientation::CameraPosition;
use crate::orientation::domain::exif_orientation::ExifOrientation;
use crate::orientation::domain::orientation_source::OrientationSource;
use crate::rendering::domain::overlay_surface::OverlaySurface;

/// Owns the display surface: the live preview and one outline per face.
///
/// Must only be used from the main loop.
pub struct PreviewRenderer<S: OverlaySurface> {
    surface: S,
    feed: Option<PreviewFeed>,
    orientation: Option<(Arc<dyn OrientationSource>, CameraPosition)>,
    results_shown: usize,
}

impl<S: OverlaySurface> PreviewRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            feed: None,
            orientation: None,
            results_shown: 0,
        }
    }

    /// Turns preview frames upright the same way detection input is, so
    /// overlays line up with the picture. Without it frames are shown as
    /// captured.
    pub fn with_orientation_source(
        mut self,
        source: Arc<dyn OrientationSource>,
        position: CameraPosition,
    ) -> Self {
        self.orientation = Some((source, position));
        self
    }

    /// Binds the display to a session's preview output.
    pub fn bind_feed(&mut self, feed: PreviewFeed) {
        self.feed = Some(feed);
    }

    /// Shows the newest captured frame, if one arrived since the last call.
    pub fn present_latest(&mut self) -> bool {
        let Some(frame) = self.feed.as_ref().and_then(PreviewFeed::take_latest) else {
            return false;
        };
        let orientation = match &self.orientation {
            Some((source, position)) => ExifOrientation::from_device(source.current(), *position),
            None => ExifOrientation::Up,
        };
        match orientation.apply(&frame) {
            Some(upright) => {
                self.surface.show_frame(&upright);
                true
            }
            None => {
                log::debug!("Preview frame {} could not be oriented", frame.index());
                false
            }
        }
    }

    /// Replaces all overlays with one rectangle per observation, in order.
    pub fn show_observations(&mut self, observations: &[FaceObservation]) {
        self.surface.clear_overlays();
        let (width, height) = self.surface.size();
        for observation in observations {
            self.surface
                .draw_overlay(observation.bounding_box.to_view_rect(width, height));
        }
        self.results_shown += 1;
    }

    /// How many detection results have been displayed.
    pub fn results_shown(&self) -> usize {
        self.results_shown
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}
