use crate::shared::geometry::{NormalizedPoint, NormalizedRect};

/// One detected face in an upright image.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceObservation {
    pub bounding_box: NormalizedRect,
    pub confidence: f32,
    pub landmarks: Option<Vec<NormalizedPoint>>,
}

impl FaceObservation {
    pub fn new(bounding_box: NormalizedRect, confidence: f32) -> Self {
        Self {
            bounding_box,
            confidence,
            landmarks: None,
        }
    }

    pub fn with_landmarks(mut self, landmarks: Vec<NormalizedPoint>) -> Self {
        self.landmarks = Some(landmarks);
        self
    }
}
