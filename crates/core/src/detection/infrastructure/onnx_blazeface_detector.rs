//! BlazeFace face detector using ONNX Runtime via `ort`.
//!
//! Short-range model: 128×128 input, 896 anchors, one box plus six
//! keypoints per anchor. Output is normalized to the input frame.
use std::path::Path;

use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::detection::domain::face_observation::FaceObservation;
use crate::detection::domain::image_request::ImageOptions;
use crate::shared::frame::Frame;
use crate::shared::geometry::{NormalizedPoint, NormalizedRect};

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Regressor values per anchor: 4 box values + 6 keypoints × 2.
const REG_STRIDE: usize = 16;
const NUM_KEYPOINTS: usize = 6;

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, DetectionError> {
        let session = ort::session::Session::builder()
            .map_err(ort_err)?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(ort_err)?
            .with_execution_providers(preferred_execution_providers())
            .map_err(ort_err)?
            .commit_from_file(model_path)
            .map_err(ort_err)?;
        log::info!("Loaded BlazeFace model from {}", model_path.display());
        Ok(Self {
            session,
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        _options: &ImageOptions,
    ) -> Result<Vec<FaceObservation>, DetectionError> {
        let input_tensor = preprocess(frame, INPUT_SIZE).ok_or(DetectionError::MalformedBuffer {
            width: frame.width(),
            height: frame.height(),
            channels: frame.channels(),
            expected: frame.expected_len(),
            actual: frame.data().len(),
        })?;

        let input_value = ort::value::Tensor::from_array(input_tensor).map_err(ort_err)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(ort_err)?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(DetectionError::backend(format!(
                "BlazeFace model expected 2 outputs, got {}",
                outputs.len()
            )));
        }

        let regressors = outputs[0]
            .try_extract_array::<f32>()
            .map_err(ort_err)?;
        let scores = outputs[1]
            .try_extract_array::<f32>()
            .map_err(ort_err)?;
        let reg_data = regressors
            .as_slice()
            .ok_or_else(|| DetectionError::backend("regressor tensor is not contiguous"))?;
        let score_data = scores
            .as_slice()
            .ok_or_else(|| DetectionError::backend("score tensor is not contiguous"))?;

        let mut candidates = decode(reg_data, score_data, &self.anchors, self.confidence as f32);
        Ok(nms(&mut candidates, NMS_IOU_THRESH))
    }
}

/// Hardware provider for the platform; ort falls back to CPU when it is
/// unavailable.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> Option<ndarray::Array4<f32>> {
    if frame.channels() != 3 {
        return None;
    }
    let src = frame.as_ndarray()?;
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Some(tensor)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Generate BlazeFace anchors for the short-range model.
///
/// Two feature maps, 16×16 and 8×8, with 2 and 6 anchors per cell.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

/// Turns raw model output into observations above `threshold`.
///
/// Model coordinates are top-left origin; observations use the
/// bottom-left normalized convention.
fn decode(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    threshold: f32,
) -> Vec<FaceObservation> {
    let scale = INPUT_SIZE as f32;
    let mut observations = Vec::new();

    for (i, &raw_score) in score_data.iter().enumerate().take(anchors.len()) {
        let score = sigmoid(raw_score);
        if score < threshold {
            continue;
        }
        let offset = i * REG_STRIDE;
        if offset + REG_STRIDE > reg_data.len() {
            break;
        }
        let reg = &reg_data[offset..offset + REG_STRIDE];
        let anchor = anchors[i];

        let cx = anchor[0] + reg[0] / scale;
        let cy = anchor[1] + reg[1] / scale;
        let w = reg[2] / scale;
        let h = reg[3] / scale;

        let bounding_box = NormalizedRect::from_pixel_corners(
            (cx - w / 2.0) as f64,
            (cy - h / 2.0) as f64,
            (cx + w / 2.0) as f64,
            (cy + h / 2.0) as f64,
            1,
            1,
        );

        let landmarks = (0..NUM_KEYPOINTS)
            .map(|k| {
                let kx = anchor[0] + reg[4 + k * 2] / scale;
                let ky = anchor[1] + reg[5 + k * 2] / scale;
                NormalizedPoint {
                    x: (kx as f64).clamp(0.0, 1.0),
                    y: (1.0 - ky as f64).clamp(0.0, 1.0),
                }
            })
            .collect();

        observations.push(FaceObservation::new(bounding_box, score).with_landmarks(landmarks));
    }

    observations
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

fn nms(candidates: &mut [FaceObservation], iou_thresh: f64) -> Vec<FaceObservation> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(candidates[i].clone());
        for j in (i + 1)..candidates.len() {
            if !suppressed[j]
                && candidates[i].bounding_box.iou(&candidates[j].bounding_box) > iou_thresh
            {
                suppressed[j] = true;
            }
        }
    }
    keep
}

/// ort errors may carry non-`Sync` recovery state, so only the message
/// crosses into [`DetectionError`].
fn ort_err(e: impl std::fmt::Display) -> DetectionError {
    DetectionError::backend(e.to_string())
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn observation(x: f64, y: f64, size: f64, confidence: f32) -> FaceObservation {
        FaceObservation::new(NormalizedRect::new(x, y, size, size), confidence)
    }

    #[test]
    fn test_preprocess_shape() {
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let tensor = preprocess(&frame, 128).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);
    }

    #[test]
    fn test_preprocess_normalized() {
        let frame = Frame::new(vec![255u8; 50 * 50 * 3], 50, 50, 3, 0);
        let tensor = preprocess(&frame, 128).unwrap();
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_preprocess_rejects_non_rgb() {
        let frame = Frame::new(vec![0u8; 50 * 50], 50, 50, 1, 0);
        assert!(preprocess(&frame, 128).is_none());
    }

    #[test]
    fn test_generate_anchors_count() {
        // 16×16 grid × 2 anchors + 8×8 grid × 6 anchors = 512 + 384 = 896
        assert_eq!(generate_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn test_anchors_in_unit_range() {
        for a in generate_anchors() {
            assert!(a[0] > 0.0 && a[0] < 1.0);
            assert!(a[1] > 0.0 && a[1] < 1.0);
        }
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!((sigmoid(10.0) - 1.0).abs() < 0.001);
        assert!(sigmoid(-10.0) < 0.001);
    }

    #[test]
    fn test_decode_flips_to_bottom_left_origin() {
        // One anchor centered at (0.25, 0.25) in top-left image space with a
        // 32px (0.25 normalized) box and no offset.
        let anchors = vec![[0.25f32, 0.25f32]];
        let mut reg = vec![0.0f32; REG_STRIDE];
        reg[2] = 32.0;
        reg[3] = 32.0;
        let scores = vec![5.0f32];

        let obs = decode(&reg, &scores, &anchors, 0.5);
        assert_eq!(obs.len(), 1);
        let bb = obs[0].bounding_box;
        assert_relative_eq!(bb.x, 0.125, epsilon = 1e-6);
        assert_relative_eq!(bb.width, 0.25, epsilon = 1e-6);
        // top edge 0.125 from the top → bottom edge 0.375 from the top
        assert_relative_eq!(bb.y, 0.625, epsilon = 1e-6);
        let landmarks = obs[0].landmarks.as_ref().unwrap();
        assert_eq!(landmarks.len(), NUM_KEYPOINTS);
        assert_relative_eq!(landmarks[0].y, 0.75, epsilon = 1e-6);
    }

    #[test]
    fn test_decode_skips_low_scores() {
        let anchors = vec![[0.5f32, 0.5f32]; 2];
        let reg = vec![0.0f32; REG_STRIDE * 2];
        let scores = vec![-5.0f32, -3.0f32];
        assert!(decode(&reg, &scores, &anchors, 0.5).is_empty());
    }

    #[test]
    fn test_nms_suppresses_overlap_keeping_highest() {
        let mut obs = vec![
            observation(0.10, 0.10, 0.3, 0.7),
            observation(0.11, 0.11, 0.3, 0.9),
        ];
        let kept = nms(&mut obs, NMS_IOU_THRESH);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_separate_faces() {
        let mut obs = vec![
            observation(0.0, 0.0, 0.2, 0.9),
            observation(0.6, 0.6, 0.2, 0.8),
        ];
        assert_eq!(nms(&mut obs, NMS_IOU_THRESH).len(), 2);
    }
}
