//! UltraFace face detector via ONNX Runtime.
//!
//! Implements the UltraFace (version-RFB-320) single-stage detector:
//! fixed 320×240 RGB input, prior-free corner-form box output, score
//! thresholding and IoU-based NMS post-processing.

use crate::types::FaceBox;
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const ULTRAFACE_INPUT_WIDTH: usize = 320;
const ULTRAFACE_INPUT_HEIGHT: usize = 240;
const ULTRAFACE_MEAN: f32 = 127.0;
const ULTRAFACE_STD: f32 = 128.0;
const ULTRAFACE_CONFIDENCE_THRESHOLD: f32 = 0.7;
const ULTRAFACE_NMS_THRESHOLD: f32 = 0.3;
/// Columns per anchor in the score tensor: [background, face].
const ULTRAFACE_SCORE_CLASSES: usize = 2;
/// Columns per anchor in the box tensor: [x1, y1, x2, y2], normalized.
const ULTRAFACE_BOX_COORDS: usize = 4;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download version-RFB-320.onnx and place it in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("frame buffer too short: expected {expected} bytes, got {actual}")]
    BadFrame { expected: usize, actual: usize },
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Output tensor indices: (scores_idx, boxes_idx).
type OutputIndices = (usize, usize);

/// UltraFace-based face detector.
pub struct FaceDetector {
    session: Session,
    /// (scores, boxes) output positions, discovered by name at load time
    /// with a positional fallback.
    output_indices: OutputIndices,
}

impl FaceDetector {
    /// Load the UltraFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded UltraFace model"
        );

        if output_names.len() < 2 {
            return Err(DetectorError::InferenceFailed(format!(
                "UltraFace model requires 2 outputs (scores, boxes), got {}",
                output_names.len()
            )));
        }

        let output_indices = discover_output_indices(&output_names);
        tracing::debug!(?output_indices, "UltraFace output tensor mapping");

        Ok(Self {
            session,
            output_indices,
        })
    }

    /// Detect faces in an RGB24 frame, returning boxes sorted by confidence.
    pub fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceBox>, DetectorError> {
        let input = preprocess(frame, width, height)?;

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (scores_idx, boxes_idx) = self.output_indices;
        let (_, scores) = outputs[scores_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[boxes_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;

        let detections = decode(
            scores,
            boxes,
            width as f32,
            height as f32,
            ULTRAFACE_CONFIDENCE_THRESHOLD,
        );

        let mut result = nms(detections, ULTRAFACE_NMS_THRESHOLD);
        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(result)
    }
}

/// Preprocess an RGB24 frame into the 1×3×240×320 NCHW float tensor.
///
/// UltraFace stretches the frame to the fixed input size (no letterbox),
/// so normalized output boxes map straight back to frame coordinates.
fn preprocess(frame: &[u8], width: u32, height: u32) -> Result<Array4<f32>, DetectorError> {
    let expected = (width * height * 3) as usize;
    if frame.len() < expected {
        return Err(DetectorError::BadFrame {
            expected,
            actual: frame.len(),
        });
    }

    let img = RgbImage::from_raw(width, height, frame[..expected].to_vec())
        .ok_or(DetectorError::BadFrame {
            expected,
            actual: frame.len(),
        })?;
    let resized = image::imageops::resize(
        &img,
        ULTRAFACE_INPUT_WIDTH as u32,
        ULTRAFACE_INPUT_HEIGHT as u32,
        FilterType::Triangle,
    );

    let mut tensor = Array4::<f32>::zeros((1, 3, ULTRAFACE_INPUT_HEIGHT, ULTRAFACE_INPUT_WIDTH));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] =
                (pixel[c] as f32 - ULTRAFACE_MEAN) / ULTRAFACE_STD;
        }
    }

    Ok(tensor)
}

/// Discover output tensor ordering by name.
///
/// The reference export names its outputs "scores" and "boxes"; re-exports
/// may use generic numeric names, in which case the standard positional
/// ordering [0]=scores, [1]=boxes applies.
fn discover_output_indices(names: &[String]) -> OutputIndices {
    let scores = names.iter().position(|n| n == "scores");
    let boxes = names.iter().position(|n| n == "boxes");

    match (scores, boxes) {
        (Some(s), Some(b)) => {
            tracing::info!("UltraFace: using name-based output tensor mapping");
            (s, b)
        }
        _ => {
            tracing::info!(
                ?names,
                "UltraFace: output names not recognized, using positional mapping [0]=scores, [1]=boxes"
            );
            (0, 1)
        }
    }
}

/// Decode score/box tensors into frame-space detections.
///
/// Scores come as [background, face] pairs per anchor; boxes as corner-form
/// coordinates normalized to [0, 1] of the input (and thus of the frame,
/// because preprocessing stretches rather than letterboxes).
fn decode(
    scores: &[f32],
    boxes: &[f32],
    frame_width: f32,
    frame_height: f32,
    threshold: f32,
) -> Vec<FaceBox> {
    let num_anchors = scores.len() / ULTRAFACE_SCORE_CLASSES;
    let mut detections = Vec::new();

    for idx in 0..num_anchors {
        let face_score = scores[idx * ULTRAFACE_SCORE_CLASSES + 1];
        if face_score <= threshold {
            continue;
        }

        let box_off = idx * ULTRAFACE_BOX_COORDS;
        if box_off + 3 >= boxes.len() {
            continue;
        }

        let x1 = boxes[box_off] * frame_width;
        let y1 = boxes[box_off + 1] * frame_height;
        let x2 = boxes[box_off + 2] * frame_width;
        let y2 = boxes[box_off + 3] * frame_height;

        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        detections.push(FaceBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: face_score,
        });
    }

    detections
}

/// Non-Maximum Suppression: remove overlapping detections.
fn nms(mut detections: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] {
                continue;
            }
            if iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Compute Intersection-over-Union between two face boxes.
fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter_w = (x2 - x1).max(0.0);
    let inter_h = (y2 - y1).max(0.0);
    let inter_area = inter_w * inter_h;

    let union_area = a.area() + b.area() - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_box(x: f32, y: f32, w: f32, h: f32, conf: f32) -> FaceBox {
        FaceBox {
            x,
            y,
            width: w,
            height: h,
            confidence: conf,
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = make_box(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = make_box(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_box(20.0, 20.0, 10.0, 10.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = make_box(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_box(5.0, 0.0, 10.0, 10.0, 1.0);
        // Overlap: 5x10 = 50, union: 100+100-50 = 150
        let expected = 50.0 / 150.0;
        assert!((iou(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let detections = vec![
            make_box(0.0, 0.0, 100.0, 100.0, 0.9),
            make_box(5.0, 5.0, 100.0, 100.0, 0.8),
            make_box(200.0, 200.0, 50.0, 50.0, 0.7),
        ];
        let result = nms(detections, 0.3);
        assert_eq!(result.len(), 2);
        assert!((result[0].confidence - 0.9).abs() < 1e-6);
        assert!((result[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        let result = nms(vec![], 0.3);
        assert!(result.is_empty());
    }

    #[test]
    fn test_decode_thresholds_and_scales() {
        // Two anchors: first below threshold, second a confident face
        // covering the center quarter of a 640x480 frame.
        let scores = vec![0.9, 0.1, 0.05, 0.95];
        let boxes = vec![
            0.0, 0.0, 0.1, 0.1, // anchor 0 (filtered by score)
            0.25, 0.25, 0.75, 0.75, // anchor 1
        ];

        let result = decode(&scores, &boxes, 640.0, 480.0, ULTRAFACE_CONFIDENCE_THRESHOLD);
        assert_eq!(result.len(), 1);
        let face = &result[0];
        assert!((face.x - 160.0).abs() < 1e-3);
        assert!((face.y - 120.0).abs() < 1e-3);
        assert!((face.width - 320.0).abs() < 1e-3);
        assert!((face.height - 240.0).abs() < 1e-3);
        assert!((face.confidence - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_decode_skips_degenerate_boxes() {
        // Inverted corners must not produce a detection.
        let scores = vec![0.05, 0.95];
        let boxes = vec![0.8, 0.8, 0.2, 0.2];
        let result = decode(&scores, &boxes, 640.0, 480.0, ULTRAFACE_CONFIDENCE_THRESHOLD);
        assert!(result.is_empty());
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = ["boxes", "scores"].iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_output_indices(&names), (1, 0));
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = ["460", "461"].iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_output_indices(&names), (0, 1));
    }

    #[test]
    fn test_preprocess_shape_and_normalization() {
        // Uniform mid-gray frame: every tensor value is (128-127)/128.
        let frame = vec![128u8; 64 * 48 * 3];
        let tensor = preprocess(&frame, 64, 48).unwrap();
        assert_eq!(
            tensor.shape(),
            &[1, 3, ULTRAFACE_INPUT_HEIGHT, ULTRAFACE_INPUT_WIDTH]
        );
        let expected = (128.0 - ULTRAFACE_MEAN) / ULTRAFACE_STD;
        let val = tensor[[0, 0, 0, 0]];
        assert!((val - expected).abs() < 1e-4, "got {val}, expected {expected}");
    }

    #[test]
    fn test_preprocess_rejects_short_buffer() {
        let frame = vec![0u8; 10];
        assert!(matches!(
            preprocess(&frame, 64, 48),
            Err(DetectorError::BadFrame { .. })
        ));
    }
}
