//! MobileFaceNet embedding extractor via ONNX Runtime.
//!
//! Produces L2-normalized 128-dimensional face embeddings from RGB face
//! crops resized to 112×112.

use crate::types::{Embedding, FaceBox};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (different from the detector!) ---
const ENCODER_INPUT_SIZE: usize = 112;
const ENCODER_MEAN: f32 = 127.5;
const ENCODER_STD: f32 = 127.5; // symmetric normalization to [-1, 1]
const ENCODER_EMBEDDING_DIM: usize = 128;
const ENCODER_MODEL_VERSION: &str = "mobilefacenet";
/// Fraction of the box size added on each side before cropping, so the
/// crop keeps forehead and chin context the detector box trims off.
const CROP_MARGIN: f32 = 0.15;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("model file not found: {0} — download mobilefacenet.onnx and place it in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face box lies outside the frame")]
    EmptyCrop,
    #[error("frame buffer too short: expected {expected} bytes, got {actual}")]
    BadFrame { expected: usize, actual: usize },
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Pixel-space crop rectangle, clamped to frame bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CropRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// MobileFaceNet-based embedding extractor.
pub struct FaceEncoder {
    session: Session,
}

impl FaceEncoder {
    /// Load the MobileFaceNet ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EncoderError> {
        if !Path::new(model_path).exists() {
            return Err(EncoderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded MobileFaceNet model"
        );

        Ok(Self { session })
    }

    /// Extract a face embedding from a detected face in an RGB24 frame.
    ///
    /// The face box is expanded by a margin, clamped to the frame, and the
    /// crop resized to the canonical 112×112 input before inference.
    pub fn encode(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        face: &FaceBox,
    ) -> Result<Embedding, EncoderError> {
        let expected = (width * height * 3) as usize;
        if frame.len() < expected {
            return Err(EncoderError::BadFrame {
                expected,
                actual: frame.len(),
            });
        }

        let rect = crop_rect(face, width, height).ok_or(EncoderError::EmptyCrop)?;

        let img = RgbImage::from_raw(width, height, frame[..expected].to_vec())
            .ok_or(EncoderError::BadFrame {
                expected,
                actual: frame.len(),
            })?;
        let crop = image::imageops::crop_imm(&img, rect.x, rect.y, rect.width, rect.height);
        let aligned = image::imageops::resize(
            &crop.to_image(),
            ENCODER_INPUT_SIZE as u32,
            ENCODER_INPUT_SIZE as u32,
            FilterType::Triangle,
        );

        let input = preprocess(&aligned);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();

        if raw.len() != ENCODER_EMBEDDING_DIM {
            return Err(EncoderError::InferenceFailed(format!(
                "expected {ENCODER_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        // L2-normalize so Euclidean distances are comparable across frames
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|x| x / norm).collect()
        } else {
            raw
        };

        Ok(Embedding {
            values,
            model_version: Some(ENCODER_MODEL_VERSION.to_string()),
        })
    }
}

/// Expand a face box by the crop margin and clamp it to the frame.
///
/// Returns `None` when the clamped rectangle is empty (box entirely
/// outside the frame or degenerate).
fn crop_rect(face: &FaceBox, frame_width: u32, frame_height: u32) -> Option<CropRect> {
    let margin_x = face.width * CROP_MARGIN;
    let margin_y = face.height * CROP_MARGIN;

    let x1 = (face.x - margin_x).max(0.0);
    let y1 = (face.y - margin_y).max(0.0);
    let x2 = (face.x + face.width + margin_x).min(frame_width as f32);
    let y2 = (face.y + face.height + margin_y).min(frame_height as f32);

    if x2 - x1 < 1.0 || y2 - y1 < 1.0 {
        return None;
    }

    Some(CropRect {
        x: x1 as u32,
        y: y1 as u32,
        width: (x2 - x1) as u32,
        height: (y2 - y1) as u32,
    })
}

/// Preprocess a 112×112 RGB crop into a NCHW float tensor.
fn preprocess(aligned: &RgbImage) -> Array4<f32> {
    let size = ENCODER_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for (x, y, pixel) in aligned.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - ENCODER_MEAN) / ENCODER_STD;
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32, y: f32, w: f32, h: f32) -> FaceBox {
        FaceBox {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_crop_rect_adds_margin() {
        let rect = crop_rect(&face(100.0, 100.0, 100.0, 100.0), 640, 480).unwrap();
        // 15% margin on each side: 85..215
        assert_eq!(rect.x, 85);
        assert_eq!(rect.y, 85);
        assert_eq!(rect.width, 130);
        assert_eq!(rect.height, 130);
    }

    #[test]
    fn test_crop_rect_clamps_to_frame() {
        let rect = crop_rect(&face(-10.0, -10.0, 50.0, 50.0), 640, 480).unwrap();
        assert_eq!(rect.x, 0);
        assert_eq!(rect.y, 0);
        // x2 = -10 + 50 + 7.5 = 47.5
        assert_eq!(rect.width, 47);
    }

    #[test]
    fn test_crop_rect_outside_frame() {
        assert!(crop_rect(&face(700.0, 500.0, 50.0, 50.0), 640, 480).is_none());
    }

    #[test]
    fn test_crop_rect_degenerate_box() {
        assert!(crop_rect(&face(10.0, 10.0, 0.0, 0.0), 640, 480).is_none());
    }

    #[test]
    fn test_preprocess_output_shape() {
        let aligned = RgbImage::from_pixel(
            ENCODER_INPUT_SIZE as u32,
            ENCODER_INPUT_SIZE as u32,
            image::Rgb([128, 128, 128]),
        );
        let tensor = preprocess(&aligned);
        assert_eq!(tensor.shape(), &[1, 3, ENCODER_INPUT_SIZE, ENCODER_INPUT_SIZE]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let aligned = RgbImage::from_pixel(
            ENCODER_INPUT_SIZE as u32,
            ENCODER_INPUT_SIZE as u32,
            image::Rgb([128, 0, 255]),
        );
        let tensor = preprocess(&aligned);
        let r = tensor[[0, 0, 0, 0]];
        let g = tensor[[0, 1, 0, 0]];
        let b = tensor[[0, 2, 0, 0]];
        assert!((r - (128.0 - ENCODER_MEAN) / ENCODER_STD).abs() < 1e-6);
        assert!((g - (-1.0)).abs() < 1e-6);
        assert!((b - 1.0).abs() < 1e-6);
    }
}
