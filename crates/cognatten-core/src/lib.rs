//! Face detection and embedding extraction engine.
//!
//! Uses UltraFace for face detection and MobileFaceNet for embedding
//! extraction, both running via ONNX Runtime for CPU inference. Matching
//! is Euclidean distance against a gallery of enrolled student embeddings.

pub mod detector;
pub mod encoder;
pub mod gallery;
pub mod pipeline;
pub mod types;

pub use detector::FaceDetector;
pub use encoder::FaceEncoder;
pub use gallery::{load_gallery, GalleryIssue};
pub use pipeline::{identify_frame, Identification};
pub use types::{DistanceMatcher, Embedding, FaceBox, GalleryEntry, MatchResult, Matcher};

use std::path::PathBuf;

/// Default directory for ONNX model files.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/cognatten/models")
}
