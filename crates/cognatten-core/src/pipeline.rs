//! Single-frame identification: detect → encode → match.
//!
//! Shared by the daemon engine and the CLI's live attendance loop so both
//! surfaces run the exact same call sequence.

use crate::detector::{DetectorError, FaceDetector};
use crate::encoder::{EncoderError, FaceEncoder};
use crate::types::{DistanceMatcher, FaceBox, GalleryEntry, MatchResult, Matcher};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentifyError {
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Encoder(#[from] EncoderError),
}

/// A face found in a frame together with its gallery match outcome.
#[derive(Debug, Clone)]
pub struct Identification {
    pub result: MatchResult,
    pub face: FaceBox,
}

/// Identify the most confident face in one RGB24 frame.
///
/// Returns `Ok(None)` when the frame contains no detectable face; an
/// unmatched face comes back as `Some` with `result.matched == false`
/// (the "unknown face, please register" case).
pub fn identify_frame(
    detector: &mut FaceDetector,
    encoder: &mut FaceEncoder,
    frame: &[u8],
    width: u32,
    height: u32,
    gallery: &[GalleryEntry],
    tolerance: f32,
) -> Result<Option<Identification>, IdentifyError> {
    let faces = detector.detect(frame, width, height)?;
    let Some(face) = faces.first() else {
        return Ok(None);
    };

    let embedding = encoder.encode(frame, width, height, face)?;
    let result = DistanceMatcher.compare(&embedding, gallery, tolerance);

    Ok(Some(Identification {
        result,
        face: face.clone(),
    }))
}
