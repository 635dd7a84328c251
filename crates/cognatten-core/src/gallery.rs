//! Enrolled-gallery construction from stored student photos.
//!
//! Each student's face photo is loaded, the most confident face detected,
//! and its embedding extracted. Per-student failures are collected and
//! reported, never fatal: a student with a bad photo simply cannot be
//! recognized until the photo is replaced.

use crate::detector::{DetectorError, FaceDetector};
use crate::encoder::{EncoderError, FaceEncoder};
use crate::types::{Embedding, GalleryEntry};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a student's photo could not be turned into a gallery entry.
#[derive(Error, Debug)]
pub enum GalleryIssue {
    #[error("photo not found for student {student_id}")]
    MissingPhoto { student_id: String },
    #[error("unreadable photo for student {student_id}: {reason}")]
    UnreadablePhoto { student_id: String, reason: String },
    #[error("no face detected in photo for student {student_id}")]
    NoFace { student_id: String },
    #[error("embedding extraction failed for student {student_id}: {reason}")]
    EncodingFailed { student_id: String, reason: String },
}

impl GalleryIssue {
    /// The student the issue belongs to.
    pub fn student_id(&self) -> &str {
        match self {
            Self::MissingPhoto { student_id }
            | Self::UnreadablePhoto { student_id, .. }
            | Self::NoFace { student_id }
            | Self::EncodingFailed { student_id, .. } => student_id,
        }
    }
}

/// Error from encoding a single photo file.
#[derive(Error, Debug)]
pub enum PhotoEncodeError {
    #[error("unreadable image: {0}")]
    Unreadable(#[from] image::ImageError),
    #[error("no face detected")]
    NoFace,
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Encoder(#[from] EncoderError),
}

/// Load one photo file and extract the embedding of its best face.
pub fn encode_photo(
    detector: &mut FaceDetector,
    encoder: &mut FaceEncoder,
    path: &Path,
) -> Result<Embedding, PhotoEncodeError> {
    let img = image::open(path)?.to_rgb8();
    let (width, height) = img.dimensions();
    let raw = img.into_raw();

    let faces = detector.detect(&raw, width, height)?;
    let face = faces.first().ok_or(PhotoEncodeError::NoFace)?;

    Ok(encoder.encode(&raw, width, height, face)?)
}

/// Build the enrolled gallery from `(student_id, photo_path)` pairs.
///
/// Returns the entries that loaded successfully together with the issues
/// for those that did not.
pub fn load_gallery(
    detector: &mut FaceDetector,
    encoder: &mut FaceEncoder,
    photos: &[(String, PathBuf)],
) -> (Vec<GalleryEntry>, Vec<GalleryIssue>) {
    let mut entries = Vec::with_capacity(photos.len());
    let mut issues = Vec::new();

    for (student_id, path) in photos {
        if !path.exists() {
            issues.push(GalleryIssue::MissingPhoto {
                student_id: student_id.clone(),
            });
            continue;
        }

        match encode_photo(detector, encoder, path) {
            Ok(embedding) => entries.push(GalleryEntry {
                student_id: student_id.clone(),
                embedding,
            }),
            Err(PhotoEncodeError::Unreadable(err)) => {
                issues.push(GalleryIssue::UnreadablePhoto {
                    student_id: student_id.clone(),
                    reason: err.to_string(),
                });
            }
            Err(PhotoEncodeError::NoFace) => {
                issues.push(GalleryIssue::NoFace {
                    student_id: student_id.clone(),
                });
            }
            Err(err) => {
                issues.push(GalleryIssue::EncodingFailed {
                    student_id: student_id.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        enrolled = entries.len(),
        skipped = issues.len(),
        "gallery loaded"
    );
    for issue in &issues {
        tracing::warn!(student_id = issue.student_id(), "gallery: {issue}");
    }

    (entries, issues)
}
