use serde::{Deserialize, Serialize};

/// Euclidean distance at or below which two embeddings are considered the
/// same person. 0.6 is the conventional tolerance for 128-dim face
/// embeddings; stricter deployments can lower it via configuration.
pub const DEFAULT_MATCH_TOLERANCE: f32 = 0.6;

/// Bounding box for a detected face, in original-frame pixel coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceBox {
    /// Box area in square pixels. Zero for degenerate boxes.
    pub fn area(&self) -> f32 {
        (self.width.max(0.0)) * (self.height.max(0.0))
    }
}

/// Face embedding vector (128-dimensional for MobileFaceNet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "mobilefacenet").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Compute Euclidean distance between two embeddings.
    ///
    /// Lower = more similar. For L2-normalized embeddings the range
    /// is [0, 2].
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// An enrolled face embedding tied to a student record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub student_id: String,
    pub embedding: Embedding,
}

/// Result of matching a probe embedding against the enrolled gallery.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    /// Euclidean distance of the best candidate.
    pub distance: f32,
    /// ID of the matched student (if any).
    pub student_id: Option<String>,
}

/// Strategy for comparing a probe embedding against the enrolled gallery.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry], tolerance: f32) -> MatchResult;
}

/// Euclidean distance matcher.
///
/// Scans every gallery entry and keeps the closest; a match requires the
/// best distance to be at or below the tolerance.
pub struct DistanceMatcher;

impl Matcher for DistanceMatcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry], tolerance: f32) -> MatchResult {
        let mut best_dist = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, entry) in gallery.iter().enumerate() {
            let dist = probe.euclidean_distance(&entry.embedding);
            if dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_dist <= tolerance => MatchResult {
                matched: true,
                distance: best_dist,
                student_id: Some(gallery[idx].student_id.clone()),
            },
            _ => MatchResult {
                matched: false,
                distance: if best_dist.is_finite() { best_dist } else { 0.0 },
                student_id: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding(values: Vec<f32>) -> Embedding {
        Embedding {
            values,
            model_version: None,
        }
    }

    fn entry(id: &str, values: Vec<f32>) -> GalleryEntry {
        GalleryEntry {
            student_id: id.to_string(),
            embedding: embedding(values),
        }
    }

    #[test]
    fn test_distance_identical() {
        let a = embedding(vec![1.0, 0.0, 0.0]);
        let b = embedding(vec![1.0, 0.0, 0.0]);
        assert!(a.euclidean_distance(&b).abs() < 1e-6);
    }

    #[test]
    fn test_distance_unit_vectors() {
        // Orthogonal unit vectors are sqrt(2) apart
        let a = embedding(vec![1.0, 0.0]);
        let b = embedding(vec![0.0, 1.0]);
        assert!((a.euclidean_distance(&b) - 2.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_distance_opposite() {
        let a = embedding(vec![1.0, 0.0]);
        let b = embedding(vec![-1.0, 0.0]);
        assert!((a.euclidean_distance(&b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_matcher_picks_closest() {
        let probe = embedding(vec![1.0, 0.0, 0.0]);
        let gallery = vec![
            entry("81711111", vec![0.0, 1.0, 0.0]),
            entry("81722222", vec![0.95, 0.05, 0.0]),
            entry("81733333", vec![0.0, 0.0, 1.0]),
        ];

        let result = DistanceMatcher.compare(&probe, &gallery, DEFAULT_MATCH_TOLERANCE);
        assert!(result.matched);
        assert_eq!(result.student_id.as_deref(), Some("81722222"));
    }

    #[test]
    fn test_matcher_rejects_above_tolerance() {
        let probe = embedding(vec![1.0, 0.0]);
        let gallery = vec![entry("81711111", vec![0.0, 1.0])];

        // sqrt(2) > 0.6 — not the same person
        let result = DistanceMatcher.compare(&probe, &gallery, DEFAULT_MATCH_TOLERANCE);
        assert!(!result.matched);
        assert!(result.student_id.is_none());
        assert!((result.distance - 2.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_matcher_empty_gallery() {
        let probe = embedding(vec![1.0, 0.0]);
        let result = DistanceMatcher.compare(&probe, &[], DEFAULT_MATCH_TOLERANCE);
        assert!(!result.matched);
        assert_eq!(result.distance, 0.0);
    }

    #[test]
    fn test_matcher_tolerance_boundary() {
        // Exactly at tolerance counts as a match
        let probe = embedding(vec![0.0, 0.0]);
        let gallery = vec![entry("81744444", vec![0.6, 0.0])];
        let result = DistanceMatcher.compare(&probe, &gallery, 0.6);
        assert!(result.matched);
    }

    #[test]
    fn test_face_box_area() {
        let face = FaceBox {
            x: 10.0,
            y: 10.0,
            width: 20.0,
            height: 30.0,
            confidence: 0.9,
        };
        assert!((face.area() - 600.0).abs() < 1e-6);

        let degenerate = FaceBox {
            x: 0.0,
            y: 0.0,
            width: -5.0,
            height: 10.0,
            confidence: 0.9,
        };
        assert_eq!(degenerate.area(), 0.0);
    }
}
