//! Recognition readiness of a not-yet-enrolled identity.
//!
//! The readiness score is the average pairwise cosine similarity of the
//! photos captured so far. It only advises the caller whether to keep
//! capturing; a single photo may always be enrolled as a basic enrollment.

use serde::Serialize;

use crate::types::Embedding;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Readiness {
    /// No photo accepted yet.
    Empty,
    /// One photo: enrollable, at lower confidence.
    Basic,
    Sufficient { score: f32 },
    Insufficient { score: f32, shortfall: f32 },
}

impl Readiness {
    pub fn permits_finalize(&self) -> bool {
        matches!(self, Readiness::Basic | Readiness::Sufficient { .. })
    }

    pub fn score(&self) -> Option<f32> {
        match self {
            Readiness::Sufficient { score } | Readiness::Insufficient { score, .. } => Some(*score),
            Readiness::Empty | Readiness::Basic => None,
        }
    }
}

pub struct MultiPhotoAccuracyEstimator {
    target: f32,
}

impl MultiPhotoAccuracyEstimator {
    pub fn new(target: f32) -> Self {
        Self { target }
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Average similarity over all unordered pairs; `None` below two photos.
    pub fn readiness_score(&self, embeddings: &[Embedding]) -> Option<f32> {
        if embeddings.len() < 2 {
            return None;
        }
        let mut total = 0.0f32;
        let mut pairs = 0usize;
        for (i, a) in embeddings.iter().enumerate() {
            for b in &embeddings[i + 1..] {
                total += a.similarity(b);
                pairs += 1;
            }
        }
        Some(total / pairs as f32)
    }

    pub fn assess(&self, embeddings: &[Embedding]) -> Readiness {
        let readiness = match (embeddings.len(), self.readiness_score(embeddings)) {
            (0, _) => Readiness::Empty,
            (_, None) => Readiness::Basic,
            (_, Some(score)) if score >= self.target => Readiness::Sufficient { score },
            (_, Some(score)) => Readiness::Insufficient {
                score,
                shortfall: self.target - score,
            },
        };
        tracing::debug!(photos = embeddings.len(), target = self.target, ?readiness, "readiness assessed");
        readiness
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_fewer_than_two_photos() {
        let est = MultiPhotoAccuracyEstimator::new(0.65);
        assert_eq!(est.readiness_score(&[]), None);
        assert_eq!(est.readiness_score(&[emb(&[1.0, 0.0])]), None);
        assert_eq!(est.assess(&[]), Readiness::Empty);
        assert_eq!(est.assess(&[emb(&[1.0, 0.0])]), Readiness::Basic);
        assert!(Readiness::Basic.permits_finalize());
        assert!(!Readiness::Empty.permits_finalize());
    }

    #[test]
    fn test_average_over_all_pairs() {
        // Pairs: (a,b) = 1, (a,c) = 0, (b,c) = 0.
        let photos = [emb(&[1.0, 0.0]), emb(&[2.0, 0.0]), emb(&[0.0, 1.0])];
        let est = MultiPhotoAccuracyEstimator::new(0.65);
        let score = est.readiness_score(&photos).unwrap();
        assert!((score - 1.0 / 3.0).abs() < 1e-6);
        match est.assess(&photos) {
            Readiness::Insufficient { shortfall, .. } => {
                assert!((shortfall - (0.65 - 1.0 / 3.0)).abs() < 1e-6)
            }
            other => panic!("unexpected readiness {other:?}"),
        }
    }

    #[test]
    fn test_consistent_photos_are_sufficient() {
        let photos = [emb(&[1.0, 0.1]), emb(&[1.0, 0.0]), emb(&[0.9, 0.1])];
        let est = MultiPhotoAccuracyEstimator::new(0.65);
        let readiness = est.assess(&photos);
        assert!(matches!(readiness, Readiness::Sufficient { .. }));
        assert!(readiness.permits_finalize());
        assert!(readiness.score().unwrap() > 0.99);
    }
}
