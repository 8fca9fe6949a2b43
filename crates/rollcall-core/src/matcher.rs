//! Identity matching against the enrolled gallery.
//!
//! A probe is compared with every enrolled embedding. Entries above the
//! candidate threshold are candidates; the most similar one wins unless the
//! same person has several candidates, in which case they must also agree
//! with each other (consensus) or the probe is left unmatched.

use crate::config::{ConsensusThresholds, MatchConfig};
use crate::types::{Embedding, GalleryEntry, MatchCandidate, MatchMethod, MatchResult};

/// Strategy for matching one probe face against the gallery.
pub trait Matcher {
    /// `face_count` is the number of faces detected in the probe's photo.
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry<'_>], face_count: usize) -> MatchResult;
}

/// Cosine-similarity matcher with scene-adaptive thresholds.
pub struct SimilarityMatcher<'a> {
    config: &'a MatchConfig,
}

impl<'a> SimilarityMatcher<'a> {
    pub fn new(config: &'a MatchConfig) -> Self {
        Self { config }
    }

    /// Cosine similarity; 0 when either vector is empty or has zero norm.
    pub fn similarity(&self, a: &Embedding, b: &Embedding) -> f32 {
        a.similarity(b)
    }

    fn is_group_scene(&self, face_count: usize) -> bool {
        face_count >= self.config.group_face_count
    }

    /// Candidate threshold for a photo with `face_count` faces.
    pub fn threshold_for(&self, face_count: usize) -> f32 {
        if self.is_group_scene(face_count) {
            self.config.group_threshold
        } else {
            self.config.base_threshold
        }
    }

    pub fn consensus_for(&self, face_count: usize) -> ConsensusThresholds {
        if self.is_group_scene(face_count) {
            self.config.group_consensus
        } else {
            self.config.normal_consensus
        }
    }

    /// Best match for `probe` among entries strictly above `base_threshold`.
    ///
    /// Ties keep the first entry encountered. When two or more candidates
    /// belong to the best candidate's person, their average and minimum
    /// similarity must clear the consensus thresholds for `face_count`; the
    /// average then becomes the confidence. Failing consensus yields
    /// [`MatchResult::NoMatch`] even though a single entry beat the threshold.
    pub fn find_best_match(
        &self,
        probe: &Embedding,
        gallery: &[GalleryEntry<'_>],
        base_threshold: f32,
        face_count: usize,
    ) -> MatchResult {
        let mut candidates: Vec<MatchCandidate> = Vec::new();
        let mut best: Option<usize> = None;

        // Every entry is visited; no early exit.
        for entry in gallery {
            let similarity = self.similarity(probe, entry.embedding);
            if similarity <= base_threshold {
                continue;
            }
            let beats_best = best.map_or(true, |i| similarity > candidates[i].similarity);
            candidates.push(MatchCandidate {
                person_id: entry.person_id.to_string(),
                name: entry.name.to_string(),
                similarity,
            });
            if beats_best {
                best = Some(candidates.len() - 1);
            }
        }

        let Some(best) = best.map(|i| &candidates[i]) else {
            tracing::debug!(gallery = gallery.len(), base_threshold, "no candidate above threshold");
            return MatchResult::NoMatch;
        };

        let same_person: Vec<f32> = candidates
            .iter()
            .filter(|c| c.person_id == best.person_id)
            .map(|c| c.similarity)
            .collect();

        if same_person.len() < 2 {
            tracing::debug!(
                person_id = %best.person_id,
                similarity = best.similarity,
                "single-sample match"
            );
            return MatchResult::Matched {
                person_id: best.person_id.clone(),
                name: best.name.clone(),
                confidence: best.similarity,
                method: MatchMethod::Single,
            };
        }

        let avg = same_person.iter().sum::<f32>() / same_person.len() as f32;
        let min = same_person.iter().copied().fold(f32::INFINITY, f32::min);
        let required = self.consensus_for(face_count);

        if avg >= required.avg && min >= required.min {
            tracing::debug!(
                person_id = %best.person_id,
                samples = same_person.len(),
                avg,
                min,
                "consensus match"
            );
            MatchResult::Matched {
                person_id: best.person_id.clone(),
                name: best.name.clone(),
                confidence: avg,
                method: MatchMethod::Consensus {
                    samples: same_person.len(),
                },
            }
        } else {
            tracing::debug!(
                person_id = %best.person_id,
                samples = same_person.len(),
                avg,
                min,
                required_avg = required.avg,
                required_min = required.min,
                "consensus failed"
            );
            MatchResult::NoMatch
        }
    }

    /// Match every face of one photograph, using the photo's face count to
    /// pick thresholds.
    pub fn identify_scene(&self, probes: &[Embedding], gallery: &[GalleryEntry<'_>]) -> Vec<MatchResult> {
        let face_count = probes.len();
        let results: Vec<MatchResult> = probes
            .iter()
            .map(|probe| self.compare(probe, gallery, face_count))
            .collect();
        tracing::info!(
            faces = face_count,
            group = self.is_group_scene(face_count),
            matched = results.iter().filter(|r| r.is_match()).count(),
            "scene identified"
        );
        results
    }
}

impl Matcher for SimilarityMatcher<'_> {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry<'_>], face_count: usize) -> MatchResult {
        self.find_best_match(probe, gallery, self.threshold_for(face_count), face_count)
    }
}
