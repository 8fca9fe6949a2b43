//! Weighted aggregation of criterion results into a [`QualityReport`].

use crate::config::CriterionWeights;
use crate::quality::{QualityCriteria, QualityReport, QualitySummary};

pub struct CompositeScorer<'a> {
    weights: &'a CriterionWeights,
}

impl<'a> CompositeScorer<'a> {
    pub fn new(weights: &'a CriterionWeights) -> Self {
        Self { weights }
    }

    /// Weighted sum of the criterion scores, clamped to [0, 1].
    pub fn overall(&self, criteria: &QualityCriteria) -> f64 {
        criteria
            .iter()
            .map(|(c, r)| self.weights.weight(c) * r.score)
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }

    pub fn score(&self, criteria: QualityCriteria) -> QualityReport {
        let overall_quality = self.overall(&criteria);
        let summary = QualitySummary::from_criteria(&criteria);
        QualityReport {
            overall_quality,
            criteria,
            summary,
        }
    }
}
