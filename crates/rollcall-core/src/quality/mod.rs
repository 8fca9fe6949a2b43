//! Photo quality assessment.
//!
//! Five independent checks run over a [`FaceCrop`]: sharpness, eye
//! openness, face angle, face integrity and lighting. Each yields a
//! [`CriterionResult`]; the [`CompositeScorer`] folds them into a
//! [`QualityReport`].

mod angle;
mod eyes;
mod integrity;
mod lighting;
pub(crate) mod ops;
mod sharpness;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::QualityConfig;
use crate::scoring::CompositeScorer;
use crate::types::FaceCrop;

pub use angle::AngleMetrics;
pub use eyes::{EarMetrics, EyeImageMetrics};
pub use integrity::IntegrityMetrics;
pub use lighting::LightingMetrics;
pub use sharpness::SharpnessMetrics;

const UNDETECTABLE_MESSAGE: &str = "face not detected";

/// One of the five quality checks, in canonical report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Sharpness,
    EyesOpen,
    FaceAngle,
    FaceIntegrity,
    Lighting,
}

impl Criterion {
    pub const ALL: [Criterion; 5] = [
        Criterion::Sharpness,
        Criterion::EyesOpen,
        Criterion::FaceAngle,
        Criterion::FaceIntegrity,
        Criterion::Lighting,
    ];

    /// Machine name, as used in configuration and persisted reports.
    pub fn name(self) -> &'static str {
        match self {
            Criterion::Sharpness => "sharpness",
            Criterion::EyesOpen => "eyes_open",
            Criterion::FaceAngle => "face_angle",
            Criterion::FaceIntegrity => "face_integrity",
            Criterion::Lighting => "lighting",
        }
    }

    /// Human-readable label for reports.
    pub fn label(self) -> &'static str {
        match self {
            Criterion::Sharpness => "Face sharpness",
            Criterion::EyesOpen => "Eyes open",
            Criterion::FaceAngle => "Face angle",
            Criterion::FaceIntegrity => "Face integrity",
            Criterion::Lighting => "Lighting quality",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Diagnostic values behind a criterion score. Reported, never used by
/// policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriterionMetrics {
    Undetectable,
    Sharpness(SharpnessMetrics),
    EyesLandmarks(EarMetrics),
    EyesImage(EyeImageMetrics),
    FaceAngle(AngleMetrics),
    FaceIntegrity(IntegrityMetrics),
    Lighting(LightingMetrics),
}

/// Outcome of one quality check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    /// Always within [0, 1].
    pub score: f64,
    pub passed: bool,
    pub message: String,
    pub metrics: CriterionMetrics,
}

impl CriterionResult {
    pub fn new(score: f64, passed: bool, message: impl Into<String>, metrics: CriterionMetrics) -> Self {
        let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            score,
            passed,
            message: message.into(),
            metrics,
        }
    }

    fn undetectable() -> Self {
        Self::new(0.0, false, UNDETECTABLE_MESSAGE, CriterionMetrics::Undetectable)
    }
}

/// The five criterion results of one face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCriteria {
    pub sharpness: CriterionResult,
    pub eyes_open: CriterionResult,
    pub face_angle: CriterionResult,
    pub face_integrity: CriterionResult,
    pub lighting: CriterionResult,
}

impl QualityCriteria {
    pub fn get(&self, criterion: Criterion) -> &CriterionResult {
        match criterion {
            Criterion::Sharpness => &self.sharpness,
            Criterion::EyesOpen => &self.eyes_open,
            Criterion::FaceAngle => &self.face_angle,
            Criterion::FaceIntegrity => &self.face_integrity,
            Criterion::Lighting => &self.lighting,
        }
    }

    /// Results in canonical criterion order.
    pub fn iter(&self) -> impl Iterator<Item = (Criterion, &CriterionResult)> + '_ {
        Criterion::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    /// Every criterion at score 0, failed.
    pub fn undetectable() -> Self {
        Self {
            sharpness: CriterionResult::undetectable(),
            eyes_open: CriterionResult::undetectable(),
            face_angle: CriterionResult::undetectable(),
            face_integrity: CriterionResult::undetectable(),
            lighting: CriterionResult::undetectable(),
        }
    }
}

/// Names of passed and failed criteria, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub passed: Vec<Criterion>,
    pub failed: Vec<Criterion>,
}

impl QualitySummary {
    pub fn from_criteria(criteria: &QualityCriteria) -> Self {
        let (passed, failed) = criteria
            .iter()
            .map(|(c, r)| (c, r.passed))
            .partition::<Vec<_>, _>(|(_, passed)| *passed);
        Self {
            passed: passed.into_iter().map(|(c, _)| c).collect(),
            failed: failed.into_iter().map(|(c, _)| c).collect(),
        }
    }
}

/// Full quality assessment of one face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Weighted composite of the criterion scores, within [0, 1].
    pub overall_quality: f64,
    pub criteria: QualityCriteria,
    pub summary: QualitySummary,
}

impl QualityReport {
    /// The canonical report for a missing, empty or undersized face region.
    pub fn undetectable() -> Self {
        let criteria = QualityCriteria::undetectable();
        let summary = QualitySummary::from_criteria(&criteria);
        Self {
            overall_quality: 0.0,
            criteria,
            summary,
        }
    }

    pub fn passed(&self, criterion: Criterion) -> bool {
        self.criteria.get(criterion).passed
    }

    pub fn passed_count(&self) -> usize {
        self.criteria.iter().filter(|(_, r)| r.passed).count()
    }

    /// Re-derive the summary from the per-criterion flags.
    pub fn recompute_summary(&self) -> QualitySummary {
        QualitySummary::from_criteria(&self.criteria)
    }
}

/// Runs the five quality checks.
pub struct QualityAssessor<'a> {
    config: &'a QualityConfig,
}

impl<'a> QualityAssessor<'a> {
    pub fn new(config: &'a QualityConfig) -> Self {
        Self { config }
    }

    /// Run every check on `crop` without aggregating.
    pub fn evaluate(&self, crop: &FaceCrop) -> QualityCriteria {
        let thresholds = &self.config.thresholds;
        let pixels = crop.pixels();
        QualityCriteria {
            sharpness: sharpness::check(pixels, thresholds.sharpness),
            eyes_open: eyes::check(crop, thresholds),
            face_angle: angle::check(crop.landmarks(), thresholds.face_angle),
            face_integrity: integrity::check(crop, self.config),
            lighting: lighting::check(pixels, thresholds.lighting),
        }
    }

    /// Assess a face. `None` (no usable region) yields the undetectable report.
    pub fn assess(&self, crop: Option<&FaceCrop>) -> QualityReport {
        let Some(crop) = crop else {
            tracing::warn!("no usable face region, reporting undetectable");
            return QualityReport::undetectable();
        };

        let criteria = self.evaluate(crop);
        for (criterion, result) in criteria.iter() {
            tracing::debug!(
                %criterion,
                score = result.score,
                passed = result.passed,
                message = %result.message,
                "criterion evaluated"
            );
        }

        let report = CompositeScorer::new(&self.config.weights).score(criteria);
        tracing::debug!(
            overall = report.overall_quality,
            passed = report.summary.passed.len(),
            "quality assessed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::textured_crop;
    use crate::types::{Landmarks, LANDMARK_COUNT};

    #[test]
    fn test_undetectable_report_is_canonical() {
        let config = QualityConfig::default();
        let report = QualityAssessor::new(&config).assess(None);
        assert_eq!(report.overall_quality, 0.0);
        assert!(report.summary.passed.is_empty());
        assert_eq!(report.summary.failed, Criterion::ALL.to_vec());
        for (_, result) in report.criteria.iter() {
            assert_eq!(result.score, 0.0);
            assert!(!result.passed);
            assert_eq!(result.message, "face not detected");
        }
    }

    #[test]
    fn test_scores_stay_in_unit_range() {
        let config = QualityConfig::default();
        let assessor = QualityAssessor::new(&config);
        let report = assessor.assess(Some(&textured_crop(None)));
        assert!((0.0..=1.0).contains(&report.overall_quality));
        for (criterion, result) in report.criteria.iter() {
            assert!((0.0..=1.0).contains(&result.score), "{criterion}: {}", result.score);
        }
    }

    #[test]
    fn test_missing_landmarks_auto_accept_angle() {
        let config = QualityConfig::default();
        let criteria = QualityAssessor::new(&config).evaluate(&textured_crop(None));
        assert!(criteria.face_angle.passed);
        assert!((criteria.face_angle.score - 0.95).abs() < 1e-12);
        assert!(matches!(criteria.eyes_open.metrics, CriterionMetrics::EyesImage(_)));
    }

    #[test]
    fn test_landmarks_select_ear_path() {
        let points = vec![(150.0, 150.0); LANDMARK_COUNT];
        let crop = textured_crop(Landmarks::new(points));
        let config = QualityConfig::default();
        let criteria = QualityAssessor::new(&config).evaluate(&crop);
        assert!(matches!(criteria.eyes_open.metrics, CriterionMetrics::EyesLandmarks(_)));
        assert!((criteria.face_angle.score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_summary_follows_flags() {
        let config = QualityConfig::default();
        let report = QualityAssessor::new(&config).assess(Some(&textured_crop(None)));
        assert_eq!(report.summary, report.recompute_summary());
        assert_eq!(
            report.summary.passed.len() + report.summary.failed.len(),
            Criterion::ALL.len()
        );
        assert_eq!(report.passed_count(), report.summary.passed.len());
    }

    #[test]
    fn test_report_json_round_trip_keeps_summary() {
        let config = QualityConfig::default();
        let report = QualityAssessor::new(&config).assess(Some(&textured_crop(None)));
        let json = serde_json::to_string(&report).unwrap();
        let back: QualityReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary, back.recompute_summary());
        assert_eq!(back.summary, report.summary);
    }

    #[test]
    fn test_criterion_names() {
        assert_eq!(Criterion::EyesOpen.to_string(), "eyes_open");
        let parsed: Criterion = serde_json::from_str("\"face_integrity\"").unwrap();
        assert_eq!(parsed, Criterion::FaceIntegrity);
    }
}
