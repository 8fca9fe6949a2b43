//! Engine configuration.
//!
//! A single [`RollcallConfig`] is built once at startup (defaults, optionally
//! overlaid from TOML) and handed by reference to every component.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quality::Criterion;

/// Tolerance when checking that the composite weights sum to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("criterion weights must sum to 1.0, got {sum:.6}")]
    WeightSum { sum: f64 },
    #[error("{name} must lie in [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },
    #[error("criterion {0} is listed as both critical and support")]
    OverlappingCriteria(Criterion),
    #[error("at least one critical criterion is required")]
    NoCriticalCriteria,
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("aspect ratio bounds are inverted: min {min} > max {max}")]
    AspectRatioBounds { min: f64, max: f64 },
}

/// Top-level configuration for scoring, enrollment and matching.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RollcallConfig {
    pub quality: QualityConfig,
    pub enrollment: EnrollmentConfig,
    pub matching: MatchConfig,
}

impl RollcallConfig {
    /// Parse a TOML document (missing keys take their defaults) and validate it.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.quality.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }

        let t = &self.quality.thresholds;
        let w = &self.quality.weights;
        let e = &self.enrollment;
        let m = &self.matching;
        let unit_checks: [(&'static str, f64); 20] = [
            ("weights.sharpness", w.sharpness),
            ("weights.eyes_open", w.eyes_open),
            ("weights.face_angle", w.face_angle),
            ("weights.face_integrity", w.face_integrity),
            ("weights.lighting", w.lighting),
            ("thresholds.sharpness", t.sharpness),
            ("thresholds.eye_aspect_ratio", t.eye_aspect_ratio),
            ("thresholds.eyes_image", t.eyes_image),
            ("thresholds.face_angle", t.face_angle),
            ("thresholds.face_integrity", t.face_integrity),
            ("thresholds.lighting", t.lighting),
            ("enrollment.min_overall", e.min_overall),
            ("enrollment.high_overall", e.high_overall),
            ("enrollment.target_accuracy", e.target_accuracy as f64),
            ("matching.base_threshold", m.base_threshold as f64),
            ("matching.group_threshold", m.group_threshold as f64),
            ("matching.normal_consensus.avg", m.normal_consensus.avg as f64),
            ("matching.normal_consensus.min", m.normal_consensus.min as f64),
            ("matching.group_consensus.avg", m.group_consensus.avg as f64),
            ("matching.group_consensus.min", m.group_consensus.min as f64),
        ];
        for (name, value) in unit_checks {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }

        if self.quality.aspect_ratio_min > self.quality.aspect_ratio_max {
            return Err(ConfigError::AspectRatioBounds {
                min: self.quality.aspect_ratio_min,
                max: self.quality.aspect_ratio_max,
            });
        }
        if e.critical.is_empty() {
            return Err(ConfigError::NoCriticalCriteria);
        }
        if let Some(c) = e.critical.iter().find(|c| e.support.contains(c)) {
            return Err(ConfigError::OverlappingCriteria(*c));
        }
        if e.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}

/// Per-criterion weights of the composite score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CriterionWeights {
    pub sharpness: f64,
    pub eyes_open: f64,
    pub face_angle: f64,
    pub face_integrity: f64,
    pub lighting: f64,
}

impl CriterionWeights {
    pub fn weight(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Sharpness => self.sharpness,
            Criterion::EyesOpen => self.eyes_open,
            Criterion::FaceAngle => self.face_angle,
            Criterion::FaceIntegrity => self.face_integrity,
            Criterion::Lighting => self.lighting,
        }
    }

    pub fn sum(&self) -> f64 {
        Criterion::ALL.iter().map(|c| self.weight(*c)).sum()
    }
}

impl Default for CriterionWeights {
    fn default() -> Self {
        Self {
            sharpness: 0.25,
            eyes_open: 0.20,
            face_angle: 0.20,
            face_integrity: 0.15,
            lighting: 0.20,
        }
    }
}

/// Pass thresholds; a criterion passes when its score is strictly above.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CriterionThresholds {
    pub sharpness: f64,
    /// Average eye aspect ratio above which eyes count as open.
    pub eye_aspect_ratio: f64,
    /// Score threshold for the landmark-free eye estimate.
    pub eyes_image: f64,
    pub face_angle: f64,
    pub face_integrity: f64,
    pub lighting: f64,
}

impl Default for CriterionThresholds {
    fn default() -> Self {
        Self {
            sharpness: 0.4,
            eye_aspect_ratio: 0.25,
            eyes_image: 0.4,
            face_angle: 0.3,
            face_integrity: 0.6,
            lighting: 0.4,
        }
    }
}

/// Quality assessment parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Required clearance (pixels) between the face box and each image edge.
    pub margin_px: i64,
    /// Minimum face box width and height (pixels).
    pub min_face_px: i64,
    /// Accepted height/width range of the face box.
    pub aspect_ratio_min: f64,
    pub aspect_ratio_max: f64,
    pub weights: CriterionWeights,
    pub thresholds: CriterionThresholds,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            margin_px: 5,
            min_face_px: 60,
            aspect_ratio_min: 1.0,
            aspect_ratio_max: 1.7,
            weights: CriterionWeights::default(),
            thresholds: CriterionThresholds::default(),
        }
    }
}

/// Which acceptance rule the enrollment gate applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentPolicy {
    /// All critical criteria, plus support or a high overall score.
    #[default]
    Strict,
    /// Bulk-registration rule: enough criteria of any kind plus the overall floor.
    Majority,
}

/// Enrollment gate and capture-session parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    pub policy: EnrollmentPolicy,
    pub critical: Vec<Criterion>,
    pub support: Vec<Criterion>,
    /// Support criteria that must pass unless the overall score is high.
    pub min_support_passed: usize,
    /// Overall quality floor for any acceptance.
    pub min_overall: f64,
    /// Overall quality that substitutes for support criteria.
    pub high_overall: f64,
    /// Criteria that must pass under [`EnrollmentPolicy::Majority`].
    pub majority_min_passed: usize,
    /// Recognition readiness a multi-photo session must reach.
    pub target_accuracy: f32,
    /// Photo attempts allowed per identity in one session.
    pub max_attempts: usize,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            policy: EnrollmentPolicy::Strict,
            critical: vec![
                Criterion::Sharpness,
                Criterion::FaceAngle,
                Criterion::FaceIntegrity,
            ],
            support: vec![Criterion::EyesOpen, Criterion::Lighting],
            min_support_passed: 1,
            min_overall: 0.60,
            high_overall: 0.75,
            majority_min_passed: 3,
            target_accuracy: 0.65,
            max_attempts: 10,
        }
    }
}

/// Average/minimum similarity a multi-sample match must reach.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConsensusThresholds {
    pub avg: f32,
    pub min: f32,
}

/// Matching parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Candidate threshold for photos with few faces.
    pub base_threshold: f32,
    /// Looser candidate threshold for group photos.
    pub group_threshold: f32,
    /// Face count at which a photo is treated as a group scene.
    pub group_face_count: usize,
    pub normal_consensus: ConsensusThresholds,
    pub group_consensus: ConsensusThresholds,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            base_threshold: 0.55,
            group_threshold: 0.25,
            group_face_count: 5,
            normal_consensus: ConsensusThresholds { avg: 0.58, min: 0.52 },
            group_consensus: ConsensusThresholds { avg: 0.30, min: 0.20 },
        }
    }
}
