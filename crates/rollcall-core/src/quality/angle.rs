//! Face angle.
//!
//! A coarse heuristic, not pose estimation: a detected face earns a base
//! score, a landmark set adds a bonus, and a face without landmarks is
//! accepted outright.

use serde::{Deserialize, Serialize};

use super::{CriterionMetrics, CriterionResult};
use crate::types::Landmarks;

const BASE_SCORE: f64 = 0.8;
const LANDMARK_BONUS: f64 = 0.1;
const MIN_LANDMARKS_FOR_BONUS: usize = 50;
const AUTO_ACCEPT_SCORE: f64 = 0.95;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleMetrics {
    pub base_score: f64,
    pub landmark_bonus: f64,
    pub landmark_count: usize,
    pub auto_accepted: bool,
}

pub(super) fn check(landmarks: Option<&Landmarks>, threshold: f64) -> CriterionResult {
    let Some(landmarks) = landmarks else {
        return CriterionResult::new(
            AUTO_ACCEPT_SCORE,
            true,
            "angle auto-accepted (no landmarks)",
            CriterionMetrics::FaceAngle(AngleMetrics {
                base_score: AUTO_ACCEPT_SCORE,
                landmark_bonus: 0.0,
                landmark_count: 0,
                auto_accepted: true,
            }),
        );
    };

    let landmark_bonus = if landmarks.len() >= MIN_LANDMARKS_FOR_BONUS {
        LANDMARK_BONUS
    } else {
        0.0
    };
    let score = (BASE_SCORE + landmark_bonus).min(1.0);
    let suitable = score > threshold;

    CriterionResult::new(
        score,
        suitable,
        message(suitable, score),
        CriterionMetrics::FaceAngle(AngleMetrics {
            base_score: BASE_SCORE,
            landmark_bonus,
            landmark_count: landmarks.len(),
            auto_accepted: false,
        }),
    )
}

fn message(suitable: bool, score: f64) -> &'static str {
    if !suitable {
        "weak detection, angle may be off"
    } else if score > 0.8 {
        "strong detection, angle suitable"
    } else if score > 0.6 {
        "good detection, angle acceptable"
    } else {
        "face detected, angle tolerable"
    }
}
