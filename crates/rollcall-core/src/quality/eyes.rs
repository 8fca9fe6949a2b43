//! Eye openness.
//!
//! With a full landmark set the eye aspect ratio (EAR) of both eyes is used.
//! Without landmarks a coarse estimate is taken from edge density and
//! histogram spread over the band where the eyes usually sit.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::{ops, CriterionMetrics, CriterionResult};
use crate::config::CriterionThresholds;
use crate::types::{FaceCrop, Landmarks, Point};

const LEFT_EYE: Range<usize> = 33..43;
const RIGHT_EYE: Range<usize> = 43..53;

/// EAR that maps to a full score.
const EAR_FULL_SCORE: f64 = 0.25;

/// Eye band as fractions of crop height and width.
const BAND_ROWS: (f64, f64) = (0.2, 0.5);
const BAND_COLS: (f64, f64) = (0.1, 0.9);

const EDGE_DENSITY_GAIN: f64 = 20.0;
const HISTOGRAM_VARIANCE_NORM: f64 = 100_000.0;
const EDGE_WEIGHT: f64 = 0.7;
const HISTOGRAM_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarMetrics {
    pub left_ear: f64,
    pub right_ear: f64,
    pub average_ear: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EyeImageMetrics {
    pub edge_density: f64,
    pub histogram_variance: f64,
}

pub(super) fn check(crop: &FaceCrop, thresholds: &CriterionThresholds) -> CriterionResult {
    match crop.landmarks() {
        Some(landmarks) => check_landmarks(landmarks, thresholds.eye_aspect_ratio),
        None => check_image(crop, thresholds.eyes_image),
    }
}

fn check_landmarks(landmarks: &Landmarks, threshold: f64) -> CriterionResult {
    let points = landmarks.points();
    let left_ear = points.get(LEFT_EYE).map_or(0.0, eye_aspect_ratio);
    let right_ear = points.get(RIGHT_EYE).map_or(0.0, eye_aspect_ratio);
    let average_ear = (left_ear + right_ear) / 2.0;

    let open = average_ear > threshold;
    let score = (average_ear / EAR_FULL_SCORE).min(1.0);

    CriterionResult::new(
        score,
        open,
        message(open, score),
        CriterionMetrics::EyesLandmarks(EarMetrics {
            left_ear,
            right_ear,
            average_ear,
        }),
    )
}

/// `(|p1-p5| + |p2-p4|) / (2 |p0-p3|)` over the first six points of an eye.
/// A zero horizontal span gives 0.
fn eye_aspect_ratio(eye: &[Point]) -> f64 {
    let [p0, p1, p2, p3, p4, p5] = match eye.get(..6) {
        Some(&[a, b, c, d, e, f]) => [a, b, c, d, e, f],
        _ => return 0.0,
    };
    let horizontal = distance(p0, p3);
    if horizontal <= 0.0 {
        return 0.0;
    }
    (distance(p1, p5) + distance(p2, p4)) / (2.0 * horizontal)
}

fn distance(a: Point, b: Point) -> f64 {
    let dx = (a.0 - b.0) as f64;
    let dy = (a.1 - b.1) as f64;
    dx.hypot(dy)
}

fn check_image(crop: &FaceCrop, threshold: f64) -> CriterionResult {
    let Some(band) = ops::band(crop.pixels(), BAND_ROWS, BAND_COLS) else {
        tracing::warn!("eye band is empty");
        return CriterionResult::new(
            0.0,
            false,
            "eye region could not be analysed",
            CriterionMetrics::EyesImage(EyeImageMetrics::default()),
        );
    };

    let edge_density = ops::edge_density(&band);
    let histogram_variance = ops::histogram_variance(&ops::histogram(&band));

    let edge_score = (edge_density * EDGE_DENSITY_GAIN).min(1.0);
    let hist_score = (histogram_variance / HISTOGRAM_VARIANCE_NORM).min(1.0);
    let score = EDGE_WEIGHT * edge_score + HISTOGRAM_WEIGHT * hist_score;
    let open = score > threshold;

    CriterionResult::new(
        score,
        open,
        message(open, score),
        CriterionMetrics::EyesImage(EyeImageMetrics {
            edge_density,
            histogram_variance,
        }),
    )
}

fn message(open: bool, score: f64) -> &'static str {
    match (open, score > 0.7) {
        (true, true) => "eyes open",
        (true, false) => "eyes open (low confidence)",
        (false, _) => "eyes closed or unclear",
    }
}
