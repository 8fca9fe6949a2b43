//! Face integrity: is the whole face inside the photo, large enough and
//! plausibly proportioned?

use serde::{Deserialize, Serialize};

use super::{CriterionMetrics, CriterionResult};
use crate::config::QualityConfig;
use crate::types::FaceCrop;

const SUB_CHECKS: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityMetrics {
    pub boundaries_ok: bool,
    pub size_ok: bool,
    pub aspect_ratio_ok: bool,
    pub landmarks_ok: bool,
    pub face_width: i64,
    pub face_height: i64,
    /// Height over width; 0 for a zero-width box.
    pub aspect_ratio: f64,
}

pub(super) fn check(crop: &FaceCrop, config: &QualityConfig) -> CriterionResult {
    let px = crop.bbox().to_pixels();
    let (img_w, img_h) = crop.image_size();
    let (img_w, img_h) = (img_w as i64, img_h as i64);
    let margin = config.margin_px;

    let boundaries_ok = px.x1 >= margin
        && px.x2 <= img_w - margin
        && px.y1 >= margin
        && px.y2 <= img_h - margin;

    let face_width = px.width();
    let face_height = px.height();
    let size_ok = face_width >= config.min_face_px && face_height >= config.min_face_px;

    let aspect_ratio = if face_width > 0 {
        face_height as f64 / face_width as f64
    } else {
        0.0
    };
    let aspect_ratio_ok = (config.aspect_ratio_min..=config.aspect_ratio_max).contains(&aspect_ratio);

    let landmarks_ok = crop
        .landmarks()
        .map_or(true, |l| l.points().iter().all(|p| px.contains(*p)));

    let passed_checks = [boundaries_ok, size_ok, aspect_ratio_ok, landmarks_ok]
        .iter()
        .filter(|ok| **ok)
        .count();
    let score = passed_checks as f64 / SUB_CHECKS;

    let metrics = IntegrityMetrics {
        boundaries_ok,
        size_ok,
        aspect_ratio_ok,
        landmarks_ok,
        face_width,
        face_height,
        aspect_ratio,
    };
    CriterionResult::new(
        score,
        score > config.thresholds.face_integrity,
        message(score, &metrics),
        CriterionMetrics::FaceIntegrity(metrics),
    )
}

fn message(score: f64, m: &IntegrityMetrics) -> String {
    if score > 0.9 {
        return "face fully visible".to_string();
    }
    if score > 0.75 {
        return "face sufficiently visible".to_string();
    }
    let problems: Vec<&str> = [
        (!m.boundaries_ok, "cropped"),
        (!m.size_ok, "too small"),
        (!m.aspect_ratio_ok, "bad proportions"),
        (!m.landmarks_ok, "landmarks outside box"),
    ]
    .into_iter()
    .filter_map(|(problem, label)| problem.then_some(label))
    .collect();
    format!("face problem: {}", problems.join(", "))
}
