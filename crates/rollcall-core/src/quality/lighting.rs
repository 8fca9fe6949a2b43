//! Lighting quality from brightness, contrast, exposure and histogram spread.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::{ops, CriterionMetrics, CriterionResult};

const TARGET_BRIGHTNESS: f64 = 130.0;
const CONTRAST_NORM: f64 = 50.0;
const OVER_EXPOSED_ABOVE: u8 = 240;
const UNDER_EXPOSED_BELOW: u8 = 20;

const BRIGHTNESS_WEIGHT: f64 = 0.3;
const CONTRAST_WEIGHT: f64 = 0.3;
const EXPOSURE_WEIGHT: f64 = 0.3;
const SPREAD_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightingMetrics {
    pub mean_brightness: f64,
    /// Standard deviation of the gray levels.
    pub contrast: f64,
    pub over_exposed: f64,
    pub under_exposed: f64,
    /// Fraction of the 256 histogram bins that are occupied.
    pub histogram_spread: f64,
}

pub(super) fn check(pixels: &GrayImage, threshold: f64) -> CriterionResult {
    let plane = ops::plane(pixels);
    let mean_brightness = ops::mean(&plane);
    let contrast = ops::std_dev(&plane);

    let total = (pixels.width() as u64 * pixels.height() as u64).max(1) as f64;
    let hist = ops::histogram(pixels);
    let over: u32 = hist[OVER_EXPOSED_ABOVE as usize + 1..].iter().sum();
    let under: u32 = hist[..UNDER_EXPOSED_BELOW as usize].iter().sum();
    let over_exposed = over as f64 / total;
    let under_exposed = under as f64 / total;
    let histogram_spread = ops::nonzero_bins(&hist) as f64 / 256.0;

    let brightness_score =
        (1.0 - (mean_brightness - TARGET_BRIGHTNESS).abs() / TARGET_BRIGHTNESS).clamp(0.0, 1.0);
    let contrast_score = (contrast / CONTRAST_NORM).min(1.0);
    let exposure_score = (1.0 - 2.0 * (over_exposed + under_exposed)).max(0.0);

    let score = BRIGHTNESS_WEIGHT * brightness_score
        + CONTRAST_WEIGHT * contrast_score
        + EXPOSURE_WEIGHT * exposure_score
        + SPREAD_WEIGHT * histogram_spread;
    let adequate = score > threshold;

    let metrics = LightingMetrics {
        mean_brightness,
        contrast,
        over_exposed,
        under_exposed,
        histogram_spread,
    };
    CriterionResult::new(
        score,
        adequate,
        message(adequate, &metrics),
        CriterionMetrics::Lighting(metrics),
    )
}

fn message(adequate: bool, m: &LightingMetrics) -> String {
    if adequate {
        return "lighting adequate".to_string();
    }
    let mut problems = Vec::new();
    if m.mean_brightness < 60.0 {
        problems.push("too dark");
    } else if m.mean_brightness > 200.0 {
        problems.push("too bright");
    }
    if m.contrast < 30.0 {
        problems.push("low contrast");
    }
    if m.over_exposed > 0.1 {
        problems.push("over-exposed");
    }
    if m.under_exposed > 0.2 {
        problems.push("under-lit");
    }
    format!("lighting problem: {}", problems.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_mid_gray_is_adequate() {
        let result = check(&GrayImage::from_pixel(40, 40, Luma([130])), 0.4);
        // brightness 1, contrast 0, exposure 1, spread 1/256
        let expected = 0.3 + 0.3 + 0.1 / 256.0;
        assert!((result.score - expected).abs() < 1e-9, "score {}", result.score);
        assert!(result.passed);
        assert_eq!(result.message, "lighting adequate");
    }

    #[test]
    fn test_black_frame_fails() {
        let result = check(&GrayImage::from_pixel(40, 40, Luma([0])), 0.4);
        assert!(!result.passed);
        assert!(result.score < 0.01);
        assert_eq!(result.message, "lighting problem: too dark, low contrast, under-lit");
    }

    #[test]
    fn test_blown_out_frame_fails() {
        let result = check(&GrayImage::from_pixel(40, 40, Luma([255])), 0.4);
        assert!(!result.passed);
        let CriterionMetrics::Lighting(m) = &result.metrics else {
            panic!("unexpected metrics {:?}", result.metrics);
        };
        assert_eq!(m.over_exposed, 1.0);
        assert_eq!(m.under_exposed, 0.0);
        assert_eq!(result.message, "lighting problem: too bright, low contrast, over-exposed");
    }

    #[test]
    fn test_gradient_is_well_lit() {
        let img = GrayImage::from_fn(256, 8, |x, _| Luma([x as u8]));
        let result = check(&img, 0.4);
        assert!(result.passed);
        let CriterionMetrics::Lighting(m) = &result.metrics else {
            panic!("unexpected metrics {:?}", result.metrics);
        };
        assert_eq!(m.histogram_spread, 1.0);
        assert!((m.mean_brightness - 127.5).abs() < 1e-9);
    }
}
