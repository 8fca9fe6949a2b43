//! Sharpness from Laplacian variance, Sobel gradient and spectral energy.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::{ops, CriterionMetrics, CriterionResult};

const LAPLACIAN_NORM: f64 = 1000.0;
const SOBEL_NORM: f64 = 50.0;
const SPECTRUM_NORM: f64 = 100_000.0;

const LAPLACIAN_WEIGHT: f64 = 0.4;
const SOBEL_WEIGHT: f64 = 0.4;
const SPECTRUM_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharpnessMetrics {
    pub laplacian_variance: f64,
    pub sobel_magnitude: f64,
    pub high_freq_energy: f64,
}

pub(super) fn check(pixels: &GrayImage, threshold: f64) -> CriterionResult {
    let laplacian_variance = ops::laplacian_variance(pixels);
    let sobel_magnitude = ops::sobel_magnitude(pixels);
    let high_freq_energy = ops::high_frequency_energy(&ops::plane(pixels));

    let score = LAPLACIAN_WEIGHT * (laplacian_variance / LAPLACIAN_NORM).min(1.0)
        + SOBEL_WEIGHT * (sobel_magnitude / SOBEL_NORM).min(1.0)
        + SPECTRUM_WEIGHT * (high_freq_energy / SPECTRUM_NORM).min(1.0);

    CriterionResult::new(
        score,
        score > threshold,
        message(score),
        CriterionMetrics::Sharpness(SharpnessMetrics {
            laplacian_variance,
            sobel_magnitude,
            high_freq_energy,
        }),
    )
}

fn message(score: f64) -> &'static str {
    if score > 0.8 {
        "very sharp"
    } else if score > 0.6 {
        "sharp enough"
    } else if score > 0.4 {
        "slightly blurred"
    } else {
        "very blurred"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_flat_crop_is_blurred() {
        let result = check(&GrayImage::from_pixel(64, 64, Luma([128])), 0.4);
        assert!(!result.passed);
        assert!(result.score < 0.01);
        assert_eq!(result.message, "very blurred");
    }

    #[test]
    fn test_fine_texture_is_sharp() {
        let img = GrayImage::from_fn(64, 64, |x, y| {
            if (x / 2 + y / 2) % 2 == 0 {
                Luma([230])
            } else {
                Luma([20])
            }
        });
        let result = check(&img, 0.4);
        assert!(result.passed);
        assert!(result.score >= 0.8, "score {}", result.score);
        assert_eq!(result.message, "very sharp");
        let CriterionMetrics::Sharpness(m) = &result.metrics else {
            panic!("unexpected metrics {:?}", result.metrics);
        };
        assert!(m.laplacian_variance > LAPLACIAN_NORM);
    }

    #[test]
    fn test_message_bands() {
        assert_eq!(message(0.81), "very sharp");
        assert_eq!(message(0.8), "sharp enough");
        assert_eq!(message(0.5), "slightly blurred");
        assert_eq!(message(0.4), "very blurred");
    }
}
