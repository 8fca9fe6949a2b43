//! Synthetic face crops for unit tests.

use image::{GrayImage, Luma};

use crate::types::{BoundingBox, FaceCrop, Landmarks};

/// A finely textured, evenly lit 120×150 face well inside a 400×400 photo.
/// Passes every critical criterion and the lighting check.
pub(crate) fn textured_crop(landmarks: Option<Landmarks>) -> FaceCrop {
    let pixels = GrayImage::from_fn(120, 150, |x, y| {
        let v = 40 + ((x * 7 + y * 13) % 180) as u8;
        if (x / 2 + y / 2) % 2 == 0 {
            Luma([v])
        } else {
            Luma([255 - v])
        }
    });
    FaceCrop::from_parts(
        BoundingBox::from_corners([100.0, 100.0, 220.0, 250.0]),
        400,
        400,
        pixels,
        landmarks,
    )
    .unwrap()
}

/// The same placement with a featureless gray face, which is never sharp.
pub(crate) fn flat_crop() -> FaceCrop {
    FaceCrop::from_parts(
        BoundingBox::from_corners([100.0, 100.0, 220.0, 250.0]),
        400,
        400,
        GrayImage::from_pixel(120, 150, Luma([128])),
        None,
    )
    .unwrap()
}
