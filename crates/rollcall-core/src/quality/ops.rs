//! Pixel-level measurements shared by the quality criteria.
//!
//! Kernels come from `imageproc`; statistics and the spectrum are computed
//! on `ndarray` planes in `f64`.

use image::{GrayImage, ImageBuffer, Luma, Primitive};
use imageproc::{edges, filter, gradients, stats};
use ndarray::{Array1, Array2, Zip};
use rustfft::{num_complex::Complex, FftPlanner};

/// Copy a single-channel image into a `(rows, cols)` plane.
pub(crate) fn plane<T>(img: &ImageBuffer<Luma<T>, Vec<T>>) -> Array2<f64>
where
    T: Primitive + Into<f64>,
{
    let (w, h) = img.dimensions();
    Array2::from_shape_fn((h as usize, w as usize), |(r, c)| {
        img.get_pixel(c as u32, r as u32).0[0].into()
    })
}

pub(crate) fn mean(plane: &Array2<f64>) -> f64 {
    plane.mean().unwrap_or(0.0)
}

/// Population standard deviation.
pub(crate) fn std_dev(plane: &Array2<f64>) -> f64 {
    if plane.is_empty() {
        return 0.0;
    }
    plane.std(0.0)
}

/// Variance of the 3×3 Laplacian response.
pub(crate) fn laplacian_variance(img: &GrayImage) -> f64 {
    let response = plane(&filter::laplacian_filter(img));
    if response.is_empty() {
        return 0.0;
    }
    response.var(0.0)
}

/// Mean magnitude of the 3×3 Sobel gradient.
pub(crate) fn sobel_magnitude(img: &GrayImage) -> f64 {
    let gx = plane(&gradients::horizontal_sobel(img));
    let gy = plane(&gradients::vertical_sobel(img));
    let magnitude = Zip::from(&gx)
        .and(&gy)
        .map_collect(|x, y| (x * x + y * y).sqrt());
    mean(&magnitude)
}

/// Sum of the log-magnitude spectrum values above its 80th percentile.
///
/// Quadrant order of the spectrum does not matter here, so no shift is
/// applied.
pub(crate) fn high_frequency_energy(plane: &Array2<f64>) -> f64 {
    let (rows, cols) = plane.dim();
    if rows == 0 || cols == 0 {
        return 0.0;
    }

    let mut spectrum = plane.mapv(|v| Complex::new(v, 0.0));
    let mut planner = FftPlanner::<f64>::new();

    let row_fft = planner.plan_fft_forward(cols);
    for mut row in spectrum.rows_mut() {
        let mut buf = row.to_vec();
        row_fft.process(&mut buf);
        row.assign(&Array1::from(buf));
    }

    let col_fft = planner.plan_fft_forward(rows);
    for mut col in spectrum.columns_mut() {
        let mut buf = col.to_vec();
        col_fft.process(&mut buf);
        col.assign(&Array1::from(buf));
    }

    let mut log_mag: Vec<f64> = spectrum.iter().map(|c| c.norm().ln_1p()).collect();
    log_mag.sort_by(|a, b| a.total_cmp(b));
    let cutoff = percentile(&log_mag, 80.0);
    log_mag.iter().filter(|v| **v > cutoff).sum()
}

/// Linearly interpolated percentile of an ascending slice.
pub(crate) fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// Fraction of pixels marked by the Canny detector (hysteresis 50/150).
pub(crate) fn edge_density(img: &GrayImage) -> f64 {
    let total = img.width() as u64 * img.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let edges = edges::canny(img, 50.0, 150.0);
    let marked = edges.pixels().filter(|p| p.0[0] > 0).count();
    marked as f64 / total as f64
}

pub(crate) fn histogram(img: &GrayImage) -> [u32; 256] {
    stats::histogram(img)
        .channels
        .first()
        .copied()
        .unwrap_or([0; 256])
}

/// Population variance of the bin counts.
pub(crate) fn histogram_variance(hist: &[u32; 256]) -> f64 {
    Array1::from_iter(hist.iter().map(|c| *c as f64)).var(0.0)
}

pub(crate) fn nonzero_bins(hist: &[u32; 256]) -> usize {
    hist.iter().filter(|c| **c > 0).count()
}

/// Sub-image spanning fractional row and column ranges, truncated to whole
/// pixels. Returns `None` when the range is empty.
pub(crate) fn band(img: &GrayImage, rows: (f64, f64), cols: (f64, f64)) -> Option<GrayImage> {
    let (w, h) = (img.width() as f64, img.height() as f64);
    let (r0, r1) = ((h * rows.0) as u32, (h * rows.1) as u32);
    let (c0, c1) = ((w * cols.0) as u32, (w * cols.1) as u32);
    if r1 <= r0 || c1 <= c0 {
        return None;
    }
    Some(image::imageops::crop_imm(img, c0, r0, c1 - c0, r1 - r0).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: u32, cell: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_percentile_matches_linear_interpolation() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((percentile(&v, 80.0) - 4.2).abs() < 1e-12);
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 100.0), 5.0);
        assert_eq!(percentile(&[7.0], 80.0), 7.0);
    }

    #[test]
    fn test_flat_image_has_no_detail() {
        let img = GrayImage::from_pixel(32, 32, Luma([128]));
        assert_eq!(laplacian_variance(&img), 0.0);
        assert_eq!(sobel_magnitude(&img), 0.0);
        assert_eq!(edge_density(&img), 0.0);
    }

    #[test]
    fn test_flat_spectrum_concentrates_in_dc() {
        // Only the DC bin is non-zero, and it is the single value above the
        // 80th percentile.
        let p = Array2::from_elem((8, 8), 10.0);
        let energy = high_frequency_energy(&p);
        assert!((energy - (640.0f64).ln_1p()).abs() < 1e-9, "energy {energy}");
    }

    #[test]
    fn test_checkerboard_is_detailed() {
        let img = checkerboard(32, 2);
        assert!(laplacian_variance(&img) > 1000.0);
        assert!(sobel_magnitude(&img) > 50.0);
    }

    #[test]
    fn test_histogram_counts() {
        let img = checkerboard(16, 4);
        let hist = histogram(&img);
        assert_eq!(hist[0], 128);
        assert_eq!(hist[255], 128);
        assert_eq!(nonzero_bins(&hist), 2);
    }

    #[test]
    fn test_band_truncates_fractions() {
        let img = GrayImage::new(10, 10);
        let eye = band(&img, (0.2, 0.5), (0.1, 0.9)).unwrap();
        assert_eq!(eye.dimensions(), (8, 3));
        assert!(band(&GrayImage::new(1, 1), (0.2, 0.5), (0.1, 0.9)).is_none());
    }
}
