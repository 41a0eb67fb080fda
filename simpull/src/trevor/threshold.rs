use crate::morphology::opening;
use crate::raster::{luma_from_vec, FloatImage, Mask};
use std::cmp::Ordering;

/// Location and width of the background intensity distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianFit {
    pub mean: f64,
    pub sigma: f64,
}

impl GaussianFit {
    pub fn threshold(&self, k: f64) -> f64 {
        self.mean + k * self.sigma
    }
}

/// `1 / Φ⁻¹(3/4)`, turns a median absolute deviation into a normal sigma.
fn mad_to_sigma() -> f64 {
    1.0 / (std::f64::consts::SQRT_2 * statrs::function::erf::erf_inv(0.5))
}

fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let upper = *upper;
    if n % 2 == 1 {
        upper
    } else {
        let below = lower
            .iter()
            .cloned()
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            .unwrap_or(upper);
        0.5 * (below + upper)
    }
}

/// Robust normal fit of the pixel distribution: median for the centre and the
/// scaled median absolute deviation for the width, so a few bright particles
/// cannot drag the fit. When more than half the pixels share one value the
/// MAD collapses to zero and the RMS deviation about the median is used.
pub fn fit_gaussian(img: &FloatImage) -> GaussianFit {
    let mut values = img
        .as_raw()
        .iter()
        .cloned()
        .filter(|v| v.is_finite())
        .collect::<Vec<_>>();
    if values.is_empty() {
        return GaussianFit {
            mean: 0.0,
            sigma: 0.0,
        };
    }

    let mean = median(&mut values);
    let mut deviations = values.iter().map(|v| (v - mean).abs()).collect::<Vec<_>>();
    let mut sigma = median(&mut deviations) * mad_to_sigma();
    if sigma == 0.0 {
        sigma = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64)
            .sqrt();
        log::trace!("MAD is zero, falling back to rms sigma {}", sigma);
    }
    GaussianFit { mean, sigma }
}

/// Keep pixels strictly above `μ + kσ`, then open with a disk of
/// `erode_radius` to drop speckle. Deterministic for a given input.
pub fn build_mask(filtered: &FloatImage, k: f64, erode_radius: u32) -> (Mask, GaussianFit) {
    let fit = fit_gaussian(filtered);
    let limit = fit.threshold(k);
    log::debug!(
        "background fit mu={:.4} sigma={:.4}, threshold={:.4}",
        fit.mean,
        fit.sigma,
        limit
    );

    let binary = filtered
        .as_raw()
        .iter()
        .map(|&p| (p > limit) as u8)
        .collect::<Vec<_>>();
    let binary: Mask = luma_from_vec(filtered.width(), filtered.height(), binary);
    let mask = opening(&binary, erode_radius);
    (mask, fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SyntheticField;
    use approx::assert_relative_eq;

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&mut []), 0.0);
    }

    #[test]
    fn mad_scale_matches_normal_quartile() {
        assert_relative_eq!(mad_to_sigma(), 1.482602218505602, epsilon = 1e-9);
    }

    #[test]
    fn fit_ignores_bright_outliers() {
        let img = SyntheticField::new(120, 120)
            .background(50.0)
            .noise(4.0)
            .spot(60.0, 60.0, 5000.0, 3.0)
            .render(7);
        let fit = fit_gaussian(&img);
        assert!((fit.mean - 50.0).abs() < 0.5, "{:?}", fit);
        assert!((fit.sigma - 4.0).abs() < 0.5, "{:?}", fit);
    }

    #[test]
    fn constant_image_has_zero_width() {
        let img = luma_from_vec(4, 4, vec![3.0; 16]);
        let fit = fit_gaussian(&img);
        assert_eq!(fit, GaussianFit { mean: 3.0, sigma: 0.0 });
    }

    #[test]
    fn flat_input_gives_empty_mask_for_any_k() {
        let img = FloatImage::new(30, 30);
        for k in [-5.0, 0.0, 3.0, 20.0] {
            let (mask, _) = build_mask(&img, k, 1);
            assert!(mask.as_raw().iter().all(|&m| m == 0));
        }
    }

    #[test]
    fn thresholding_is_idempotent() {
        let img = SyntheticField::new(64, 64)
            .noise(2.0)
            .spot(20.0, 30.0, 40.0, 2.0)
            .render(3);
        let (a, fa) = build_mask(&img, 3.0, 1);
        let (b, fb) = build_mask(&img, 3.0, 1);
        assert_eq!(a, b);
        assert_eq!(fa, fb);
        assert!(a.as_raw().iter().all(|&m| m <= 1));
    }
}
