use crate::error::ExtractionError;
use crate::morphology::white_tophat;
use crate::raster::{luma_from_vec, FloatImage};
use crate::resample::resize_bilinear;
use rayon::prelude::*;
use std::f64::consts::PI;

/// Square Ricker ("Mexican hat") kernel, row major.
#[derive(Debug, Clone)]
pub(crate) struct Kernel {
    pub size: usize,
    pub weights: Vec<f64>,
}

fn round_up_to_odd(v: f64) -> usize {
    let n = v.ceil() as usize;
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Ricker wavelet of the given width, `8 * width` wide (rounded up to odd),
/// shifted so its weights sum to exactly zero.
pub(crate) fn ricker_kernel(width: f64) -> Kernel {
    let size = round_up_to_odd(8.0 * width);
    let half = (size / 2) as f64;
    let amplitude = 1.0 / (PI * width.powi(4));
    let inv_two_w2 = 1.0 / (2.0 * width * width);

    let mut weights = Vec::with_capacity(size * size);
    for row in 0..size {
        for col in 0..size {
            let dy = row as f64 - half;
            let dx = col as f64 - half;
            let r2 = (dx * dx + dy * dy) * inv_two_w2;
            weights.push(amplitude * (1.0 - r2) * (-r2).exp());
        }
    }
    let mean = weights.iter().sum::<f64>() / weights.len() as f64;
    for w in &mut weights {
        *w -= mean;
    }
    Kernel { size, weights }
}

/// Convolution without padding: the output shrinks by `size - 1` in each axis.
pub(crate) fn convolve_valid(img: &FloatImage, kernel: &Kernel) -> Result<FloatImage, ExtractionError> {
    let k = kernel.size;
    let (width, height) = (img.width() as usize, img.height() as usize);
    if width < k || height < k {
        return Err(ExtractionError::ImageTooSmall {
            width: img.width(),
            height: img.height(),
            kernel: k,
        });
    }

    let flipped = kernel.weights.iter().rev().cloned().collect::<Vec<_>>();
    let out_width = width - k + 1;
    let out_height = height - k + 1;
    let src = img.as_raw();

    let mut out = vec![0f64; out_width * out_height];
    out.par_chunks_mut(out_width)
        .enumerate()
        .for_each(|(row, line)| {
            for (col, o) in line.iter_mut().enumerate() {
                let mut sum = 0.0;
                for (ky, weights) in flipped.chunks(k).enumerate() {
                    let base = (row + ky) * width + col;
                    sum += weights
                        .iter()
                        .zip(&src[base..base + k])
                        .map(|(w, p)| w * p)
                        .sum::<f64>();
                }
                *o = sum;
            }
        });

    Ok(luma_from_vec(out_width as u32, out_height as u32, out))
}

pub(crate) struct Filtered {
    pub tophat: FloatImage,
    pub filtered: FloatImage,
}

/// Top-hat background removal, Ricker matched filter, then resample back to
/// the input geometry.
pub(crate) fn matched_filter(
    img: &FloatImage,
    tophat_radius: u32,
    kernel_width: f64,
) -> Result<Filtered, ExtractionError> {
    log::trace!("top-hat, disk radius {}", tophat_radius);
    let tophat = white_tophat(img, tophat_radius);

    let kernel = ricker_kernel(kernel_width);
    log::trace!("ricker kernel {}x{}", kernel.size, kernel.size);
    let convolved = convolve_valid(&tophat, &kernel)?;
    let filtered = resize_bilinear(&convolved, img.width(), img.height());

    Ok(Filtered { tophat, filtered })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kernel_is_zero_mean_and_peaks_in_the_middle() {
        let kernel = ricker_kernel(1.0);
        assert_eq!(kernel.size, 9);
        assert_relative_eq!(kernel.weights.iter().sum::<f64>(), 0.0, epsilon = 1e-12);

        let centre = kernel.weights[4 * 9 + 4];
        assert!(kernel.weights.iter().all(|&w| w <= centre));
        // negative ring
        assert!(kernel.weights[4 * 9 + 6] < 0.0);
    }

    #[test]
    fn kernel_size_tracks_width() {
        assert_eq!(ricker_kernel(0.5).size, 5);
        assert_eq!(ricker_kernel(2.0).size, 17);
    }

    #[test]
    fn valid_convolution_shrinks() {
        let img = FloatImage::new(20, 15);
        let out = convolve_valid(&img, &ricker_kernel(1.0)).unwrap();
        assert_eq!(out.dimensions(), (12, 7));
    }

    #[test]
    fn convolution_of_flat_image_is_zero() {
        let img = luma_from_vec(12, 12, vec![250.0; 144]);
        let out = convolve_valid(&img, &ricker_kernel(1.0)).unwrap();
        assert!(out.as_raw().iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn tiny_images_are_rejected() {
        let img = FloatImage::new(8, 40);
        assert!(matches!(
            convolve_valid(&img, &ricker_kernel(1.0)),
            Err(ExtractionError::ImageTooSmall { kernel: 9, .. })
        ));
    }

    #[test]
    fn matched_filter_keeps_geometry_and_responds_to_spots() {
        let mut data = vec![100.0; 40 * 40];
        data[20 * 40 + 20] = 400.0;
        let img = luma_from_vec(40, 40, data);
        let out = matched_filter(&img, 5, 1.0).unwrap();
        assert_eq!(out.filtered.dimensions(), (40, 40));
        assert_eq!(out.tophat.get_pixel(20, 20).0[0], 300.0);
        assert!(out.filtered.get_pixel(20, 20).0[0] > 0.0);
        assert!(out.filtered.get_pixel(2, 2).0[0].abs() < 1e-9);
    }
}
