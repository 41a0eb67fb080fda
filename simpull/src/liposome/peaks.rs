use crate::error::ExtractionError;
use crate::label::{label, Connectivity};
use crate::morphology::{maximum_filter, minimum_filter};
use crate::raster::{luma_from_vec, FloatImage, Mask};

/// Integer pixel position of a liposome on the reference channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Peak {
    pub row: u32,
    pub col: u32,
}

/// Pixels that equal their 3x3 maximum and whose 3x3 max - min spread
/// exceeds `threshold`.
fn candidates(img: &FloatImage, threshold: f64) -> Mask {
    let max = maximum_filter(img, 1);
    let min = minimum_filter(img, 1);
    let data = img
        .as_raw()
        .iter()
        .zip(max.as_raw().iter().zip(min.as_raw()))
        .map(|(&p, (&hi, &lo))| (p == hi && hi - lo > threshold) as u8)
        .collect();
    luma_from_vec(img.width(), img.height(), data)
}

/// Find local maxima of `img`, one per 4-connected plateau of candidates,
/// located at the intensity weighted centroid and rounded to whole pixels.
/// Peaks not strictly inside `(margin, dim - margin)` on both axes are
/// dropped.
pub fn locate_peaks(img: &FloatImage, threshold: f64, margin: u32) -> Result<Vec<Peak>, ExtractionError> {
    let (labels, count) = label(&candidates(img, threshold), Connectivity::Four)?;

    // (sum of weights, weighted row, weighted col, pixel count, row, col)
    let mut acc = vec![[0f64; 6]; count + 1];
    for (x, y, l) in labels.enumerate_pixels() {
        let l = l.0[0] as usize;
        if l == 0 {
            continue;
        }
        let v = img.get_pixel(x, y).0[0];
        let a = &mut acc[l];
        a[0] += v;
        a[1] += v * y as f64;
        a[2] += v * x as f64;
        a[3] += 1.0;
        a[4] += y as f64;
        a[5] += x as f64;
    }

    let (width, height) = (img.width() as f64, img.height() as f64);
    let margin = margin as f64;
    let inside = |v: f64, dim: f64| v > margin && v < dim - margin;

    let peaks = acc
        .iter()
        .skip(1)
        .map(|a| {
            if a[0] != 0.0 {
                ((a[1] / a[0]).round(), (a[2] / a[0]).round())
            } else {
                ((a[4] / a[3]).round(), (a[5] / a[3]).round())
            }
        })
        .filter(|&(row, col)| inside(row, height) && inside(col, width))
        .map(|(row, col)| Peak {
            row: row as u32,
            col: col as u32,
        })
        .collect::<Vec<_>>();
    log::trace!("{} candidate plateaus, {} peaks inside margin", count, peaks.len());
    Ok(peaks)
}

/// Sum of `img` over the filled disk of `radius` around each peak, clipped to
/// the image.
pub fn disk_intensities(img: &FloatImage, peaks: &[Peak], radius: u32) -> Vec<f64> {
    let (width, height) = (img.width() as i64, img.height() as i64);
    let r = radius as i64;
    peaks
        .iter()
        .map(|p| {
            let (pr, pc) = (p.row as i64, p.col as i64);
            let mut sum = 0.0;
            for row in (pr - r).max(0)..=(pr + r).min(height - 1) {
                for col in (pc - r).max(0)..=(pc + r).min(width - 1) {
                    let (dr, dc) = (row - pr, col - pc);
                    if dr * dr + dc * dc <= r * r {
                        sum += img.get_pixel(col as u32, row as u32).0[0];
                    }
                }
            }
            sum
        })
        .collect()
}
