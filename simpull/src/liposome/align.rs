use crate::config::AlignmentMethod;
use crate::error::ExtractionError;
use crate::raster::{luma_from_vec, FloatImage};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// Integer shift that moves a channel onto the reference:
/// `aligned(row, col) = channel(row - dy, col - dx)`.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Translation {
    pub dx: i32,
    pub dy: i32,
}

impl fmt::Debug for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(dx={}, dy={})", self.dx, self.dy)
    }
}

/// FFT plans for one image geometry.
struct Correlator {
    width: usize,
    height: usize,
    row_forward: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
}

impl Correlator {
    fn new(width: usize, height: usize) -> Correlator {
        let mut planner = FftPlanner::new();
        Correlator {
            width,
            height,
            row_forward: planner.plan_fft_forward(width),
            col_forward: planner.plan_fft_forward(height),
            row_inverse: planner.plan_fft_inverse(width),
            col_inverse: planner.plan_fft_inverse(height),
        }
    }

    /// Row-column decomposition, in place.
    fn transform(&self, data: &mut [Complex<f64>], rows: &dyn Fft<f64>, cols: &dyn Fft<f64>) {
        let (w, h) = (self.width, self.height);
        for line in data.chunks_mut(w) {
            rows.process(line);
        }
        let mut column = vec![Complex::new(0.0, 0.0); h];
        for x in 0..w {
            for (y, c) in column.iter_mut().enumerate() {
                *c = data[y * w + x];
            }
            cols.process(&mut column);
            for (y, c) in column.iter().enumerate() {
                data[y * w + x] = *c;
            }
        }
    }

    fn forward(&self, img: &FloatImage) -> Vec<Complex<f64>> {
        let mut data = img
            .as_raw()
            .iter()
            .map(|&v| Complex::new(v, 0.0))
            .collect::<Vec<_>>();
        self.transform(&mut data, self.row_forward.as_ref(), self.col_forward.as_ref());
        data
    }

    /// Cross-correlation surface of `reference` against `channel`, magnitude
    /// only, with zero lag at the centre.
    fn correlate(&self, reference: &FloatImage, channel: &FloatImage) -> Vec<f64> {
        let fr = self.forward(reference);
        let fc = self.forward(channel);
        let mut cross = fr
            .iter()
            .zip(&fc)
            .map(|(a, b)| *a * b.conj())
            .collect::<Vec<_>>();
        self.transform(&mut cross, self.row_inverse.as_ref(), self.col_inverse.as_ref());

        let (w, h) = (self.width, self.height);
        let norm = 1.0 / (w * h) as f64;
        let mut shifted = vec![0f64; w * h];
        for y in 0..h {
            let sy = (y + h / 2) % h;
            for x in 0..w {
                let sx = (x + w / 2) % w;
                shifted[sy * w + sx] = cross[y * w + x].norm() * norm;
            }
        }
        shifted
    }
}

/// First maximum in row-major order.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (idx, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = idx;
        }
    }
    best
}

fn check_shape(reference: &FloatImage, channel: &FloatImage) -> Result<(), ExtractionError> {
    if reference.dimensions() != channel.dimensions() {
        return Err(ExtractionError::ShapeMismatch {
            expected: reference.dimensions(),
            found: channel.dimensions(),
        });
    }
    Ok(())
}

fn estimate_with(
    correlator: &Correlator,
    reference: &FloatImage,
    channel: &FloatImage,
) -> Translation {
    let surface = correlator.correlate(reference, channel);
    let peak = argmax(&surface);
    let w = correlator.width;
    let (row, col) = (peak / w, peak % w);
    Translation {
        dx: col as i32 - (w / 2) as i32,
        dy: row as i32 - (correlator.height / 2) as i32,
    }
}

/// Shift that best overlays `channel` onto `reference`, taken at the peak of
/// their FFT cross-correlation.
pub fn estimate_translation(
    reference: &FloatImage,
    channel: &FloatImage,
) -> Result<Translation, ExtractionError> {
    check_shape(reference, channel)?;
    let (w, h) = reference.dimensions();
    if w == 0 || h == 0 {
        return Ok(Translation::default());
    }
    let correlator = Correlator::new(w as usize, h as usize);
    Ok(estimate_with(&correlator, reference, channel))
}

/// Integer translation without interpolation. Pixels shifted in from outside
/// the image are zero.
pub fn translate(img: &FloatImage, t: Translation) -> FloatImage {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let src = img.as_raw();
    let mut out = vec![0f64; src.len()];
    for row in 0..h {
        let sr = row - t.dy as i64;
        if sr < 0 || sr >= h {
            continue;
        }
        for col in 0..w {
            let sc = col - t.dx as i64;
            if sc < 0 || sc >= w {
                continue;
            }
            out[(row * w + col) as usize] = src[(sr * w + sc) as usize];
        }
    }
    luma_from_vec(img.width(), img.height(), out)
}

/// Sample and blank channels registered onto the reference.
#[derive(Debug, Clone)]
pub struct AlignedChannels {
    pub sample: FloatImage,
    pub blank: FloatImage,
    pub sample_shift: Translation,
    pub blank_shift: Translation,
}

pub fn align_channels(
    reference: &FloatImage,
    sample: &FloatImage,
    blank: &FloatImage,
    method: AlignmentMethod,
) -> Result<AlignedChannels, ExtractionError> {
    check_shape(reference, sample)?;
    check_shape(reference, blank)?;

    let (sample_shift, blank_shift) = match method {
        AlignmentMethod::Identity => (Translation::default(), Translation::default()),
        AlignmentMethod::CrossCorrelation => {
            let (w, h) = reference.dimensions();
            if w == 0 || h == 0 {
                (Translation::default(), Translation::default())
            } else {
                let correlator = Correlator::new(w as usize, h as usize);
                (
                    estimate_with(&correlator, reference, sample),
                    estimate_with(&correlator, reference, blank),
                )
            }
        }
    };
    log::debug!(
        "channel shifts: sample {:?}, blank {:?}",
        sample_shift,
        blank_shift
    );

    Ok(AlignedChannels {
        sample: translate(sample, sample_shift),
        blank: translate(blank, blank_shift),
        sample_shift,
        blank_shift,
    })
}
