use crate::raster::FloatImage;
use image::Luma;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

#[derive(Debug, Clone, Copy)]
struct Spot {
    x: f64,
    y: f64,
    amplitude: f64,
    sigma: f64,
}

/// Flat background with Gaussian noise and Gaussian spots, reproducible from
/// a seed.
#[derive(Debug, Clone)]
pub(crate) struct SyntheticField {
    width: u32,
    height: u32,
    background: f64,
    noise: f64,
    spots: Vec<Spot>,
}

impl SyntheticField {
    pub(crate) fn new(width: u32, height: u32) -> SyntheticField {
        SyntheticField {
            width,
            height,
            background: 0.0,
            noise: 0.0,
            spots: Vec::new(),
        }
    }

    pub(crate) fn background(mut self, level: f64) -> SyntheticField {
        self.background = level;
        self
    }

    pub(crate) fn noise(mut self, sigma: f64) -> SyntheticField {
        self.noise = sigma;
        self
    }

    /// `x` is the column, `y` the row.
    pub(crate) fn spot(mut self, x: f64, y: f64, amplitude: f64, sigma: f64) -> SyntheticField {
        self.spots.push(Spot {
            x,
            y,
            amplitude,
            sigma,
        });
        self
    }

    pub(crate) fn render(&self, seed: u64) -> FloatImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = if self.noise > 0.0 {
            Normal::new(0.0, self.noise).ok()
        } else {
            None
        };
        FloatImage::from_fn(self.width, self.height, |x, y| {
            let mut v = self.background;
            for s in &self.spots {
                let dx = x as f64 - s.x;
                let dy = y as f64 - s.y;
                v += s.amplitude * (-(dx * dx + dy * dy) / (2.0 * s.sigma * s.sigma)).exp();
            }
            if let Some(n) = &noise {
                v += n.sample(&mut rng);
            }
            Luma([v])
        })
    }
}

/// Save `img` as a single page 16-bit TIFF, rounding and clamping each pixel.
pub(crate) fn write_tiff16(path: &std::path::Path, img: &FloatImage) {
    use tiff::encoder::{colortype, TiffEncoder};
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let data = img
        .as_raw()
        .iter()
        .map(|v| v.round().max(0.0).min(u16::MAX as f64) as u16)
        .collect::<Vec<_>>();
    let f = std::io::BufWriter::new(std::fs::File::create(path).unwrap());
    let mut encoder = TiffEncoder::new(f).unwrap();
    encoder
        .write_image::<colortype::Gray16>(img.width(), img.height(), &data)
        .unwrap();
}
