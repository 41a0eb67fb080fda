//! Built-in particle detector: top-hat background removal, a Ricker matched
//! filter, a robust `μ + kσ` threshold, then background corrected
//! quantification of every connected region of the mask.

use crate::config::TrevorSettings;
use crate::detector::{Detection, ParticleDetector};
use crate::error::ExtractionError;
use crate::label::{label, Connectivity};
use crate::object_debugger::{dump_colored_labels, BasicColor, ImageDebugConfig, ImageDebugger, Mark};
use crate::point::ParticleRecord;
use crate::raster::{FloatImage, LabelImage, Mask};

pub use self::background::correct_background;
pub use self::quantify::quantify;
pub use self::threshold::{build_mask, fit_gaussian, GaussianFit};

mod background;
mod filter;
mod quantify;
mod threshold;

/// Every intermediate a single run produces.
#[derive(Debug, Clone)]
pub struct TrevorOutput {
    pub mask: Mask,
    pub labels: LabelImage,
    pub corrected: FloatImage,
    pub fit: GaussianFit,
    pub particles: Vec<ParticleRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct TrevorExtractor {
    pub settings: TrevorSettings,
    pub debug: ImageDebugConfig,
}

fn log_image<P: AsRef<std::path::Path>>(img: &FloatImage, path: Option<P>) {
    if let Some(p) = path {
        if let Err(e) = ImageDebugger::new(img).save(p.as_ref()) {
            log::warn!("could not write debug image {:?}: {}", p.as_ref(), e);
        }
    }
}

impl TrevorExtractor {
    pub fn new(settings: TrevorSettings) -> TrevorExtractor {
        TrevorExtractor {
            settings,
            debug: ImageDebugConfig::default(),
        }
    }

    pub fn run(&self, fov: &str, img: &FloatImage) -> Result<TrevorOutput, ExtractionError> {
        let s = &self.settings;
        let filtered = filter::matched_filter(img, s.tophat_radius, s.kernel_width)?;
        log_image(&filtered.tophat, self.debug.path(fov, "tophat"));
        log_image(&filtered.filtered, self.debug.path(fov, "filtered"));

        let (mask, fit) = build_mask(&filtered.filtered, s.threshold_sd, s.erode_radius);
        let (labels, count) = label(&mask, Connectivity::Eight)?;
        log::debug!("{}: {} regions in mask", fov, count);

        if count == 0 {
            return Ok(TrevorOutput {
                mask,
                labels,
                corrected: img.clone(),
                fit,
                particles: vec![],
            });
        }

        let corrected = correct_background(img, &mask)?;
        let particles = quantify(&labels, count, &corrected)?;

        if let Some(p) = self.debug.path(fov, "objects") {
            if let Err(e) = dump_colored_labels(&labels, &p) {
                log::warn!("could not write debug image {:?}: {}", p, e);
            }
        }
        if let Some(p) = self.debug.path(fov, "particles") {
            let mut dbg = ImageDebugger::new(img);
            for r in &particles {
                dbg.add_mark(Mark::Box(r.bbox), BasicColor::Red);
                dbg.add_mark(Mark::Cross(r.centroid), BasicColor::Green);
            }
            if let Err(e) = dbg.save(&p) {
                log::warn!("could not write debug image {:?}: {}", p, e);
            }
        }

        Ok(TrevorOutput {
            mask,
            labels,
            corrected,
            fit,
            particles,
        })
    }
}

impl ParticleDetector for TrevorExtractor {
    fn name(&self) -> &'static str {
        "trevor"
    }

    fn detect(&self, fov: &str, image: &FloatImage) -> Result<Detection, ExtractionError> {
        let out = self.run(fov, image)?;
        Ok(Detection {
            particles: out.particles,
            mask: Some(out.mask),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;
    use crate::test_utils::SyntheticField;
    use std::f64::consts::PI;

    fn two_blobs(seed: u64) -> FloatImage {
        SyntheticField::new(100, 100)
            .background(100.0)
            .noise(5.0)
            .spot(40.0, 40.0, 1000.0, 2.0)
            .spot(60.0, 60.0, 1000.0, 2.0)
            .render(seed)
    }

    fn extractor() -> TrevorExtractor {
        TrevorExtractor::new(TrevorSettings {
            threshold_sd: 3.0,
            erode_radius: 1,
            ..Default::default()
        })
    }

    #[test]
    fn finds_two_blobs() {
        // pixels above half maximum of a sigma 2 gaussian
        let footprint = PI * 2.0 * 2.0 * 2.0 * (4f64).ln();
        let centres = [Point::new(40.0, 40.0), Point::new(60.0, 60.0)];

        for seed in [1, 2, 3] {
            let out = extractor().run("X1Y1R1W1", &two_blobs(seed)).unwrap();
            assert_eq!(out.particles.len(), 2, "seed {}", seed);
            for (r, c) in out.particles.iter().zip(&centres) {
                assert!(r.centroid.distance(c) < 2.0, "seed {}: {:?}", seed, r);
                let ratio = r.area as f64 / footprint;
                assert!(ratio > 0.8 && ratio < 1.2, "seed {}: area {}", seed, r.area);
                assert!(r.integrated_intensity > 0.0);
            }
        }
    }

    #[test]
    fn labels_agree_with_mask_and_records() {
        let out = extractor().run("Pos1", &two_blobs(9)).unwrap();
        assert_eq!(out.labels.dimensions(), out.mask.dimensions());
        for (l, m) in out.labels.as_raw().iter().zip(out.mask.as_raw()) {
            assert_eq!(*l > 0, *m > 0);
        }
        let max_label = out.labels.as_raw().iter().cloned().max().unwrap_or(0);
        assert_eq!(max_label as usize, out.particles.len());

        for r in &out.particles {
            let sum = out
                .labels
                .enumerate_pixels()
                .filter(|(_, _, l)| l.0[0] == r.label)
                .map(|(x, y, _)| out.corrected.get_pixel(x, y).0[0])
                .sum::<f64>();
            assert_eq!(sum, r.integrated_intensity);
        }
    }

    #[test]
    fn flat_image_has_no_particles() {
        let img = SyntheticField::new(100, 100).background(100.0).render(0);
        for k in [0.0, 1.0, 3.0, 20.0] {
            let e = TrevorExtractor::new(TrevorSettings {
                threshold_sd: k,
                ..Default::default()
            });
            let d = e.detect("Pos0", &img).unwrap();
            assert!(d.particles.is_empty());
            let mask = d.mask.unwrap();
            assert!(mask.as_raw().iter().all(|&m| m == 0));
        }
    }

    #[test]
    fn small_images_are_an_extraction_error() {
        let img = FloatImage::new(5, 5);
        assert!(matches!(
            extractor().detect("Pos0", &img),
            Err(ExtractionError::ImageTooSmall { .. })
        ));
    }

    #[test]
    fn debug_images_are_written_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let mut e = extractor();
        e.debug = ImageDebugConfig::in_dir(dir.path());
        e.run("Pos3", &two_blobs(4)).unwrap();
        for stage in ["tophat", "filtered", "objects", "particles"] {
            assert!(dir.path().join(format!("Pos3_{}.png", stage)).exists(), "{}", stage);
        }
    }
}
