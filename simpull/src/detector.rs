use crate::config::ExternalSettings;
use crate::error::ExtractionError;
use crate::point::{BoundingBox, ParticleRecord, Point};
use crate::raster::{FloatImage, Mask};

/// Result of running a detector over one field of view.
#[derive(Debug, Clone)]
pub struct Detection {
    /// ordered by label
    pub particles: Vec<ParticleRecord>,
    /// binary mask of the particles, when the detector builds one
    pub mask: Option<Mask>,
}

/// Anything that can find particles in an averaged frame.
pub trait ParticleDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect(&self, fov: &str, image: &FloatImage) -> Result<Detection, ExtractionError>;
}

/// A particle as reported by a third party detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located {
    pub centroid: Point,
    pub bbox: BoundingBox,
}

/// Bridge to a detector that lives outside this crate.
pub trait ExternalBackend: Send + Sync {
    fn locate(
        &self,
        image: &FloatImage,
        size: f64,
        threshold: f64,
    ) -> Result<Vec<Located>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Runs an [`ExternalBackend`] and measures each particle as the oval
/// inscribed in its bounding box.
pub struct ExternalDetector {
    settings: ExternalSettings,
    backend: Box<dyn ExternalBackend>,
}

impl ExternalDetector {
    pub fn new(settings: ExternalSettings, backend: Box<dyn ExternalBackend>) -> ExternalDetector {
        ExternalDetector { settings, backend }
    }
}

fn clip(b: BoundingBox, width: u32, height: u32) -> Option<BoundingBox> {
    if b.x_min >= width || b.y_min >= height || b.x_min > b.x_max || b.y_min > b.y_max {
        return None;
    }
    Some(BoundingBox {
        x_max: b.x_max.min(width - 1),
        y_max: b.y_max.min(height - 1),
        ..b
    })
}

/// Pixel count and intensity sum of the oval inscribed in `b`.
fn measure_oval(image: &FloatImage, b: BoundingBox) -> (u64, f64) {
    let cx = (b.x_min + b.x_max) as f64 / 2.0;
    let cy = (b.y_min + b.y_max) as f64 / 2.0;
    let a = b.width() as f64 / 2.0;
    let c = b.height() as f64 / 2.0;

    let mut area = 0;
    let mut sum = 0.0;
    for y in b.y_min..=b.y_max {
        for x in b.x_min..=b.x_max {
            let dx = (x as f64 - cx) / a;
            let dy = (y as f64 - cy) / c;
            if dx * dx + dy * dy <= 1.0 {
                area += 1;
                sum += image.get_pixel(x, y).0[0];
            }
        }
    }
    (area, sum)
}

impl ParticleDetector for ExternalDetector {
    fn name(&self) -> &'static str {
        "external"
    }

    fn detect(&self, fov: &str, image: &FloatImage) -> Result<Detection, ExtractionError> {
        let located = self
            .backend
            .locate(image, self.settings.size, self.settings.threshold)
            .map_err(ExtractionError::Backend)?;

        let (width, height) = image.dimensions();
        let particles = located
            .into_iter()
            .filter_map(|l| {
                let bbox = clip(l.bbox, width, height);
                if bbox.is_none() {
                    log::debug!("{}: dropping particle outside the image at {}", fov, l.centroid);
                }
                bbox.map(|b| (l.centroid, b))
            })
            .enumerate()
            .map(|(idx, (centroid, bbox))| {
                let (area, integrated_intensity) = measure_oval(image, bbox);
                ParticleRecord {
                    label: idx as u32 + 1,
                    area,
                    centroid,
                    bbox,
                    integrated_intensity,
                }
            })
            .collect::<Vec<_>>();
        log::debug!("{}: external detector found {} particles", fov, particles.len());

        Ok(Detection {
            particles,
            mask: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::luma_from_vec;

    struct Fixed(Vec<Located>);

    impl ExternalBackend for Fixed {
        fn locate(
            &self,
            _image: &FloatImage,
            size: f64,
            _threshold: f64,
        ) -> Result<Vec<Located>, Box<dyn std::error::Error + Send + Sync>> {
            if size > 100.0 {
                return Err("particle size too large".into());
            }
            Ok(self.0.clone())
        }
    }

    fn located(x_min: u32, y_min: u32, x_max: u32, y_max: u32) -> Located {
        Located {
            centroid: Point::new((x_min + x_max) as f64 / 2.0, (y_min + y_max) as f64 / 2.0),
            bbox: BoundingBox {
                x_min,
                y_min,
                x_max,
                y_max,
            },
        }
    }

    #[test]
    fn oval_of_a_square_box() {
        let img = luma_from_vec(10, 10, vec![1.0; 100]);
        let b = located(2, 2, 6, 6).bbox;
        // 5x5 box, radius 2.5 circle centred on (4, 4)
        let (area, sum) = measure_oval(&img, b);
        assert_eq!(area, 21);
        assert_eq!(sum, 21.0);
    }

    #[test]
    fn particles_are_measured_in_order() {
        let img = luma_from_vec(10, 10, (0..100).map(|v| v as f64).collect());
        let detector = ExternalDetector::new(
            ExternalSettings::default(),
            Box::new(Fixed(vec![located(0, 0, 0, 0), located(8, 8, 12, 12)])),
        );
        let d = detector.detect("Pos1", &img).unwrap();
        assert!(d.mask.is_none());
        assert_eq!(d.particles.len(), 2);
        assert_eq!(d.particles[0].label, 1);
        assert_eq!(d.particles[0].area, 1);
        assert_eq!(d.particles[0].integrated_intensity, 0.0);
        // clipped to the image
        assert_eq!(d.particles[1].bbox.x_max, 9);
        assert_eq!(d.particles[1].label, 2);
    }

    #[test]
    fn backend_failure_is_an_extraction_error() {
        let img = FloatImage::new(4, 4);
        let detector = ExternalDetector::new(
            ExternalSettings {
                size: 500.0,
                threshold: 3.0,
            },
            Box::new(Fixed(vec![])),
        );
        assert!(matches!(
            detector.detect("Pos1", &img),
            Err(ExtractionError::Backend(_))
        ));
    }
}
