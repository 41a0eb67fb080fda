use crate::error::ExtractionError;
use crate::point::{BoundingBox, ParticleRecord, Point};
use crate::raster::{FloatImage, LabelImage};

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    area: u64,
    sum_x: f64,
    sum_y: f64,
    bbox: Option<BoundingBox>,
    intensity: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Accumulator {
            area: 0,
            sum_x: 0.0,
            sum_y: 0.0,
            bbox: None,
            intensity: 0.0,
        }
    }
}

impl Accumulator {
    fn add(&mut self, x: u32, y: u32, value: f64) {
        self.area += 1;
        self.sum_x += x as f64;
        self.sum_y += y as f64;
        self.intensity += value;
        match &mut self.bbox {
            Some(b) => b.extend(x, y),
            None => self.bbox = Some(BoundingBox::at(x, y)),
        }
    }
}

/// Measure every labelled region against the corrected intensities.
///
/// Records come back ordered by label. The integrated intensity of a region is
/// the sum of `corrected` over exactly the pixels carrying its label.
pub fn quantify(
    labels: &LabelImage,
    count: usize,
    corrected: &FloatImage,
) -> Result<Vec<ParticleRecord>, ExtractionError> {
    if labels.dimensions() != corrected.dimensions() {
        return Err(ExtractionError::ShapeMismatch {
            expected: labels.dimensions(),
            found: corrected.dimensions(),
        });
    }
    let mut acc = vec![Accumulator::default(); count + 1];

    for (x, y, l) in labels.enumerate_pixels() {
        let l = l.0[0] as usize;
        if l == 0 || l > count {
            continue;
        }
        acc[l].add(x, y, corrected.get_pixel(x, y).0[0]);
    }

    let records: Vec<ParticleRecord> = acc
        .into_iter()
        .enumerate()
        .skip(1)
        .filter_map(|(label, a)| {
            let bbox = a.bbox?;
            let n = a.area as f64;
            Some(ParticleRecord {
                label: label as u32,
                area: a.area,
                centroid: Point::new(a.sum_x / n, a.sum_y / n),
                bbox,
                integrated_intensity: a.intensity,
            })
        })
        .collect();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{label, Connectivity};
    use crate::raster::{luma_from_vec, Mask};

    fn two_regions() -> (Mask, FloatImage) {
        #[rustfmt::skip]
        let mask = vec![
            1, 1, 0, 0, 0,
            1, 0, 0, 0, 0,
            0, 0, 0, 1, 1,
            0, 0, 0, 1, 1,
        ];
        let corrected = (0..20).map(|v| v as f64).collect::<Vec<_>>();
        (luma_from_vec(5, 4, mask), luma_from_vec(5, 4, corrected))
    }

    #[test]
    fn region_geometry() {
        let (mask, corrected) = two_regions();
        let (labels, n) = label(&mask, Connectivity::Eight).unwrap();
        let records = quantify(&labels, n, &corrected).unwrap();

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.label, 1);
        assert_eq!(first.area, 3);
        assert_eq!(first.centroid, Point::new(1.0 / 3.0, 1.0 / 3.0));
        assert_eq!(
            first.bbox,
            BoundingBox {
                x_min: 0,
                y_min: 0,
                x_max: 1,
                y_max: 1
            }
        );

        let second = &records[1];
        assert_eq!(second.area, 4);
        assert_eq!(second.centroid, Point::new(3.5, 2.5));
        assert_eq!(second.bbox.width(), 2);
    }

    #[test]
    fn integral_covers_exactly_the_labelled_pixels() {
        let (mask, corrected) = two_regions();
        let (labels, n) = label(&mask, Connectivity::Eight).unwrap();
        assert_eq!(labels.dimensions(), mask.dimensions());

        let records = quantify(&labels, n, &corrected).unwrap();
        for r in &records {
            let expected = labels
                .enumerate_pixels()
                .filter(|(_, _, l)| l.0[0] == r.label)
                .map(|(x, y, _)| corrected.get_pixel(x, y).0[0])
                .sum::<f64>();
            assert_eq!(r.integrated_intensity, expected);
        }
        // 0 + 1 + 5 and 13 + 14 + 18 + 19
        assert_eq!(records[0].integrated_intensity, 6.0);
        assert_eq!(records[1].integrated_intensity, 64.0);
    }

    #[test]
    fn no_regions_no_records() {
        let labels = LabelImage::new(4, 4);
        let corrected = FloatImage::new(4, 4);
        assert!(quantify(&labels, 0, &corrected).unwrap().is_empty());
    }

    #[test]
    fn mismatched_shapes_are_an_error() {
        let labels = LabelImage::new(4, 4);
        let corrected = FloatImage::new(5, 4);
        assert!(matches!(
            quantify(&labels, 0, &corrected),
            Err(ExtractionError::ShapeMismatch {
                expected: (4, 4),
                found: (5, 4)
            })
        ));
    }
}
