//! Liposome influx assay: register the sample and blank channels onto the
//! ionomycin reference, find liposomes on the reference and compare the three
//! channel intensities around each one.

use crate::config::LiposomeSettings;
use crate::error::ExtractionError;
use crate::object_debugger::{BasicColor, ImageDebugConfig, ImageDebugger, Mark};
use crate::point::Point;
use crate::raster::FloatImage;

pub use self::align::{align_channels, estimate_translation, translate, AlignedChannels, Translation};
pub use self::influx::{influx, influx_records, quality_control, summarize, FieldSummary, Influx, InfluxRecord};
pub use self::peaks::{disk_intensities, locate_peaks, Peak};

mod align;
mod influx;
mod peaks;

/// The three averaged channels of one field of view.
#[derive(Debug, Clone)]
pub struct FieldChannels {
    pub reference: FloatImage,
    pub sample: FloatImage,
    pub blank: FloatImage,
}

#[derive(Debug, Clone)]
pub struct FieldResult {
    /// every peak, including the ones that failed quality control
    pub records: Vec<InfluxRecord>,
    pub summary: FieldSummary,
    pub sample_shift: Translation,
    pub blank_shift: Translation,
}

impl FieldResult {
    pub fn valid_records(&self) -> impl Iterator<Item = &InfluxRecord> {
        self.records.iter().filter(|r| r.influx.is_valid())
    }
}

pub fn analyse_field(
    field: &str,
    channels: &FieldChannels,
    settings: &LiposomeSettings,
    debug: &ImageDebugConfig,
) -> Result<FieldResult, ExtractionError> {
    let aligned = align_channels(
        &channels.reference,
        &channels.sample,
        &channels.blank,
        settings.alignment,
    )?;

    let peaks = locate_peaks(&channels.reference, settings.threshold, settings.margin)?;
    if peaks.is_empty() {
        log::info!("field {} ignored, no liposome located", field);
    }

    let reference = disk_intensities(&channels.reference, &peaks, settings.radius);
    let sample = disk_intensities(&aligned.sample, &peaks, settings.radius);
    let blank = disk_intensities(&aligned.blank, &peaks, settings.radius);
    let records = influx_records(field, &peaks, &reference, &sample, &blank);
    let summary = summarize(field, &records);
    log::debug!(
        "field {}: {} liposomes, {} valid, mean influx {:?}",
        field,
        summary.total,
        summary.valid,
        summary.mean_influx
    );

    if let Some(p) = debug.path(field, "liposomes") {
        let mut dbg = ImageDebugger::new(&channels.reference);
        for r in &records {
            let color = if r.influx.is_valid() {
                BasicColor::Green
            } else {
                BasicColor::Red
            };
            dbg.add_mark(
                Mark::Disk {
                    center: Point::new(r.peak.col as f64, r.peak.row as f64),
                    radius: settings.radius,
                },
                color,
            );
        }
        if let Err(e) = dbg.save(&p) {
            log::warn!("could not write debug image {:?}: {}", p, e);
        }
    }

    Ok(FieldResult {
        records,
        summary,
        sample_shift: aligned.sample_shift,
        blank_shift: aligned.blank_shift,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlignmentMethod;
    use crate::test_utils::SyntheticField;
    use approx::assert_relative_eq;

    fn field(scale: f64, offset: f64, dx: f64, dy: f64) -> FloatImage {
        SyntheticField::new(96, 96)
            .background(offset)
            .spot(40.0 + dx, 40.0 + dy, 300.0 * scale, 1.5)
            .spot(60.0 + dx, 52.0 + dy, 300.0 * scale, 1.5)
            .render(0)
    }

    #[test]
    fn identical_channels_are_all_errors() {
        let img = field(1.0, 100.0, 0.0, 0.0);
        let channels = FieldChannels {
            reference: img.clone(),
            sample: img.clone(),
            blank: img,
        };
        let out = analyse_field("f1.tif", &channels, &LiposomeSettings::default(), &Default::default()).unwrap();
        assert_eq!(out.summary.total, 2);
        assert_eq!(out.summary.invalid, 2);
        assert_eq!(out.summary.mean_influx, None);
        assert_eq!(out.valid_records().count(), 0);
    }

    #[test]
    fn influx_follows_channel_ratio_after_alignment() {
        // sample carries half the reference signal and is shifted by (3, -2)
        let channels = FieldChannels {
            reference: field(1.0, 0.0, 0.0, 0.0),
            sample: field(0.5, 0.0, 3.0, -2.0),
            blank: field(0.0, 0.0, 0.0, 0.0),
        };
        let settings = LiposomeSettings {
            alignment: AlignmentMethod::CrossCorrelation,
            ..Default::default()
        };
        let out = analyse_field("f2.tif", &channels, &settings, &Default::default()).unwrap();
        assert_eq!(out.sample_shift, Translation { dx: -3, dy: 2 });
        assert_eq!(out.summary.total, 2);
        assert_eq!(out.summary.valid, 2);
        for r in &out.records {
            assert_relative_eq!(r.influx.value().unwrap(), 50.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn empty_field_has_empty_summary() {
        let flat = SyntheticField::new(80, 80).background(10.0).render(0);
        let channels = FieldChannels {
            reference: flat.clone(),
            sample: flat.clone(),
            blank: flat,
        };
        let out = analyse_field("f3.tif", &channels, &LiposomeSettings::default(), &Default::default()).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.summary.total, 0);
    }
}
