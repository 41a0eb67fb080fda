use super::peaks::Peak;

/// Influx after quality control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Influx {
    /// percentage in `[0, 100]`
    Valid(f64),
    /// undefined or far outside the physical range
    Error,
}

impl Influx {
    pub fn value(&self) -> Option<f64> {
        match self {
            Influx::Valid(v) => Some(*v),
            Influx::Error => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Influx::Valid(_))
    }
}

/// `(sample - blank) / (reference - blank) * 100`. A reference equal to the
/// blank gives NaN or an infinity, both of which fail quality control.
pub fn influx(reference: f64, sample: f64, blank: f64) -> f64 {
    (sample - blank) / (reference - blank) * 100.0
}

/// Values up to 10 points outside `[0, 100]` are clamped onto it, anything
/// else outside it (or NaN) is an error.
pub fn quality_control(v: f64) -> Influx {
    let v = if v > 100.0 && v <= 110.0 { 100.0 } else { v };
    let v = if (-10.0..0.0).contains(&v) { 0.0 } else { v };
    if v.is_nan() || v < -10.0 || v > 110.0 {
        Influx::Error
    } else {
        Influx::Valid(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfluxRecord {
    pub field: String,
    pub peak: Peak,
    /// before quality control
    pub raw: f64,
    pub influx: Influx,
}

/// Build one record per peak from the three parallel intensity lists.
pub fn influx_records(
    field: &str,
    peaks: &[Peak],
    reference: &[f64],
    sample: &[f64],
    blank: &[f64],
) -> Vec<InfluxRecord> {
    peaks
        .iter()
        .zip(reference.iter().zip(sample.iter().zip(blank)))
        .map(|(&peak, (&r, (&s, &b)))| {
            let raw = influx(r, s, b);
            InfluxRecord {
                field: field.to_owned(),
                peak,
                raw,
                influx: quality_control(raw),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSummary {
    pub field: String,
    /// mean over valid records, `None` when there are none
    pub mean_influx: Option<f64>,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

pub fn summarize(field: &str, records: &[InfluxRecord]) -> FieldSummary {
    let valid = records
        .iter()
        .filter_map(|r| r.influx.value())
        .collect::<Vec<_>>();
    let mean_influx = if valid.is_empty() {
        None
    } else {
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    };
    FieldSummary {
        field: field.to_owned(),
        mean_influx,
        total: records.len(),
        valid: valid.len(),
        invalid: records.len() - valid.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn hand_computed_influx() {
        assert_relative_eq!(influx(200.0, 150.0, 50.0), 66.66666666666667, epsilon = 1e-9);
    }

    #[test]
    fn quality_control_rules() {
        assert_eq!(quality_control(105.0), Influx::Valid(100.0));
        assert_eq!(quality_control(110.0), Influx::Valid(100.0));
        assert_eq!(quality_control(100.0), Influx::Valid(100.0));
        assert_eq!(quality_control(-5.0), Influx::Valid(0.0));
        assert_eq!(quality_control(-10.0), Influx::Valid(0.0));
        assert_eq!(quality_control(42.5), Influx::Valid(42.5));
        assert_eq!(quality_control(150.0), Influx::Error);
        assert_eq!(quality_control(110.5), Influx::Error);
        assert_eq!(quality_control(-10.5), Influx::Error);
        assert_eq!(quality_control(f64::NAN), Influx::Error);
        assert_eq!(quality_control(f64::INFINITY), Influx::Error);
    }

    #[test]
    fn qc_output_stays_in_range() {
        for i in -300..300 {
            let v = i as f64 * 0.5;
            if let Influx::Valid(q) = quality_control(v) {
                assert!((0.0..=100.0).contains(&q), "{} -> {}", v, q);
            }
        }
    }

    #[test]
    fn equal_reference_and_blank_is_an_error() {
        let peaks = [Peak { row: 40, col: 40 }];
        let records = influx_records("f.tif", &peaks, &[120.0], &[120.0], &[120.0]);
        assert!(records[0].raw.is_nan());
        assert_eq!(records[0].influx, Influx::Error);
    }

    #[test]
    fn summary_counts_and_mean() {
        let peaks = [
            Peak { row: 31, col: 31 },
            Peak { row: 32, col: 40 },
            Peak { row: 50, col: 50 },
        ];
        let records = influx_records(
            "f.tif",
            &peaks,
            &[200.0, 200.0, 200.0],
            &[150.0, 80.0, 500.0],
            &[50.0, 50.0, 50.0],
        );
        let s = summarize("f.tif", &records);
        assert_eq!((s.total, s.valid, s.invalid), (3, 2, 1));
        assert_relative_eq!(s.mean_influx.unwrap(), (200.0 / 3.0 + 20.0) / 2.0, epsilon = 1e-9);

        let empty = summarize("g.tif", &[]);
        assert_eq!(empty.mean_influx, None);
        assert_eq!(empty.total, 0);
    }
}
