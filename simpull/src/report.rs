//! Tabular outputs: per-FoV particle tables, per-well and project summaries,
//! and the liposome influx tables.
//!
//! Headers are always written, so a field of view without particles still
//! leaves a readable, empty table behind.

use crate::error::{ConfigError, ReportError};
use crate::liposome::{FieldSummary, InfluxRecord};
use crate::point::ParticleRecord;
use crate::raster::Mask;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tiff::encoder::{colortype, TiffEncoder};

const PARTICLE_HEADER: [&str; 13] = [
    "label",
    "NArea",
    "X_(px)",
    "Y_(px)",
    "xMin",
    "yMin",
    "xMax",
    "yMax",
    "Abs_frame",
    "Channel",
    "Slice",
    "Frame",
    "IntegratedInt",
];
const SAMPLE_HEADER: [&str; 11] = [
    "NArea",
    "X_(px)",
    "Y_(px)",
    "xMin",
    "yMin",
    "xMax",
    "yMax",
    "Abs_frame",
    "IntegratedInt",
    "FoV",
    "IntPerArea",
];
const SUMMARY_HEADER: [&str; 6] = [
    "Well",
    "NoOfFoV",
    "ParticlePerFoV",
    "MeanSize",
    "MeanIntegrInt",
    "MeanIntPerArea",
];
const QC_HEADER: [&str; 5] = ["Well", "FoV", "NArea", "IntegratedInt", "IntPerArea"];
const THRESHOLD_HEADER: [&str; 4] = ["Well", "ParticlePerFoV", "thred_IntPerArea", "thred_NArea"];
const INFLUX_HEADER: [&str; 4] = ["Field", "X", "Y", "Influx"];
const FIELD_SUMMARY_HEADER: [&str; 5] = [
    "FoV",
    "Mean influx",
    "Total liposomes",
    "Valid liposomes",
    "Invalid liposomes",
];
const LIPOSOME_SUMMARY_HEADER: [&str; 6] = [
    "Sample",
    "NoOfFoV",
    "MeanInflux",
    "TotalLiposomes",
    "ValidLiposomes",
    "InvalidLiposomes",
];

fn one() -> u32 {
    1
}

/// One line of a per-FoV results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleRow {
    #[serde(rename = "label", alias = " ")]
    pub label: u32,
    #[serde(rename = "NArea")]
    pub area: u64,
    #[serde(rename = "X_(px)")]
    pub x: f64,
    #[serde(rename = "Y_(px)")]
    pub y: f64,
    #[serde(rename = "xMin")]
    pub x_min: u32,
    #[serde(rename = "yMin")]
    pub y_min: u32,
    #[serde(rename = "xMax")]
    pub x_max: u32,
    #[serde(rename = "yMax")]
    pub y_max: u32,
    #[serde(rename = "Abs_frame", default = "one")]
    pub abs_frame: u32,
    #[serde(rename = "Channel", default = "one")]
    pub channel: u32,
    #[serde(rename = "Slice", default = "one")]
    pub slice: u32,
    #[serde(rename = "Frame", default = "one")]
    pub frame: u32,
    #[serde(rename = "IntegratedInt")]
    pub integrated_intensity: f64,
}

impl From<&ParticleRecord> for ParticleRow {
    fn from(r: &ParticleRecord) -> Self {
        ParticleRow {
            label: r.label,
            area: r.area,
            x: r.centroid.x,
            y: r.centroid.y,
            x_min: r.bbox.x_min,
            y_min: r.bbox.y_min,
            x_max: r.bbox.x_max,
            y_max: r.bbox.y_max,
            abs_frame: 1,
            channel: 1,
            slice: 1,
            frame: 1,
            integrated_intensity: r.integrated_intensity,
        }
    }
}

/// A particle in a per-well table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRow {
    #[serde(rename = "NArea")]
    pub area: u64,
    #[serde(rename = "X_(px)")]
    pub x: f64,
    #[serde(rename = "Y_(px)")]
    pub y: f64,
    #[serde(rename = "xMin")]
    pub x_min: u32,
    #[serde(rename = "yMin")]
    pub y_min: u32,
    #[serde(rename = "xMax")]
    pub x_max: u32,
    #[serde(rename = "yMax")]
    pub y_max: u32,
    #[serde(rename = "Abs_frame")]
    pub abs_frame: u32,
    #[serde(rename = "IntegratedInt")]
    pub integrated_intensity: f64,
    #[serde(rename = "FoV")]
    pub fov: String,
    #[serde(rename = "IntPerArea")]
    pub int_per_area: f64,
}

impl SampleRow {
    fn new(fov: &str, p: &ParticleRow) -> SampleRow {
        SampleRow {
            area: p.area,
            x: p.x,
            y: p.y,
            x_min: p.x_min,
            y_min: p.y_min,
            x_max: p.x_max,
            y_max: p.y_max,
            abs_frame: p.abs_frame,
            integrated_intensity: p.integrated_intensity,
            fov: fov.to_owned(),
            int_per_area: p.integrated_intensity / p.area as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    #[serde(rename = "Well")]
    pub well: String,
    #[serde(rename = "NoOfFoV")]
    pub fov_count: usize,
    #[serde(rename = "ParticlePerFoV")]
    pub particles_per_fov: f64,
    #[serde(rename = "MeanSize")]
    pub mean_size: Option<f64>,
    #[serde(rename = "MeanIntegrInt")]
    pub mean_integrated_intensity: Option<f64>,
    #[serde(rename = "MeanIntPerArea")]
    pub mean_int_per_area: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcRow {
    #[serde(rename = "Well")]
    pub well: String,
    #[serde(rename = "FoV")]
    pub fov: String,
    #[serde(rename = "NArea")]
    pub area: u64,
    #[serde(rename = "IntegratedInt")]
    pub integrated_intensity: f64,
    #[serde(rename = "IntPerArea")]
    pub int_per_area: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRow {
    #[serde(rename = "Well")]
    pub well: String,
    #[serde(rename = "ParticlePerFoV")]
    pub particles_per_fov: f64,
    #[serde(rename = "thred_IntPerArea")]
    pub min_int_per_area: f64,
    #[serde(rename = "thred_NArea")]
    pub min_area: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluxRow {
    #[serde(rename = "Field")]
    pub field: String,
    #[serde(rename = "X")]
    pub x: u32,
    #[serde(rename = "Y")]
    pub y: u32,
    #[serde(rename = "Influx")]
    pub influx: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSummaryRow {
    #[serde(rename = "FoV")]
    pub field: String,
    #[serde(rename = "Mean influx")]
    pub mean_influx: Option<f64>,
    #[serde(rename = "Total liposomes")]
    pub total: usize,
    #[serde(rename = "Valid liposomes")]
    pub valid: usize,
    #[serde(rename = "Invalid liposomes")]
    pub invalid: usize,
}

impl From<&FieldSummary> for FieldSummaryRow {
    fn from(s: &FieldSummary) -> Self {
        FieldSummaryRow {
            field: s.field.clone(),
            mean_influx: s.mean_influx,
            total: s.total,
            valid: s.valid,
            invalid: s.invalid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiposomeSummaryRow {
    #[serde(rename = "Sample")]
    pub sample: String,
    #[serde(rename = "NoOfFoV")]
    pub fov_count: usize,
    #[serde(rename = "MeanInflux")]
    pub mean_influx: Option<f64>,
    #[serde(rename = "TotalLiposomes")]
    pub total: usize,
    #[serde(rename = "ValidLiposomes")]
    pub valid: usize,
    #[serde(rename = "InvalidLiposomes")]
    pub invalid: usize,
}

/// Pool the field summaries of one sample. The mean is over every valid
/// liposome of the sample, not over field means.
pub fn summarize_sample(sample: &str, fields: &[FieldSummary]) -> LiposomeSummaryRow {
    let valid = fields.iter().map(|f| f.valid).sum::<usize>();
    let weighted = fields
        .iter()
        .filter_map(|f| f.mean_influx.map(|m| m * f.valid as f64))
        .sum::<f64>();
    LiposomeSummaryRow {
        sample: sample.to_owned(),
        fov_count: fields.len(),
        mean_influx: if valid > 0 {
            Some(weighted / valid as f64)
        } else {
            None
        },
        total: fields.iter().map(|f| f.total).sum(),
        valid,
        invalid: fields.iter().map(|f| f.invalid).sum(),
    }
}

/// Where a project's results live: next to the data directory, named after it
/// with a `_results` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPaths {
    root: PathBuf,
}

impl ResultPaths {
    pub fn for_data(data: &Path) -> ResultPaths {
        let name = data
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data".to_owned());
        let parent = data.parent().unwrap_or_else(|| Path::new(""));
        ResultPaths {
            root: parent.join(format!("{}_results", name)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn samples(&self) -> PathBuf {
        self.root.join("samples")
    }

    pub fn threshold_dir(&self) -> PathBuf {
        self.root.join("Thred_results")
    }

    pub fn fov_table(&self, fov: &str) -> PathBuf {
        self.raw().join(format!("{}_results.csv", fov))
    }

    pub fn fov_mask(&self, fov: &str) -> PathBuf {
        self.raw().join(format!("{}.tif", fov))
    }

    pub fn well_table(&self, well: &str) -> PathBuf {
        self.samples().join(format!("{}.csv", well))
    }

    pub fn summary(&self) -> PathBuf {
        self.root.join("Summary.csv")
    }

    pub fn qc(&self) -> PathBuf {
        self.root.join("QC.csv")
    }

    pub fn threshold_table(&self, name: &str) -> PathBuf {
        self.threshold_dir().join(format!("{}.csv", name))
    }

    pub fn liposome_field_table(&self, sample: &str, field_stem: &str) -> PathBuf {
        self.raw().join(sample).join(format!("{}.csv", field_stem))
    }

    pub fn liposome_sample_table(&self, sample: &str) -> PathBuf {
        self.raw().join(format!("{}.csv", sample))
    }

    /// Create `dirs` under the result root.
    pub fn create(&self, dirs: &[PathBuf]) -> Result<(), ConfigError> {
        for d in std::iter::once(&self.root).chain(dirs) {
            std::fs::create_dir_all(d).map_err(|source| ConfigError::ResultDir {
                path: d.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

fn write_table<'a, R, I>(path: &Path, header: &[&str], rows: I) -> Result<(), ReportError>
where
    R: Serialize + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let csv_err = |source| ReportError::Csv {
        path: path.to_owned(),
        source,
    };
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;
    wtr.write_record(header).map_err(csv_err)?;
    for r in rows {
        wtr.serialize(r).map_err(csv_err)?;
    }
    wtr.flush().map_err(|source| ReportError::Io {
        path: path.to_owned(),
        source,
    })?;
    Ok(())
}

/// Read a table by header name. A missing file reads as `None`.
fn read_table<R: DeserializeOwned>(path: &Path) -> Result<Option<Vec<R>>, ReportError> {
    if !path.is_file() {
        return Ok(None);
    }
    let csv_err = |source| ReportError::Csv {
        path: path.to_owned(),
        source,
    };
    let mut rdr = csv::Reader::from_path(path).map_err(csv_err)?;
    let rows = rdr
        .deserialize()
        .collect::<Result<Vec<R>, _>>()
        .map_err(csv_err)?;
    Ok(Some(rows))
}

pub fn write_particles(path: &Path, particles: &[ParticleRecord]) -> Result<(), ReportError> {
    let rows = particles.iter().map(ParticleRow::from).collect::<Vec<_>>();
    write_table(path, &PARTICLE_HEADER, &rows)
}

pub fn read_particles(path: &Path) -> Result<Option<Vec<ParticleRow>>, ReportError> {
    read_table(path)
}

/// Save a mask as an 8-bit TIFF with particles at 255.
pub fn write_mask(path: &Path, mask: &Mask) -> Result<(), ReportError> {
    let f = File::create(path).map_err(|source| ReportError::Io {
        path: path.to_owned(),
        source,
    })?;
    let tiff_err = |source| ReportError::Tiff {
        path: path.to_owned(),
        source,
    };
    let mut encoder = TiffEncoder::new(BufWriter::new(f)).map_err(tiff_err)?;
    let data = mask
        .as_raw()
        .iter()
        .map(|&m| if m > 0 { 255u8 } else { 0 })
        .collect::<Vec<_>>();
    encoder
        .write_image::<colortype::Gray8>(mask.width(), mask.height(), &data)
        .map_err(tiff_err)?;
    Ok(())
}

/// Everything derived from the per-FoV tables of a SimPull project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reports {
    pub wells: BTreeMap<String, Vec<SampleRow>>,
    pub summary: Vec<SummaryRow>,
    pub qc: Vec<QcRow>,
}

fn mean<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (n, sum) = values.fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Group per-FoV tables into wells and summarise them. FoVs without a table
/// contribute no particles but still count towards their well's FoV total.
pub fn aggregate(
    wells: &BTreeMap<String, Vec<String>>,
    tables: &BTreeMap<String, Vec<ParticleRow>>,
) -> Reports {
    let mut reports = Reports::default();
    for (well, fovs) in wells {
        let mut fov_ids = fovs.clone();
        fov_ids.sort();
        let rows = fov_ids
            .iter()
            .filter_map(|fov| tables.get(fov).map(|t| (fov, t)))
            .flat_map(|(fov, t)| t.iter().map(move |p| SampleRow::new(fov, p)))
            .collect::<Vec<_>>();

        let fov_count = fov_ids.len();
        reports.summary.push(SummaryRow {
            well: well.clone(),
            fov_count,
            particles_per_fov: if fov_count > 0 {
                rows.len() as f64 / fov_count as f64
            } else {
                0.0
            },
            mean_size: mean(rows.iter().map(|r| r.area as f64)),
            mean_integrated_intensity: mean(rows.iter().map(|r| r.integrated_intensity)),
            mean_int_per_area: mean(rows.iter().map(|r| r.int_per_area)),
        });
        reports.qc.extend(rows.iter().map(|r| QcRow {
            well: well.clone(),
            fov: r.fov.clone(),
            area: r.area,
            integrated_intensity: r.integrated_intensity,
            int_per_area: r.int_per_area,
        }));
        reports.wells.insert(well.clone(), rows);
    }
    reports
}

pub fn write_reports(paths: &ResultPaths, reports: &Reports) -> Result<(), ReportError> {
    for (well, rows) in &reports.wells {
        write_table(&paths.well_table(well), &SAMPLE_HEADER, rows)?;
    }
    write_table(&paths.summary(), &SUMMARY_HEADER, &reports.summary)?;
    write_table(&paths.qc(), &QC_HEADER, &reports.qc)?;
    Ok(())
}

pub fn read_summary(path: &Path) -> Result<Vec<SummaryRow>, ReportError> {
    Ok(read_table(path)?.unwrap_or_default())
}

pub fn read_qc(path: &Path) -> Result<Vec<QcRow>, ReportError> {
    Ok(read_table(path)?.unwrap_or_default())
}

/// Particles per FoV of each well counting only particles with at least
/// `min_int_per_area` and `min_area`.
pub fn threshold_report(
    summary: &[SummaryRow],
    qc: &[QcRow],
    min_int_per_area: f64,
    min_area: u64,
) -> Vec<ThresholdRow> {
    summary
        .iter()
        .map(|s| {
            let kept = qc
                .iter()
                .filter(|q| q.well == s.well)
                .filter(|q| q.int_per_area >= min_int_per_area && q.area >= min_area)
                .count();
            ThresholdRow {
                well: s.well.clone(),
                particles_per_fov: if s.fov_count > 0 {
                    kept as f64 / s.fov_count as f64
                } else {
                    0.0
                },
                min_int_per_area,
                min_area,
            }
        })
        .collect()
}

pub fn write_threshold_report(path: &Path, rows: &[ThresholdRow]) -> Result<(), ReportError> {
    write_table(path, &THRESHOLD_HEADER, rows)
}

/// Valid liposomes of one field. `X` is the column, `Y` the row.
pub fn write_influx(path: &Path, records: &[InfluxRecord]) -> Result<(), ReportError> {
    let rows = records
        .iter()
        .filter_map(|r| {
            r.influx.value().map(|influx| InfluxRow {
                field: r.field.clone(),
                x: r.peak.col,
                y: r.peak.row,
                influx,
            })
        })
        .collect::<Vec<_>>();
    write_table(path, &INFLUX_HEADER, &rows)
}

pub fn write_field_summaries(path: &Path, fields: &[FieldSummary]) -> Result<(), ReportError> {
    let rows = fields.iter().map(FieldSummaryRow::from).collect::<Vec<_>>();
    write_table(path, &FIELD_SUMMARY_HEADER, &rows)
}

pub fn write_liposome_summary(path: &Path, rows: &[LiposomeSummaryRow]) -> Result<(), ReportError> {
    write_table(path, &LIPOSOME_SUMMARY_HEADER, rows)
}
