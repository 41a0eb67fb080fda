//! Whole-directory runs: discover, process every field of view on the worker
//! pool, then write the tables.

use crate::batch::{run_batch, BatchOptions, Progress};
use crate::config::LiposomeSettings;
use crate::detector::ParticleDetector;
use crate::discovery::{discover_liposome, discover_simpull, FieldOfView, LiposomeField, LiposomeSample, SimPullLayout};
use crate::error::{ConfigError, FovError, ProjectError};
use crate::liposome::{analyse_field, FieldChannels, FieldSummary};
use crate::loader::load_from_path;
use crate::object_debugger::ImageDebugConfig;
use crate::report::{self, LiposomeSummaryRow, Reports, ResultPaths, ThresholdRow};
use std::collections::BTreeMap;
use std::path::Path;

/// Counts from one detection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionSummary {
    pub processed: usize,
    pub failed: usize,
    pub particles: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct SimPullProject {
    layout: SimPullLayout,
    paths: ResultPaths,
}

impl SimPullProject {
    pub fn open(data: &Path) -> Result<SimPullProject, ConfigError> {
        let layout = discover_simpull(data)?;
        Ok(SimPullProject {
            layout,
            paths: ResultPaths::for_data(data),
        })
    }

    pub fn layout(&self) -> &SimPullLayout {
        &self.layout
    }

    pub fn paths(&self) -> &ResultPaths {
        &self.paths
    }

    /// Run `detector` over every field of view, writing one table (and mask,
    /// if the detector makes one) per FoV. A FoV that fails is logged and
    /// left with an empty table.
    pub fn run_detection<P>(
        &self,
        detector: &dyn ParticleDetector,
        options: &BatchOptions,
        progress: P,
    ) -> Result<DetectionSummary, ProjectError>
    where
        P: Fn(Progress) + Sync,
    {
        self.paths.create(&[self.paths.raw()])?;
        log::info!(
            "running {} detection over {} fields of view",
            detector.name(),
            self.layout.fovs.len()
        );

        let outcome = run_batch(
            &self.layout.fovs,
            options,
            |fov| match detect_fov(detector, fov, &self.paths) {
                Ok(n) => Some(n),
                Err(e) => {
                    log::warn!("skip {}: {}", fov.id, e);
                    if let Err(e) = report::write_particles(&self.paths.fov_table(&fov.id), &[]) {
                        log::warn!("{}", e);
                    }
                    None
                }
            },
            progress,
        )?;

        let summary = DetectionSummary {
            processed: outcome.results.len(),
            failed: outcome.results.iter().filter(|r| r.is_none()).count(),
            particles: outcome.results.iter().flatten().sum(),
            cancelled: outcome.cancelled,
        };
        log::info!(
            "{} fields of view processed, {} failed, {} particles",
            summary.processed,
            summary.failed,
            summary.particles
        );
        Ok(summary)
    }

    /// Rebuild the per-well tables, `Summary.csv` and `QC.csv` from the
    /// per-FoV tables on disk.
    pub fn generate_reports(&self) -> Result<Reports, ProjectError> {
        let mut tables = BTreeMap::new();
        for fov in &self.layout.fovs {
            match report::read_particles(&self.paths.fov_table(&fov.id)) {
                Ok(Some(rows)) => {
                    tables.insert(fov.id.clone(), rows);
                }
                Ok(None) => log::debug!("no results for {}", fov.id),
                Err(e) => log::warn!("ignoring results of {}: {}", fov.id, e),
            }
        }

        let reports = report::aggregate(&self.layout.wells, &tables);
        self.paths.create(&[self.paths.samples()])?;
        report::write_reports(&self.paths, &reports)?;
        log::info!(
            "wrote reports for {} wells to {:?}",
            reports.summary.len(),
            self.paths.root()
        );
        Ok(reports)
    }

    /// Particles per FoV of each well above both thresholds, saved as
    /// `Thred_results/<name>.csv`. Reports are generated first when missing.
    pub fn threshold_report(
        &self,
        name: &str,
        min_int_per_area: f64,
        min_area: u64,
    ) -> Result<Vec<ThresholdRow>, ProjectError> {
        let (summary, qc) = if self.paths.summary().is_file() {
            (
                report::read_summary(&self.paths.summary())?,
                report::read_qc(&self.paths.qc())?,
            )
        } else {
            let r = self.generate_reports()?;
            (r.summary, r.qc)
        };

        let rows = report::threshold_report(&summary, &qc, min_int_per_area, min_area);
        self.paths.create(&[self.paths.threshold_dir()])?;
        let out = self.paths.threshold_table(name);
        report::write_threshold_report(&out, &rows)?;
        log::info!("threshold report saved to {:?}", out);
        Ok(rows)
    }
}

fn detect_fov(detector: &dyn ParticleDetector, fov: &FieldOfView, paths: &ResultPaths) -> Result<usize, FovError> {
    let img = load_from_path(&fov.path)?;
    let detection = detector.detect(&fov.id, &img)?;
    report::write_particles(&paths.fov_table(&fov.id), &detection.particles)?;
    if let Some(mask) = &detection.mask {
        report::write_mask(&paths.fov_mask(&fov.id), mask)?;
    }
    log::debug!("{}: {} particles", fov.id, detection.particles.len());
    Ok(detection.particles.len())
}

#[derive(Debug, Clone)]
pub struct LiposomeProject {
    samples: Vec<LiposomeSample>,
    settings: LiposomeSettings,
    paths: ResultPaths,
}

/// Per-sample results of a liposome run.
#[derive(Debug, Clone, PartialEq)]
pub struct LiposomeOutcome {
    pub fields: BTreeMap<String, Vec<FieldSummary>>,
    pub summary: Vec<LiposomeSummaryRow>,
    pub cancelled: bool,
}

impl LiposomeProject {
    pub fn open(data: &Path, settings: LiposomeSettings) -> Result<LiposomeProject, ConfigError> {
        settings.validate()?;
        let samples = discover_liposome(data)?;
        Ok(LiposomeProject {
            samples,
            settings,
            paths: ResultPaths::for_data(data),
        })
    }

    pub fn samples(&self) -> &[LiposomeSample] {
        &self.samples
    }

    pub fn paths(&self) -> &ResultPaths {
        &self.paths
    }

    /// Analyse every field of every sample, then write the per-field,
    /// per-sample and project tables. Failed fields are logged and left out.
    /// A cancelled run leaves the sample and project tables untouched.
    pub fn run<P>(
        &self,
        debug: &ImageDebugConfig,
        options: &BatchOptions,
        progress: P,
    ) -> Result<LiposomeOutcome, ProjectError>
    where
        P: Fn(Progress) + Sync,
    {
        let mut dirs = vec![self.paths.raw()];
        dirs.extend(self.samples.iter().map(|s| self.paths.raw().join(&s.name)));
        self.paths.create(&dirs)?;

        let jobs = self
            .samples
            .iter()
            .flat_map(|s| s.fields.iter().map(move |f| (s.name.as_str(), f)))
            .collect::<Vec<_>>();
        log::info!(
            "analysing {} fields in {} samples",
            jobs.len(),
            self.samples.len()
        );

        let outcome = run_batch(
            &jobs,
            options,
            |(sample, field)| match self.analyse(sample, field, debug) {
                Ok(s) => Some((sample.to_string(), s)),
                Err(e) => {
                    log::warn!("skip {} of {}: {}", field.name, sample, e);
                    None
                }
            },
            progress,
        )?;

        let mut fields: BTreeMap<String, Vec<FieldSummary>> =
            self.samples.iter().map(|s| (s.name.clone(), vec![])).collect();
        for (sample, summary) in outcome.results.into_iter().flatten() {
            fields.entry(sample).or_default().push(summary);
        }
        if outcome.cancelled {
            log::warn!("liposome run cancelled, sample tables not written");
            return Ok(LiposomeOutcome {
                fields,
                summary: vec![],
                cancelled: true,
            });
        }

        let mut summary = Vec::new();
        for (sample, rows) in &fields {
            report::write_field_summaries(&self.paths.liposome_sample_table(sample), rows)?;
            let pooled = report::summarize_sample(sample, rows);
            log::info!(
                "{}: {} liposomes, {} valid, mean influx {:?}",
                sample,
                pooled.total,
                pooled.valid,
                pooled.mean_influx
            );
            summary.push(pooled);
        }
        report::write_liposome_summary(&self.paths.summary(), &summary)?;

        Ok(LiposomeOutcome {
            fields,
            summary,
            cancelled: outcome.cancelled,
        })
    }

    fn analyse(&self, sample: &str, field: &LiposomeField, debug: &ImageDebugConfig) -> Result<FieldSummary, FovError> {
        let channels = FieldChannels {
            reference: load_from_path(&field.reference)?,
            sample: load_from_path(&field.sample)?,
            blank: load_from_path(&field.blank)?,
        };
        let result = analyse_field(&field.name, &channels, &self.settings, &debug.subdir(sample))?;
        report::write_influx(
            &self.paths.liposome_field_table(sample, field.stem()),
            &result.records,
        )?;
        Ok(result.summary)
    }
}
