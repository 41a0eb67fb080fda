//! Find fields of view on disk and group them into wells or samples.

use crate::error::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

const REFERENCE_DIR: &str = "Ionomycin";
const SAMPLE_DIR: &str = "Sample";
const BLANK_DIR: &str = "Blank";
const RESULTS_DIR: &str = "results";

/// Position code embedded in a SimPull image name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingSystem {
    /// `X{n}Y{n}R{n}W{n}C{n}`
    Xyrwc,
    /// `X{n}Y{n}R{n}W{n}`
    Xyrw,
    /// `Pos{n}`
    Pos,
}

impl fmt::Display for NamingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NamingSystem::Xyrwc => "XnYnRnWnCn",
            NamingSystem::Xyrw => "XnYnRnWn",
            NamingSystem::Pos => "Posn",
        };
        f.write_str(s)
    }
}

static PATTERNS: Lazy<Patterns> = Lazy::new(Patterns::new);

struct Patterns {
    systems: Vec<(NamingSystem, Regex)>,
    well: Regex,
}

impl Patterns {
    fn new() -> Patterns {
        let compile = |p: &str| Regex::new(p).expect("position pattern is valid");
        Patterns {
            systems: vec![
                (NamingSystem::Xyrwc, compile(r"X\d+Y\d+R\d+W\d+C\d+")),
                (NamingSystem::Xyrw, compile(r"X\d+Y\d+R\d+W\d+")),
                (NamingSystem::Pos, compile(r"Pos\d+")),
            ],
            well: compile(r"^X\d+Y\d+"),
        }
    }

    /// The last match of the first naming system that matches at all.
    fn position(&self, name: &str) -> Option<(NamingSystem, String)> {
        self.systems.iter().find_map(|(system, re)| {
            re.find_iter(name)
                .last()
                .map(|m| (*system, m.as_str().to_owned()))
        })
    }

    fn well(&self, system: NamingSystem, position: &str) -> String {
        match system {
            NamingSystem::Pos => position.to_owned(),
            _ => self
                .well
                .find(position)
                .map(|m| m.as_str().to_owned())
                .unwrap_or_else(|| position.to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOfView {
    /// position code, unique within a project
    pub id: String,
    pub well: String,
    pub path: PathBuf,
}

/// Fields of view of a SimPull project, sorted by id, and their wells.
#[derive(Debug, Clone, Default)]
pub struct SimPullLayout {
    pub fovs: Vec<FieldOfView>,
    pub wells: BTreeMap<String, Vec<String>>,
}

impl SimPullLayout {
    pub fn fov_count(&self, well: &str) -> usize {
        self.wells.get(well).map(|f| f.len()).unwrap_or(0)
    }
}

fn is_tif(p: &Path) -> bool {
    p.extension().map(|e| e == "tif").unwrap_or(false)
}

fn is_hidden(p: &Path) -> bool {
    p.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let scan_err = |source| ConfigError::Scan {
        path: dir.to_owned(),
        source,
    };
    let mut entries = std::fs::read_dir(dir)
        .map_err(scan_err)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(scan_err)?;
    entries.sort();
    Ok(entries)
}

fn collect_tifs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ConfigError> {
    for p in read_dir_sorted(dir)? {
        if p.is_dir() {
            collect_tifs(&p, out)?;
        } else if is_tif(&p) {
            out.push(p);
        }
    }
    Ok(())
}

fn require_dir(root: &Path) -> Result<(), ConfigError> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::MissingDataPath(root.to_owned()))
    }
}

/// Walk `root` for `.tif` images and key each by its position code.
///
/// Every image must carry a recognised code. When two images share a code
/// the later one in path order wins.
pub fn discover_simpull(root: &Path) -> Result<SimPullLayout, ConfigError> {
    require_dir(root)?;
    let mut images = Vec::new();
    collect_tifs(root, &mut images)?;
    if images.is_empty() {
        return Err(ConfigError::NoImages(root.to_owned()));
    }

    let patterns = &*PATTERNS;
    let mut by_id = BTreeMap::new();
    for path in images {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let (naming, id) = patterns
            .position(name)
            .ok_or_else(|| ConfigError::UnrecognizedNaming(path.clone()))?;
        let well = patterns.well(naming, &id);
        if let Some(prev) = by_id.insert(
            id.clone(),
            FieldOfView {
                id: id.clone(),
                well,
                path: path.clone(),
            },
        ) {
            log::warn!("{:?} and {:?} are both {}, keeping the latter", prev.path, path, id);
        }
    }

    let fovs = by_id.into_values().collect::<Vec<_>>();
    let mut wells: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for f in &fovs {
        wells.entry(f.well.clone()).or_default().push(f.id.clone());
    }
    log::info!("found {} fields of view in {} wells", fovs.len(), wells.len());
    Ok(SimPullLayout { fovs, wells })
}

/// One field of the liposome assay: the same file name under each channel
/// directory of a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiposomeField {
    /// file name, shared by the three channels
    pub name: String,
    pub reference: PathBuf,
    pub sample: PathBuf,
    pub blank: PathBuf,
}

impl LiposomeField {
    /// file name without extension
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiposomeSample {
    pub name: String,
    pub dir: PathBuf,
    pub fields: Vec<LiposomeField>,
}

fn dir_name(p: &Path) -> String {
    p.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| p.to_string_lossy().into_owned())
}

fn sample_fields(dir: &Path) -> Result<Vec<LiposomeField>, ConfigError> {
    let reference = dir.join(REFERENCE_DIR);
    let fields = read_dir_sorted(&reference)?
        .into_iter()
        .filter(|p| p.is_file() && is_tif(p))
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .map(|name| LiposomeField {
            reference: reference.join(&name),
            sample: dir.join(SAMPLE_DIR).join(&name),
            blank: dir.join(BLANK_DIR).join(&name),
            name,
        })
        .collect();
    Ok(fields)
}

/// A root holding an `Ionomycin` directory is a single sample; otherwise
/// each visible subdirectory other than `results` is one. Samples without
/// reference images are skipped.
pub fn discover_liposome(root: &Path) -> Result<Vec<LiposomeSample>, ConfigError> {
    require_dir(root)?;
    let candidates = if root.join(REFERENCE_DIR).is_dir() {
        vec![root.to_owned()]
    } else {
        read_dir_sorted(root)?
            .into_iter()
            .filter(|p| p.is_dir() && !is_hidden(p) && dir_name(p) != RESULTS_DIR)
            .collect()
    };

    let mut samples = Vec::new();
    for dir in candidates {
        if !dir.join(REFERENCE_DIR).is_dir() {
            log::warn!("skip {:?}, no data found in the sample folder", dir);
            continue;
        }
        let fields = sample_fields(&dir)?;
        samples.push(LiposomeSample {
            name: dir_name(&dir),
            dir,
            fields,
        });
    }
    if samples.is_empty() {
        return Err(ConfigError::NoImages(root.to_owned()));
    }
    log::info!("found {} liposome samples", samples.len());
    Ok(samples)
}
