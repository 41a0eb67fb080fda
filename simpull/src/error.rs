use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageReadError {
    #[error("could not open: {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode tiff: {path:?}")]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },
    #[error("could not decode image: {path:?}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("frame {frame} of {path:?} is {found:?}, first frame is {expected:?}")]
    FrameMismatch {
        path: PathBuf,
        frame: usize,
        expected: (u32, u32),
        found: (u32, u32),
    },
    #[error("{path:?} has {samples} samples per pixel, expected a single channel")]
    NotGrayscale { path: PathBuf, samples: usize },
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("image is {width}x{height}, smaller than the {kernel}x{kernel} filter kernel")]
    ImageTooSmall { width: u32, height: u32, kernel: usize },
    #[error("mask covers the whole image, no background left to reconstruct")]
    SaturatedMask,
    #[error("ran out of labels for objects")]
    ExhaustedLabels,
    #[error("channel is {found:?}, reference is {expected:?}")]
    ShapeMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },
    #[error("external detector failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("data path is not a directory: {0:?}")]
    MissingDataPath(PathBuf),
    #[error("could not scan: {path:?}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "invalid naming system for image {0:?}, supported naming systems are XnYnRnWnCn, XnYnRnWn and Posn"
    )]
    UnrecognizedNaming(PathBuf),
    #[error("no .tif images found under {0:?}")]
    NoImages(PathBuf),
    #[error("{name} must be {expected}, got {value}")]
    InvalidParameter {
        name: &'static str,
        expected: &'static str,
        value: f64,
    },
    #[error("external detection needs a backend, none was supplied")]
    MissingBackend,
    #[error("could not create result directory: {path:?}")]
    ResultDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not start worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("csv failure in {path:?}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("could not write mask {path:?}")]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },
    #[error("io failure on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that stops a single field of view. The batch logs these and moves
/// on.
#[derive(Error, Debug)]
pub enum FovError {
    #[error(transparent)]
    Read(#[from] ImageReadError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Report(#[from] ReportError),
}
