//! Particle counting for single-molecule pull-down images and influx
//! measurement for liposome assays.

pub use batch::{BatchOptions, CancelToken, Progress};
pub use config::{AlignmentMethod, DetectionMethod, ExternalSettings, LiposomeSettings, TrevorSettings};
pub use detector::{Detection, ExternalBackend, ExternalDetector, Located, ParticleDetector};
pub use loader::load_from_path;
pub use object_debugger::ImageDebugConfig;
pub use point::{BoundingBox, ParticleRecord, Point};
pub use project::{DetectionSummary, LiposomeOutcome, LiposomeProject, SimPullProject};
pub use raster::{FloatImage, LabelImage, Mask};
pub use trevor::TrevorExtractor;

pub mod batch;
pub mod config;
pub mod detector;
pub mod discovery;
pub mod error;
pub mod liposome;
pub mod report;
pub mod trevor;

mod label;
mod loader;
mod morphology;
mod object_debugger;
mod point;
mod project;
mod raster;
mod resample;

#[cfg(test)]
mod test_utils;
