use clap::{ArgEnum, Parser};
use std::path::PathBuf;

pub fn get_args() -> CliOpts {
    CliOpts::parse()
}

#[derive(Parser, Debug)]
#[clap(version = clap::crate_version!())]
pub struct CliOpts {
    #[clap(short, long, parse(from_occurrences))]
    pub verbose: u8,
    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Parser, Debug)]
pub enum SubCommand {
    Simpull(Simpull),
    Reports(Reports),
    Threshold(Threshold),
    Liposome(Liposome),
}

#[derive(ArgEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// built-in matched filter detector
    Trevor,
    /// third party detector; needs a backend linked in by an embedding
    /// program, this binary has none
    External,
}

#[derive(Parser, Debug)]
pub struct Pool {
    /// worker threads, one per core when unset
    #[clap(long)]
    pub threads: Option<usize>,
    /// write intermediate images of every field of view here
    #[clap(long)]
    pub debug_dir: Option<PathBuf>,
}

/// Detect particles in every field of view, then write the reports
#[derive(Parser, Debug)]
pub struct Simpull {
    /// directory holding the .tif fields of view
    pub path: PathBuf,
    /// `external` is only available when the library is embedded with a
    /// detector backend; here it stops with an error before any work
    #[clap(long, arg_enum, default_value = "trevor")]
    pub method: Method,
    /// detection threshold in standard deviations
    #[clap(long, default_value = "3.0")]
    pub threshold: f64,
    /// estimated particle size in pixels, external detector only
    #[clap(long, default_value = "4.0")]
    pub size: f64,
    #[clap(long, default_value = "50")]
    pub tophat_radius: u32,
    #[clap(long, default_value = "1.0")]
    pub kernel_width: f64,
    #[clap(long, default_value = "1")]
    pub erode_radius: u32,
    #[clap(flatten)]
    pub pool: Pool,
}

/// Rebuild the well and summary tables from existing per-FoV results
#[derive(Parser, Debug)]
pub struct Reports {
    pub path: PathBuf,
}

/// Count particles per FoV above an intensity-per-area and size threshold
#[derive(Parser, Debug)]
pub struct Threshold {
    pub path: PathBuf,
    /// name of the saved table
    #[clap(long)]
    pub name: String,
    #[clap(long, default_value = "0")]
    pub min_int_per_area: f64,
    #[clap(long, default_value = "0")]
    pub min_area: u64,
}

/// Measure liposome influx for every sample
#[derive(Parser, Debug)]
pub struct Liposome {
    pub path: PathBuf,
    /// minimum local max - local min difference of a liposome peak
    #[clap(long, default_value = "80")]
    pub threshold: f64,
    #[clap(long, default_value = "3")]
    pub radius: u32,
    #[clap(long, default_value = "30")]
    pub margin: u32,
    /// use the channels as recorded, without registration
    #[clap(long)]
    pub no_align: bool,
    #[clap(flatten)]
    pub pool: Pool,
}
