//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use power_profile_data::{Endianness, ErrorMetric, KeyProjection};

#[derive(Parser)]
#[command(
    name = "power-profile",
    version,
    about = "Turn power/PC sample captures into per-function time and energy profiles",
    after_help = "\
EXAMPLES:
    power-profile postprocess capture.bin -o app.profile -s ./build -v 5
    power-profile aggregate app.profile --aggregate-by function,file,line
    power-profile postprocess capture.bin -o run1.agg --aggregate-by function
    power-profile mean run1.agg run2.agg -o mean.agg -z
    power-profile compare mean.agg.zst run3.agg --limit 0.01"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve the samples of a raw capture and store them as a profile
    Postprocess(PostprocessArgs),
    /// Aggregate full profiles of the same target into their mean
    Aggregate(AggregateArgs),
    /// Average aggregated profiles of separate runs
    Mean(MeanArgs),
    /// Compare aggregated profiles against a baseline
    Compare(CompareArgs),
    /// Print the header and module list of a raw capture
    Info(InfoArgs),
}

#[derive(clap::Args)]
pub struct ByteOrderArgs {
    /// Parse the capture as little endian
    #[arg(short, long, conflicts_with = "big_endian")]
    pub little_endian: bool,

    /// Parse the capture as big endian
    #[arg(short, long)]
    pub big_endian: bool,
}

impl ByteOrderArgs {
    /// The forced byte order, if any. Captures are read in native order otherwise.
    pub fn forced(&self) -> Option<Endianness> {
        if self.little_endian {
            Some(Endianness::LittleEndian)
        } else if self.big_endian {
            Some(Endianness::BigEndian)
        } else {
            None
        }
    }
}

#[derive(clap::Args)]
pub struct PostprocessArgs {
    /// Raw capture written by the sampler
    #[arg(value_name = "CAPTURE")]
    pub capture: PathBuf,

    /// Where to write the profile (compressed if it ends in .zst)
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Directory to search for the binaries named in the capture (repeatable,
    /// the current directory is always searched last)
    #[arg(short, long = "search-path", value_name = "DIR")]
    pub search_path: Vec<PathBuf>,

    /// Supply voltage; without it energies are reported as charge
    #[arg(short, long, default_value = "0")]
    pub volts: f64,

    /// Cpus the profiled process could run on, e.g. 0-3,7
    #[arg(short, long, default_value = "0-3")]
    pub cpus: String,

    #[command(flatten)]
    pub byte_order: ByteOrderArgs,

    /// Kernel symbol table (/proc/kallsyms format) for kernel addresses
    #[arg(short, long, value_name = "FILE")]
    pub kallsyms: Option<PathBuf>,

    /// Textual vm map to use instead of the module list in the capture
    #[arg(long, value_name = "FILE")]
    pub vmmap: Option<PathBuf>,

    /// Store an aggregated profile, keyed by these fields (binary, function, file, line)
    #[arg(long, value_name = "KEYS")]
    pub aggregate_by: Option<KeyProjection>,

    /// Attribute program counters which can't be resolved to _unknown instead of failing
    #[arg(long)]
    pub tolerate_unresolved: bool,

    /// Seconds after which an external symbolizer call is killed
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub tool_timeout: u64,

    /// Compress the output (appends .zst)
    #[arg(short, long)]
    pub zstd: bool,
}

#[derive(clap::Args)]
pub struct AggregateArgs {
    /// Full profiles written by `postprocess`
    #[arg(value_name = "PROFILE", required = true)]
    pub profiles: Vec<PathBuf>,

    /// Where to write the aggregated profile
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Fields to aggregate by (binary, function, file, line)
    #[arg(long, default_value = "binary,function", value_name = "KEYS")]
    pub aggregate_by: KeyProjection,

    /// Only print the hottest entries which make up this fraction of the total
    #[arg(long, value_name = "F")]
    pub top_fraction: Option<f64>,

    /// Compress the output (appends .zst)
    #[arg(short, long)]
    pub zstd: bool,
}

#[derive(clap::Args)]
pub struct MeanArgs {
    /// Aggregated profiles
    #[arg(value_name = "PROFILE", required = true)]
    pub profiles: Vec<PathBuf>,

    /// Where to write the mean profile
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Only print the hottest entries which make up this fraction of the total
    #[arg(long, value_name = "F")]
    pub top_fraction: Option<f64>,

    /// Compress the output (appends .zst)
    #[arg(short, long)]
    pub zstd: bool,
}

#[derive(clap::Args)]
pub struct CompareArgs {
    /// Aggregated profile to compare against
    #[arg(value_name = "BASELINE")]
    pub baseline: PathBuf,

    /// Aggregated profiles to compare
    #[arg(value_name = "PROFILE", required = true)]
    pub profiles: Vec<PathBuf>,

    /// difference, absolute-difference, error, absolute-error, weighted-error
    /// or weighted-absolute-error
    #[arg(long, default_value = "weighted-absolute-error")]
    pub metric: ErrorMetric,

    /// Only report errors of at least this magnitude (0 = all)
    #[arg(long, default_value = "0")]
    pub limit: f64,
}

#[derive(clap::Args)]
pub struct InfoArgs {
    /// Raw capture written by the sampler
    #[arg(value_name = "CAPTURE")]
    pub capture: PathBuf,

    #[command(flatten)]
    pub byte_order: ByteOrderArgs,
}
