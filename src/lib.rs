//! A decoder and symbol-resolving aggregation pipeline for power profiles.
//!
//! A sampler periodically records the supply current (or power) of a device
//! together with the program counter and cumulative cpu time of every thread
//! of the profiled process, and writes a binary capture when it's done. This
//! crate turns such a capture into a profile of time and energy per
//! function, file or line:
//!
//! 1. [`capture::RawCapture`] decodes the capture into samples and the list of
//!    loaded modules.
//! 2. A [`SymbolResolver`] maps every program counter to a
//!    [`ResolvedLocation`], using a [`ModuleMap`] built from the module list and
//!    a [`SymbolBackend`] which runs binutils.
//! 3. [`postprocess`] turns the samples into a [`ProfileContainer`], which
//!    either keeps every sample or aggregates them into an [`AggregationTable`].
//! 4. [`aggregate_profiles`], [`combine`] and [`compare_profiles`] work on
//!    stored containers.
//!
//! # Example
//!
//! ```
//! use power_profile_data::capture::RawCapture;
//! use power_profile_data::{
//!     postprocess, KeyProjection, ModuleMap, PostprocessOptions, ProcessBackend, SymbolResolver,
//! };
//!
//! # fn wrapper() -> Result<(), power_profile_data::Error> {
//! let data = std::fs::read("capture.bin")?;
//! let capture = RawCapture::parse(&data, None)?;
//!
//! let mut backend = ProcessBackend::new();
//! let search_paths = vec![std::path::PathBuf::from("/usr/lib")];
//! let modules = ModuleMap::load(&capture.modules, &search_paths, &mut backend)?;
//! let mut resolver = SymbolResolver::new(modules, backend);
//!
//! let options = PostprocessOptions {
//!     volts: 5.0,
//!     cpus: vec![0, 1, 2, 3],
//!     aggregate_by: Some(KeyProjection::default()),
//! };
//! let profile = postprocess(&capture, &mut resolver, &options)?;
//! for entry in profile.aggregation_table()?.hottest_first() {
//!     println!("{}: {:.4} s, {:.2} J", entry.label, entry.time, entry.energy);
//! }
//! # Ok(())
//! # }
//! ```

mod aggregate;
pub mod aggregation;
pub mod capture;
mod compare;
mod container;
mod cpu_range;
#[cfg(feature = "zstd")]
mod decompression;
mod endianness;
mod error;
mod mean;
mod module_map;
mod postprocess;
mod storage;
pub mod symbols;

pub use aggregate::{aggregate_profiles, apportion, Aggregator, SampleScale};
pub use aggregation::{
    AggregateEntry, AggregationKey, AggregationTable, Contribution, KeyField, KeyProjection,
};
pub use compare::{compare_profiles, Deviation, ErrorMetric};
pub use container::{
    AggregatedProfile, FullProfile, ProcessedSample, ProcessedThread, ProfileContainer,
    ProfileContent, ProfileMetadata, AGGREGATED_PROFILE_VERSION, FULL_PROFILE_VERSION,
};
pub use cpu_range::parse_cpu_range;
pub use endianness::Endianness;
pub use error::{Error, ErrorCategory, ReadError};
pub use mean::combine;
pub use module_map::{parse_vmmap_text, with_current_dir, KernelSymbols, ModuleMap, ModuleRange};
pub use postprocess::{postprocess, PostprocessOptions};
pub use storage::{is_compressed_path, read_profile, write_profile, COMPRESSED_EXTENSION};
pub use symbols::{
    ProcessBackend, ResolutionPolicy, ResolvedLocation, SourceLine, SymbolBackend,
    SymbolResolver, SymbolTables,
};
