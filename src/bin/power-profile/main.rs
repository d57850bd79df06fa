//! # power-profile - Main Entry Point
//!
//! One subcommand per processing step:
//! - **postprocess**: raw capture -> full (or aggregated) profile
//! - **aggregate**: full profiles -> aggregated profile
//! - **mean**: aggregated profiles -> their weighted mean
//! - **compare**: aggregated profiles -> error against a baseline
//! - **info**: raw capture -> header figures and module list

mod cli;
mod report;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use power_profile_data::capture::RawCapture;
use power_profile_data::{
    aggregate_profiles, combine, compare_profiles, is_compressed_path, parse_cpu_range,
    parse_vmmap_text, postprocess, read_profile, with_current_dir, write_profile, Endianness,
    Error, KernelSymbols, ModuleMap, PostprocessOptions, ProcessBackend, ResolutionPolicy,
    SymbolResolver, AGGREGATED_PROFILE_VERSION, COMPRESSED_EXTENSION, FULL_PROFILE_VERSION,
};

use cli::{AggregateArgs, Args, Command, CompareArgs, InfoArgs, MeanArgs, PostprocessArgs};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    std::process::exit(match run(args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Postprocess(args) => run_postprocess(args),
        Command::Aggregate(args) => run_aggregate(args),
        Command::Mean(args) => run_mean(args),
        Command::Compare(args) => run_compare(args),
        Command::Info(args) => run_info(args),
    }
}

fn run_postprocess(args: PostprocessArgs) -> Result<()> {
    // Validate arguments before doing any work.
    let cpus = parse_cpu_range(&args.cpus)?;
    let search_paths = with_current_dir(args.search_path);

    let data = fs::read(&args.capture)
        .with_context(|| format!("failed to read {}", args.capture.display()))?;
    let mut capture = RawCapture::parse(&data, args.byte_order.forced())?;
    drop(data);
    info!(
        "Read {} raw samples and {} modules",
        capture.samples.len(),
        capture.modules.len()
    );

    if let Some(vmmap) = &args.vmmap {
        let text = fs::read_to_string(vmmap)
            .with_context(|| format!("failed to read {}", vmmap.display()))?;
        capture.modules = parse_vmmap_text(&text)?;
    }

    let mut backend =
        ProcessBackend::new().with_timeout(Duration::from_secs(args.tool_timeout));
    let mut modules = ModuleMap::load(&capture.modules, &search_paths, &mut backend)?;
    if let Some(kallsyms) = &args.kallsyms {
        let text = fs::read_to_string(kallsyms)
            .with_context(|| format!("failed to read {}", kallsyms.display()))?;
        let symbols = KernelSymbols::parse(&text)?;
        info!("Loaded {} kernel symbols", symbols.len());
        modules.set_kernel_symbols(symbols);
    }

    let policy = if args.tolerate_unresolved {
        ResolutionPolicy::MarkUnknown
    } else {
        ResolutionPolicy::Abort
    };
    let mut resolver = SymbolResolver::new(modules, backend).with_policy(policy);
    let options = PostprocessOptions {
        volts: args.volts,
        cpus,
        aggregate_by: args.aggregate_by,
    };
    let profile = postprocess(&capture, &mut resolver, &options)?;

    write_profile(&output_path(args.output, args.zstd), &profile)?;
    Ok(())
}

fn run_aggregate(args: AggregateArgs) -> Result<()> {
    if let Some(fraction) = args.top_fraction {
        check_fraction(fraction)?;
    }
    let profiles = args
        .profiles
        .iter()
        .map(|path| read_profile(path, FULL_PROFILE_VERSION))
        .collect::<Result<Vec<_>, _>>()?;
    let aggregated = aggregate_profiles(&profiles, args.aggregate_by)?;
    drop(profiles);

    if let Some(output) = args.output {
        write_profile(&output_path(output, args.zstd), &aggregated)?;
    }
    report::print_profile(&aggregated, args.top_fraction)
}

fn run_mean(args: MeanArgs) -> Result<()> {
    if let Some(fraction) = args.top_fraction {
        check_fraction(fraction)?;
    }
    let profiles = args
        .profiles
        .iter()
        .map(|path| read_profile(path, AGGREGATED_PROFILE_VERSION))
        .collect::<Result<Vec<_>, _>>()?;
    info!("Calculating mean of {} profiles", profiles.len());
    let mean = combine(&profiles)?;

    write_profile(&output_path(args.output, args.zstd), &mean)?;
    report::print_profile(&mean, args.top_fraction)
}

fn run_compare(args: CompareArgs) -> Result<()> {
    let baseline = read_profile(&args.baseline, AGGREGATED_PROFILE_VERSION)?;
    for path in &args.profiles {
        let profile = read_profile(path, AGGREGATED_PROFILE_VERSION)?;
        let deviations = compare_profiles(&baseline, &profile, args.metric, args.limit)?;
        report::print_deviations(&path.display().to_string(), &deviations);
    }
    Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
    let data = fs::read(&args.capture)
        .with_context(|| format!("failed to read {}", args.capture.display()))?;
    let endian = Endianness::forced_or_native(args.byte_order.forced());
    let (header, modules) = RawCapture::parse_without_samples(&data, Some(endian))?;
    report::print_capture_info(endian, &header, &modules);
    Ok(())
}

fn check_fraction(fraction: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(Error::InvalidFraction(fraction).into());
    }
    Ok(())
}

/// Append the compressed extension to `path` if requested and not already present.
fn output_path(path: PathBuf, compress: bool) -> PathBuf {
    if !compress || is_compressed_path(&path) {
        return path;
    }
    let mut name = path.into_os_string();
    name.push(".");
    name.push(COMPRESSED_EXTENSION);
    PathBuf::from(name)
}
