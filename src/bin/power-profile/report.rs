//! Plain text tables for the terminal

use power_profile_data::capture::{CaptureHeader, ModuleRecord};
use power_profile_data::{AggregateEntry, Deviation, Endianness, ProfileContainer};

const TOTAL_LABEL: &str = "_total";

/// Print the entries of an aggregated profile, hottest first, below a total row.
pub fn print_profile(
    profile: &ProfileContainer,
    top_fraction: Option<f64>,
) -> anyhow::Result<()> {
    let table = profile.aggregation_table()?;
    let entries = match top_fraction {
        Some(fraction) => table.top_fraction(fraction)?,
        None => table.hottest_first(),
    };
    let total = table.total();

    let samples = profile.samples.max(f64::MIN_POSITIVE);
    println!(
        "{}, {:.2} Hz, {:.2} samples, {:.2} us latency{}",
        profile.target,
        samples / profile.sampling_time.max(f64::MIN_POSITIVE),
        profile.samples,
        profile.latency_time / samples * 1_000_000.0,
        if profile.mean > 1 {
            format!(", mean of {} runs", profile.mean)
        } else {
            String::new()
        }
    );

    let (power_header, energy_header) = if profile.uses_volts() {
        ("Power [W]", "Energy [J]")
    } else {
        ("Current [A]", "Charge [C]")
    };
    let width = entries
        .iter()
        .map(|entry| entry.label.len())
        .chain([TOTAL_LABEL.len(), "Function".len()])
        .max()
        .unwrap_or_default();

    println!(
        "{:<width$}  {:>12}  {:>12}  {:>12}",
        "Function", "Time [s]", power_header, energy_header
    );
    let total_power = if total.time > 0.0 {
        total.energy / total.time
    } else {
        0.0
    };
    print_row(TOTAL_LABEL, total.time, total_power, total.energy, width);
    for entry in entries {
        print_entry(entry, width);
    }
    Ok(())
}

fn print_entry(entry: &AggregateEntry, width: usize) {
    print_row(&entry.label, entry.time, entry.power(), entry.energy, width);
}

fn print_row(label: &str, time: f64, power: f64, energy: f64, width: usize) {
    println!("{label:<width$}  {time:>12.6}  {power:>12.4}  {energy:>12.6}");
}

/// Print the deviations of one profile from the baseline.
pub fn print_deviations(name: &str, deviations: &[Deviation]) {
    println!("{name}:");
    let width = deviations
        .iter()
        .map(|deviation| deviation.label.len())
        .chain(["Function".len()])
        .max()
        .unwrap_or_default();
    println!(
        "{:<width$}  {:>12}  {:>12}  {:>12}",
        "Function", "Baseline", "Profile", "Error"
    );
    for deviation in deviations {
        println!(
            "{:<width$}  {:>12.6}  {:>12.6}  {:>12.6}",
            deviation.label, deviation.baseline, deviation.other, deviation.error
        );
    }
}

/// Print what a capture contains without resolving anything.
pub fn print_capture_info(endian: Endianness, header: &CaptureHeader, modules: &[ModuleRecord]) {
    let samples = header.sample_count.max(1) as f64;
    println!("Byte order:        {endian:?}");
    println!("Samples:           {}", header.sample_count);
    println!("Sampling time:     {:.6} s", header.sampling_time());
    println!("Latency time:      {:.6} s", header.latency_time());
    println!("Frequency:         {:.2} Hz", header.frequency());
    println!(
        "Per sample:        {:.2} us wall, {:.2} us latency",
        header.wall_time_us as f64 / samples,
        header.latency_time_us as f64 / samples
    );
    println!("Modules:           {}", header.module_count);
    for module in modules {
        println!("  {:#018x} - {:#018x} {}", module.start, module.end(), module.label);
    }
}
