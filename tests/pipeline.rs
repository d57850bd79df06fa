//! Tests for post processing, aggregation, storage and combination of profiles

mod common;

use std::fs;

use common::FakeBackend;
use power_profile_data::capture::{CaptureWriter, ModuleRecord, RawCapture, RawSample, ThreadSample};
use power_profile_data::{
    aggregate_profiles, combine, compare_profiles, postprocess, read_profile, write_profile,
    AggregationKey, AggregationTable, Contribution, Endianness, Error, ErrorCategory, ErrorMetric,
    KeyField, KeyProjection, ModuleMap, PostprocessOptions, ProfileContainer, ProfileMetadata,
    ResolvedLocation, SymbolResolver, SymbolTables, AGGREGATED_PROFILE_VERSION,
    FULL_PROFILE_VERSION,
};

const APP_START: u64 = 0x40_0000;

/// A capture of two samples of one thread inside `app`, 5 ms apart, with the
/// thread busy for all of the second interval.
fn two_sample_capture() -> RawCapture {
    let samples = vec![
        RawSample {
            metric: 1.0,
            threads: vec![ThreadSample {
                tid: 7,
                pc: APP_START + 0x100,
                cpu_time_ns: 20_000_000,
            }],
        },
        RawSample {
            metric: 1.0,
            threads: vec![ThreadSample {
                tid: 7,
                pc: APP_START + 0x200,
                cpu_time_ns: 25_000_000,
            }],
        },
    ];
    let modules = vec![ModuleRecord {
        start: APP_START,
        size: 0x1000,
        label: "app".to_string(),
    }];
    let data = CaptureWriter::new(Endianness::LittleEndian)
        .to_vec(10_000, 20, &samples, &modules)
        .unwrap();
    RawCapture::parse(&data, Some(Endianness::LittleEndian)).unwrap()
}

fn work_backend() -> FakeBackend {
    FakeBackend::default()
        .with_line(0x100, "_Z4workv", "work.cpp", 42)
        .with_line(0x200, "_Z4workv", "work.cpp", 42)
        .with_demangled("_Z4workv", "work()")
}

fn run_postprocess(
    capture: &RawCapture,
    aggregate_by: Option<KeyProjection>,
) -> (ProfileContainer, FakeBackend) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app"), b"\x7fELF").unwrap();
    let mut backend = work_backend();
    let modules = ModuleMap::load(&capture.modules, &[dir.path().to_owned()], &mut backend).unwrap();
    let mut resolver = SymbolResolver::new(modules, &mut backend);
    let options = PostprocessOptions {
        volts: 0.0,
        cpus: vec![0, 1, 2, 3],
        aggregate_by,
    };
    let profile = postprocess(capture, &mut resolver, &options).unwrap();
    (profile, backend)
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-12,
        "{actual} is not close to {expected}"
    );
}

/// Test that two samples in one function aggregate into a single entry
#[test]
fn test_end_to_end() {
    let capture = two_sample_capture();
    let projection = KeyProjection::from_fields(&[KeyField::Function]);
    let (profile, backend) = run_postprocess(&capture, Some(projection));

    assert_eq!(profile.version, AGGREGATED_PROFILE_VERSION);
    assert_eq!(profile.target, "app");
    assert_eq!(profile.mean, 1);
    assert_eq!(profile.cpus, 4);
    assert_eq!(backend.address_calls, 2);
    assert_eq!(backend.demangle_calls, 1);

    let table = profile.aggregation_table().unwrap();
    assert_eq!(table.projection(), projection);
    assert_eq!(table.len(), 1);
    let entry = table.iter().next().unwrap();
    assert_eq!(entry.samples, 2.0);
    // The first observation of the thread contributes no cpu time.
    assert_close(entry.time, 0.005);
    // 1 A over a 5 ms interval, entirely attributed to the busy thread.
    assert_close(entry.energy, 0.005);
    assert_eq!(entry.label, "work()");
    assert_eq!(entry.binary, None);
}

/// Test that a full profile keeps every sample with cpu time deltas
#[test]
fn test_full_profile() {
    let capture = two_sample_capture();
    let (profile, _) = run_postprocess(&capture, None);

    assert_eq!(profile.version, FULL_PROFILE_VERSION);
    assert_eq!(profile.samples, 2.0);
    assert_eq!(profile.sampling_time, 0.01);
    assert_eq!(profile.latency_time, 0.00002);
    assert_eq!(profile.volts, 0.0);

    let full = profile.full_profile().unwrap();
    assert_eq!(full.samples.len(), 2);
    assert_eq!(full.samples[0].threads[0].cpu_time, 0.0);
    assert_eq!(full.samples[1].threads[0].cpu_time, 0.005);
    assert_eq!(full.samples[1].cpu_time, 0.005);

    let tables = profile.symbol_tables();
    let thread = &full.samples[1].threads[0];
    assert_eq!(thread.pc, APP_START + 0x200);
    assert_eq!(tables.file(thread.location().file).unwrap(), "work.cpp");
    assert_eq!(thread.location().line, 42);
}

/// Test that aggregating a full profile matches aggregating while post processing
#[test]
fn test_aggregate_full_profiles() {
    let capture = two_sample_capture();
    let (full, _) = run_postprocess(&capture, None);
    let (direct, _) = run_postprocess(&capture, Some(KeyProjection::default()));

    let aggregated = aggregate_profiles(&[full.clone(), full], KeyProjection::default()).unwrap();
    assert_eq!(aggregated.mean, 2);
    assert_close(aggregated.samples, 2.0);
    assert_close(aggregated.sampling_time, 0.01);

    let aggregated_table = aggregated.aggregation_table().unwrap();
    let direct_table = direct.aggregation_table().unwrap();
    assert_eq!(aggregated_table.len(), 1);
    let (a, d) = (
        aggregated_table.iter().next().unwrap(),
        direct_table.iter().next().unwrap(),
    );
    assert_close(a.samples, d.samples);
    assert_close(a.time, d.time);
    assert_close(a.energy, d.energy);
    // The target prefix is stripped from binary:function labels.
    assert_eq!(a.label, "work()");
    assert_eq!(a.label, d.label);
}

/// Test that an empty capture is rejected
#[test]
fn test_no_samples() {
    let data = CaptureWriter::new(Endianness::LittleEndian)
        .to_vec(0, 0, &[], &[])
        .unwrap();
    let capture = RawCapture::parse(&data, Some(Endianness::LittleEndian)).unwrap();
    let mut resolver = SymbolResolver::new(ModuleMap::new(), FakeBackend::default());
    let err = postprocess(&capture, &mut resolver, &PostprocessOptions::default()).unwrap_err();
    assert!(matches!(err, Error::NoSamples));
    assert_eq!(err.category(), ErrorCategory::Format);
}

/// Test that accumulation order doesn't change the totals
#[test]
fn test_aggregation_commutativity() {
    let key = |function| AggregationKey {
        binary: Some(2),
        function: Some(function),
        file: None,
        line: None,
    };
    let contributions = [
        (key(2), 0.1, 0.003),
        (key(3), 0.7, 0.001),
        (key(2), 0.2, 0.002),
        (key(4), 1e-9, 0.004),
        (key(3), 0.3, 0.005),
        (key(2), 5.0, 0.001),
    ];

    let totals = |order: &[usize]| {
        let mut table = AggregationTable::new(KeyProjection::default());
        for &i in order {
            let (key, energy, time) = contributions[i];
            let contribution = Contribution {
                samples: 1.0,
                time,
                energy,
            };
            table.accumulate(key, contribution, || format!("{:?}", key.function));
        }
        let mut entries: Vec<_> = table
            .iter()
            .map(|e| (e.function, e.samples, e.time, e.energy))
            .collect();
        entries.sort_by_key(|e| e.0);
        entries
    };

    let reference = totals(&[0, 1, 2, 3, 4, 5]);
    for order in [[5, 4, 3, 2, 1, 0], [3, 0, 5, 1, 4, 2], [1, 3, 5, 0, 2, 4]] {
        let entries = totals(&order);
        assert_eq!(entries.len(), reference.len());
        for (a, b) in entries.iter().zip(&reference) {
            assert_eq!(a.0, b.0);
            assert_eq!(a.1, b.1);
            assert_close(a.2, b.2);
            assert_close(a.3, b.3);
        }
    }
}

/// Build an aggregated profile with one function per `(name, energy)` pair.
fn aggregated_profile(functions: &[(&str, f64)], mean: u32, volts: f64) -> ProfileContainer {
    let projection = KeyProjection::default();
    let mut tables = SymbolTables::new();
    let mut table = AggregationTable::new(projection);
    for (name, energy) in functions {
        let location = ResolvedLocation {
            binary: tables.intern_binary("app"),
            function: tables.intern_function(name, name),
            file: tables.intern_file("main.c"),
            line: 1,
        };
        let contribution = Contribution {
            samples: 10.0,
            time: 1.0,
            energy: *energy,
        };
        table.accumulate(projection.project(&location), contribution, || {
            name.to_string()
        });
    }
    ProfileContainer::new_aggregated(
        ProfileMetadata {
            samples: 10.0 * functions.len() as f64,
            sampling_time: 1.0,
            latency_time: 0.001,
            cpus: 4,
            volts,
            target: "app".to_string(),
            mean,
        },
        tables,
        table,
    )
}

/// Energy of the entry labelled `label`.
fn energy_of(profile: &ProfileContainer, label: &str) -> f64 {
    profile
        .aggregation_table()
        .unwrap()
        .iter()
        .find(|entry| entry.label == label)
        .map(|entry| entry.energy)
        .unwrap()
}

/// Test that combining runs with disjoint keys keeps every key, weighted by its run
#[test]
fn test_combine_disjoint() {
    let a = aggregated_profile(&[("alpha", 2.0)], 1, 5.0);
    let b = aggregated_profile(&[("beta", 6.0), ("gamma", 4.0)], 1, 5.0);

    let mean = combine(&[a, b]).unwrap();
    assert_eq!(mean.version, AGGREGATED_PROFILE_VERSION);
    assert_eq!(mean.mean, 2);
    assert_eq!(mean.aggregation_table().unwrap().len(), 3);
    assert_close(energy_of(&mean, "alpha"), 1.0);
    assert_close(energy_of(&mean, "beta"), 3.0);
    assert_close(energy_of(&mean, "gamma"), 2.0);
    assert_close(mean.samples, 15.0);

    // Each function is stored once in the combined tables.
    let tables = mean.symbol_tables();
    assert_eq!(tables.functions().len(), 5);
    assert_eq!(tables.binaries().len(), 3);
}

/// Test that combining step by step gives the same mean as combining at once
#[test]
fn test_combine_is_associative() {
    let a = aggregated_profile(&[("alpha", 2.0)], 1, 5.0);
    let b = aggregated_profile(&[("alpha", 4.0), ("beta", 1.0)], 1, 5.0);
    let c = aggregated_profile(&[("alpha", 9.0)], 1, 5.0);

    let all = combine(&[a.clone(), b.clone(), c.clone()]).unwrap();
    let stepwise = combine(&[combine(&[a, b]).unwrap(), c]).unwrap();
    assert_eq!(all.mean, 3);
    assert_eq!(stepwise.mean, 3);
    assert_close(energy_of(&all, "alpha"), 5.0);
    assert_close(energy_of(&stepwise, "alpha"), 5.0);
    assert_close(energy_of(&stepwise, "beta"), energy_of(&all, "beta"));
}

/// Test that profiles measured as charge and as energy can't be combined
#[test]
fn test_combine_unit_mismatch() {
    let charge = aggregated_profile(&[("alpha", 2.0)], 1, 0.0);
    let energy = aggregated_profile(&[("alpha", 2.0)], 1, 3.3);
    let err = combine(&[charge, energy]).unwrap_err();
    assert!(matches!(err, Error::UnitModeMismatch(_, _)));
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert!(matches!(combine(&[]), Err(Error::NoProfiles)));
}

/// Test that run counts too large to add up are rejected instead of wrapping
#[test]
fn test_run_count_overflow() {
    let half = u32::MAX / 2 + 1;
    let a = aggregated_profile(&[("alpha", 2.0)], half, 5.0);
    let b = aggregated_profile(&[("beta", 2.0)], half, 5.0);
    let err = combine(&[a.clone(), b]).unwrap_err();
    assert!(matches!(err, Error::RunCountOverflow));
    assert_eq!(err.category(), ErrorCategory::Format);
    assert_eq!(combine(&[a]).unwrap().mean, half);

    let (mut full, _) = run_postprocess(&two_sample_capture(), None);
    full.mean = half;
    assert!(matches!(
        aggregate_profiles(&[full.clone(), full], KeyProjection::default()),
        Err(Error::RunCountOverflow)
    ));
}

/// Test that a profile with a different version is rejected, even by one character
#[test]
fn test_version_gate() {
    let mut profile = aggregated_profile(&[("alpha", 2.0)], 1, 5.0);
    for version in ["a0.2", "a0.30", "0.3", "A0.3", ""] {
        profile.version = version.to_string();
        let err = ProfileContainer::from_bytes(&profile.to_bytes(), AGGREGATED_PROFILE_VERSION)
            .unwrap_err();
        assert!(
            matches!(&err, Error::VersionMismatch { found, .. } if found == version),
            "{version}: {err}"
        );
        assert_eq!(err.category(), ErrorCategory::Format);
    }

    profile.version = "a0.2".to_string();
    assert!(matches!(
        combine(&[profile]),
        Err(Error::VersionMismatch { .. })
    ));
}

/// Test that profiles survive being written and read, with and without compression
#[test]
fn test_storage_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let profile = aggregated_profile(&[("alpha", 2.0), ("beta", 1.0)], 3, 5.0);

    let plain = dir.path().join("profile.agg");
    let compressed = dir.path().join("profile.agg.zst");
    write_profile(&plain, &profile).unwrap();
    write_profile(&compressed, &profile).unwrap();

    assert_eq!(read_profile(&plain, AGGREGATED_PROFILE_VERSION).unwrap(), profile);
    assert_eq!(read_profile(&compressed, AGGREGATED_PROFILE_VERSION).unwrap(), profile);
    assert_ne!(fs::read(&plain).unwrap(), fs::read(&compressed).unwrap());

    let err = read_profile(&plain, FULL_PROFILE_VERSION).unwrap_err();
    assert!(matches!(err, Error::VersionMismatch { .. }));
}

/// Test that compare matches entries by name across differently ordered tables
#[test]
fn test_compare() {
    let baseline = aggregated_profile(&[("alpha", 6.0), ("beta", 4.0), ("gamma", 0.0)], 1, 5.0);
    let other = aggregated_profile(&[("beta", 5.0), ("delta", 1.0), ("alpha", 3.0)], 1, 5.0);

    let deviations =
        compare_profiles(&baseline, &other, ErrorMetric::Difference, 0.0).unwrap();
    let found: Vec<_> = deviations
        .iter()
        .map(|d| (d.label.as_str(), d.error))
        .collect();
    assert_eq!(found, vec![("beta", -1.0), ("alpha", 3.0)]);

    let deviations =
        compare_profiles(&baseline, &other, ErrorMetric::WeightedAbsoluteError, 0.2).unwrap();
    assert_eq!(deviations.len(), 1);
    assert_eq!(deviations[0].label, "alpha");
    assert_close(deviations[0].error, 0.3);

    assert!(matches!(
        compare_profiles(&baseline, &other, ErrorMetric::Difference, -1.0),
        Err(Error::InvalidLimit(_))
    ));
    let charge = aggregated_profile(&[("alpha", 6.0)], 1, 0.0);
    assert!(matches!(
        compare_profiles(&baseline, &charge, ErrorMetric::Difference, 0.0),
        Err(Error::UnitModeMismatch(_, _))
    ));
}
