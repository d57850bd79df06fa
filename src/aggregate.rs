use std::collections::HashMap;

use crate::aggregation::{
    build_label, AggregateEntry, AggregationKey, AggregationTable, Contribution, KeyProjection,
    LabelOptions,
};
use crate::container::{ProcessedSample, ProfileContainer, ProfileMetadata};
use crate::error::Error;
use crate::mean::{runs, total_runs};
use crate::symbols::{ResolvedLocation, SymbolTables};

/// The per-profile figures needed to turn a sample into energy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleScale {
    /// The voltage, or 1 if the profile measured current.
    pub volts: f64,
    /// The wall clock time represented by one sample, in seconds.
    pub average_sample_time: f64,
    pub cpus: u32,
}

impl SampleScale {
    pub fn of(metadata: &ProfileMetadata) -> Self {
        Self {
            volts: if metadata.volts != 0.0 {
                metadata.volts
            } else {
                1.0
            },
            average_sample_time: if metadata.samples > 0.0 {
                metadata.sampling_time / metadata.samples
            } else {
                0.0
            },
            cpus: metadata.cpus,
        }
    }
}

/// Split the energy of one sample between the threads it observed.
///
/// A thread's share is its cpu time, capped at the sampling interval,
/// relative to the interval times the number of cores which could have been
/// busy. Every thread counts as one sample.
pub fn apportion<'a>(
    sample: &'a ProcessedSample,
    scale: &SampleScale,
) -> impl Iterator<Item = (ResolvedLocation, Contribution)> + 'a {
    let interval = scale.average_sample_time;
    let energy = sample.metric * scale.volts * interval;
    let active_cores = sample.threads.len().min(scale.cpus as usize).max(1) as f64;

    sample.threads.iter().map(move |thread| {
        let time = thread.cpu_time.min(interval).max(0.0);
        let share = if interval > 0.0 {
            time / (interval * active_cores)
        } else {
            0.0
        };
        let contribution = Contribution {
            samples: 1.0,
            time,
            energy: energy * share,
        };
        (thread.location(), contribution)
    })
}

/// Builds one aggregated profile out of several weighted inputs.
///
/// Every input's symbol indices are translated into the aggregator's own
/// tables before its statistics are merged.
#[derive(Debug)]
pub struct Aggregator {
    projection: KeyProjection,
    tables: SymbolTables,
    table: AggregationTable,
    metadata: Option<ProfileMetadata>,
    label_options: LabelOptions,
}

impl Aggregator {
    pub fn new(projection: KeyProjection) -> Self {
        Self {
            projection,
            tables: SymbolTables::new(),
            table: AggregationTable::new(projection),
            metadata: None,
            label_options: LabelOptions::default(),
        }
    }

    pub fn projection(&self) -> KeyProjection {
        self.projection
    }

    /// The tables locations passed to [`Aggregator::add_sample`] refer to.
    pub fn tables_mut(&mut self) -> &mut SymbolTables {
        &mut self.tables
    }

    /// Account for the figures of an input profile, and check that its
    /// unit mode matches the inputs seen so far.
    pub fn begin_profile(
        &mut self,
        metadata: &ProfileMetadata,
        weight: f64,
    ) -> Result<SampleScale, Error> {
        match &mut self.metadata {
            None => {
                self.label_options = LabelOptions::strip_target(&metadata.target);
                self.metadata = Some(ProfileMetadata {
                    samples: metadata.samples * weight,
                    sampling_time: metadata.sampling_time * weight,
                    latency_time: metadata.latency_time * weight,
                    mean: 0,
                    ..metadata.clone()
                });
            }
            Some(merged) => {
                if (merged.volts != 0.0) != (metadata.volts != 0.0) {
                    return Err(Error::UnitModeMismatch(merged.volts, metadata.volts));
                }
                if merged.volts != metadata.volts {
                    log::warn!(
                        "Profile voltages differ: {} V vs. {} V",
                        merged.volts,
                        metadata.volts
                    );
                }
                if merged.target != metadata.target {
                    log::warn!(
                        "Profile targets differ: {} vs. {}",
                        merged.target,
                        metadata.target
                    );
                }
                merged.samples += metadata.samples * weight;
                merged.sampling_time += metadata.sampling_time * weight;
                merged.latency_time += metadata.latency_time * weight;
                merged.cpus = merged.cpus.max(metadata.cpus);
            }
        }
        Ok(SampleScale::of(metadata))
    }

    /// Add a sample whose locations refer to [`Aggregator::tables_mut`].
    pub fn add_sample(
        &mut self,
        sample: &ProcessedSample,
        scale: &SampleScale,
        weight: f64,
    ) -> Result<(), Error> {
        for (location, contribution) in apportion(sample, scale) {
            let key = self.projection.project(&location);
            self.accumulate(key, contribution.scaled(weight), None)?;
        }
        Ok(())
    }

    /// Add every sample of a full profile.
    pub fn add_profile(&mut self, profile: &ProfileContainer, weight: f64) -> Result<(), Error> {
        let full = profile.full_profile()?;
        let scale = self.begin_profile(&profile.metadata(), weight)?;
        let source_tables = profile.symbol_tables();
        let mut keys: HashMap<ResolvedLocation, AggregationKey> = HashMap::new();

        for sample in &full.samples {
            for (location, contribution) in apportion(sample, &scale) {
                let key = match keys.get(&location) {
                    Some(key) => *key,
                    None => {
                        let key = self
                            .projection
                            .project(&location)
                            .remap(&source_tables, &mut self.tables)?;
                        keys.insert(location, key);
                        key
                    }
                };
                self.accumulate(key, contribution.scaled(weight), None)?;
            }
        }
        Ok(())
    }

    /// Merge an entry of an aggregated profile whose indices refer to `source_tables`.
    pub fn add_entry(
        &mut self,
        entry: &AggregateEntry,
        source_tables: &SymbolTables,
        weight: f64,
    ) -> Result<(), Error> {
        let key = entry.key().remap(source_tables, &mut self.tables)?;
        self.accumulate(key, entry.contribution().scaled(weight), Some(&entry.label))
    }

    fn accumulate(
        &mut self,
        key: AggregationKey,
        contribution: Contribution,
        label: Option<&str>,
    ) -> Result<(), Error> {
        let label = match (self.table.get(&key), label) {
            (Some(_), _) => String::new(),
            (None, Some(label)) => label.to_string(),
            (None, None) => build_label(&key.display_parts(&self.tables)?, &self.label_options),
        };
        self.table.accumulate(key, contribution, || label);
        Ok(())
    }

    /// The aggregated profile. `mean` is the number of captures it represents.
    pub fn finish(self, mean: u32) -> ProfileContainer {
        let metadata = ProfileMetadata {
            mean,
            ..self.metadata.unwrap_or_default()
        };
        log::debug!(
            "Aggregated {} entries by {}",
            self.table.len(),
            self.projection
        );
        ProfileContainer::new_aggregated(metadata, self.tables, self.table)
    }
}

/// Aggregate full profiles of the same target into their mean.
///
/// Each profile is weighted by how many captures it represents.
pub fn aggregate_profiles(
    profiles: &[ProfileContainer],
    projection: KeyProjection,
) -> Result<ProfileContainer, Error> {
    if profiles.is_empty() {
        return Err(Error::NoProfiles);
    }
    let mean = total_runs(profiles)?;
    let mut aggregator = Aggregator::new(projection);
    for (i, profile) in profiles.iter().enumerate() {
        log::info!("Aggregating profile {}/{}", i + 1, profiles.len());
        let weight = f64::from(runs(profile)) / f64::from(mean);
        aggregator.add_profile(profile, weight)?;
    }
    Ok(aggregator.finish(mean))
}
