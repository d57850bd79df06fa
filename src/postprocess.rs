use linear_map::LinearMap;

use crate::aggregate::Aggregator;
use crate::aggregation::KeyProjection;
use crate::capture::{RawCapture, RawSample};
use crate::container::{ProcessedSample, ProcessedThread, ProfileContainer, ProfileMetadata};
use crate::error::Error;
use crate::symbols::{SymbolBackend, SymbolResolver, SymbolTables};

const PROGRESS_INTERVAL: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostprocessOptions {
    /// The supply voltage, or 0 to report the sampled current as charge
    /// instead of energy.
    pub volts: f64,
    /// The cpus the profiled process was allowed to run on.
    pub cpus: Vec<u32>,
    /// Aggregate while processing instead of keeping every sample.
    pub aggregate_by: Option<KeyProjection>,
}

/// The cumulative cpu time last seen per thread.
///
/// Profiled processes rarely have more than a handful of threads, so a
/// linear map beats hashing here.
#[derive(Debug, Default)]
struct ThreadCpuTimes {
    previous: LinearMap<u32, u64>,
}

impl ThreadCpuTimes {
    /// The cpu time in seconds since the previous observation of `tid`. The
    /// first observation of a thread has no predecessor and counts as zero.
    fn delta(&mut self, tid: u32, cpu_time_ns: u64) -> f64 {
        let previous = self.previous.insert(tid, cpu_time_ns).unwrap_or(cpu_time_ns);
        cpu_time_ns.saturating_sub(previous) as f64 / 1_000_000_000.0
    }
}

/// Resolve every sample of `capture`, producing a full profile, or an
/// aggregated one if [`PostprocessOptions::aggregate_by`] is set.
pub fn postprocess<B: SymbolBackend>(
    capture: &RawCapture,
    resolver: &mut SymbolResolver<B>,
    options: &PostprocessOptions,
) -> Result<ProfileContainer, Error> {
    if capture.header.sample_count == 0 || capture.samples.is_empty() {
        return Err(Error::NoSamples);
    }

    let metadata = ProfileMetadata {
        samples: capture.samples.len() as f64,
        sampling_time: capture.header.sampling_time(),
        latency_time: capture.header.latency_time(),
        cpus: options.cpus.len() as u32,
        volts: options.volts,
        target: capture
            .modules
            .first()
            .map(|module| module.label.clone())
            .unwrap_or_default(),
        mean: 1,
    };
    log::info!(
        "Post processing {} samples of {} ({:.2} Hz)",
        capture.samples.len(),
        metadata.target,
        capture.header.frequency()
    );

    let mut cpu_times = ThreadCpuTimes::default();
    let container = match options.aggregate_by {
        None => {
            let mut tables = SymbolTables::new();
            let mut samples = Vec::with_capacity(capture.samples.len());
            for (i, sample) in capture.samples.iter().enumerate() {
                log_progress(i, capture.samples.len());
                samples.push(process_sample(sample, &mut cpu_times, resolver, &mut tables)?);
            }
            ProfileContainer::new_full(metadata, tables, samples)
        }
        Some(projection) => {
            let mut aggregator = Aggregator::new(projection);
            let scale = aggregator.begin_profile(&metadata, 1.0)?;
            for (i, sample) in capture.samples.iter().enumerate() {
                log_progress(i, capture.samples.len());
                let processed =
                    process_sample(sample, &mut cpu_times, resolver, aggregator.tables_mut())?;
                aggregator.add_sample(&processed, &scale, 1.0)?;
            }
            aggregator.finish(1)
        }
    };

    log::info!(
        "Post processing finished, {} distinct program counters",
        resolver.cached_count()
    );
    Ok(container)
}

fn process_sample<B: SymbolBackend>(
    sample: &RawSample,
    cpu_times: &mut ThreadCpuTimes,
    resolver: &mut SymbolResolver<B>,
    tables: &mut SymbolTables,
) -> Result<ProcessedSample, Error> {
    let mut threads = Vec::with_capacity(sample.threads.len());
    let mut sample_cpu_time = 0.0;
    for thread in &sample.threads {
        let cpu_time = cpu_times.delta(thread.tid, thread.cpu_time_ns);
        sample_cpu_time += cpu_time;
        let location = resolver.resolve(thread.pc, tables)?;
        threads.push(ProcessedThread::new(thread.tid, cpu_time, thread.pc, location));
    }
    Ok(ProcessedSample {
        metric: sample.metric,
        cpu_time: sample_cpu_time,
        threads,
    })
}

fn log_progress(i: usize, count: usize) {
    if i % PROGRESS_INTERVAL == 0 {
        log::debug!("Post processing... {}%", (i + 1) * 100 / count);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cpu_time_deltas() {
        let mut cpu_times = ThreadCpuTimes::default();
        assert_eq!(cpu_times.delta(1, 5_000_000), 0.0);
        assert_eq!(cpu_times.delta(2, 1_000_000), 0.0);
        assert_eq!(cpu_times.delta(1, 7_000_000), 0.002);
        assert_eq!(cpu_times.delta(1, 7_000_000), 0.0);
        assert_eq!(cpu_times.delta(2, 4_000_000), 0.003);
    }
}
