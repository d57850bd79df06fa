use prost::Message;

use crate::aggregation::{AggregateEntry, AggregationTable, KeyProjection};
use crate::error::Error;
use crate::symbols::{FunctionName, ResolvedLocation, SymbolTables};

/// Version of profiles holding every processed sample.
pub const FULL_PROFILE_VERSION: &str = "0.3";
/// Version of profiles holding an aggregation table.
pub const AGGREGATED_PROFILE_VERSION: &str = "a0.3";

/// A processed profile, as stored on disk.
///
/// The container is serialized as a protobuf message. Readers only accept
/// containers whose `version` is exactly the one they expect; there is no
/// migration between versions.
#[derive(Clone, PartialEq, ::prost_derive::Message)]
pub struct ProfileContainer {
    #[prost(string, tag = "1")]
    pub version: String,
    /// Number of samples in the capture, or the weighted mean of several captures.
    #[prost(double, tag = "2")]
    pub samples: f64,
    /// Wall clock duration of the capture in seconds.
    #[prost(double, tag = "3")]
    pub sampling_time: f64,
    /// Time spent by the sampler itself, in seconds.
    #[prost(double, tag = "4")]
    pub latency_time: f64,
    /// Number of cpus the profiled process was allowed to run on.
    #[prost(uint32, tag = "5")]
    pub cpus: u32,
    /// Zero if the sampler measured current, so energies are charges.
    #[prost(double, tag = "6")]
    pub volts: f64,
    /// Label of the profiled executable.
    #[prost(string, tag = "7")]
    pub target: String,
    #[prost(string, repeated, tag = "8")]
    pub binaries: Vec<String>,
    #[prost(message, repeated, tag = "9")]
    pub functions: Vec<FunctionName>,
    #[prost(string, repeated, tag = "10")]
    pub files: Vec<String>,
    /// How many captures this profile is the mean of.
    #[prost(uint32, tag = "11")]
    pub mean: u32,
    #[prost(oneof = "ProfileContent", tags = "12, 13")]
    pub content: Option<ProfileContent>,
}

#[derive(Clone, PartialEq, ::prost_derive::Oneof)]
pub enum ProfileContent {
    #[prost(message, tag = "12")]
    Full(FullProfile),
    #[prost(message, tag = "13")]
    Aggregated(AggregatedProfile),
}

#[derive(Clone, PartialEq, ::prost_derive::Message)]
pub struct FullProfile {
    #[prost(message, repeated, tag = "1")]
    pub samples: Vec<ProcessedSample>,
}

/// A raw sample with cpu time deltas and resolved locations.
#[derive(Clone, PartialEq, ::prost_derive::Message)]
pub struct ProcessedSample {
    #[prost(double, tag = "1")]
    pub metric: f64,
    /// Sum of the cpu time of all threads, in seconds.
    #[prost(double, tag = "2")]
    pub cpu_time: f64,
    #[prost(message, repeated, tag = "3")]
    pub threads: Vec<ProcessedThread>,
}

#[derive(Clone, PartialEq, ::prost_derive::Message)]
pub struct ProcessedThread {
    #[prost(uint32, tag = "1")]
    pub tid: u32,
    /// Cpu time since the previous sample of this thread, in seconds.
    #[prost(double, tag = "2")]
    pub cpu_time: f64,
    #[prost(uint64, tag = "3")]
    pub pc: u64,
    #[prost(uint32, tag = "4")]
    pub binary: u32,
    #[prost(uint32, tag = "5")]
    pub function: u32,
    #[prost(uint32, tag = "6")]
    pub file: u32,
    #[prost(uint32, tag = "7")]
    pub line: u32,
}

impl ProcessedThread {
    pub fn new(tid: u32, cpu_time: f64, pc: u64, location: ResolvedLocation) -> Self {
        Self {
            tid,
            cpu_time,
            pc,
            binary: location.binary,
            function: location.function,
            file: location.file,
            line: location.line,
        }
    }

    pub fn location(&self) -> ResolvedLocation {
        ResolvedLocation {
            binary: self.binary,
            function: self.function,
            file: self.file,
            line: self.line,
        }
    }
}

#[derive(Clone, PartialEq, ::prost_derive::Message)]
pub struct AggregatedProfile {
    /// The [`KeyProjection`] bits the entries were aggregated by.
    #[prost(uint32, tag = "1")]
    pub key_fields: u32,
    #[prost(message, repeated, tag = "2")]
    pub entries: Vec<AggregateEntry>,
}

/// The figures describing a profile, independent of its content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileMetadata {
    pub samples: f64,
    pub sampling_time: f64,
    pub latency_time: f64,
    pub cpus: u32,
    pub volts: f64,
    pub target: String,
    pub mean: u32,
}

impl ProfileContainer {
    pub fn new_full(
        metadata: ProfileMetadata,
        tables: SymbolTables,
        samples: Vec<ProcessedSample>,
    ) -> Self {
        let mut container = Self::with_metadata(FULL_PROFILE_VERSION, metadata);
        container.set_symbol_tables(tables);
        container.content = Some(ProfileContent::Full(FullProfile { samples }));
        container
    }

    pub fn new_aggregated(
        metadata: ProfileMetadata,
        tables: SymbolTables,
        table: AggregationTable,
    ) -> Self {
        let mut container = Self::with_metadata(AGGREGATED_PROFILE_VERSION, metadata);
        container.set_symbol_tables(tables);
        container.content = Some(ProfileContent::Aggregated(AggregatedProfile {
            key_fields: table.projection().to_bits(),
            entries: table.into_entries(),
        }));
        container
    }

    fn with_metadata(version: &str, metadata: ProfileMetadata) -> Self {
        Self {
            version: version.to_string(),
            samples: metadata.samples,
            sampling_time: metadata.sampling_time,
            latency_time: metadata.latency_time,
            cpus: metadata.cpus,
            volts: metadata.volts,
            target: metadata.target,
            mean: metadata.mean,
            ..Default::default()
        }
    }

    pub fn metadata(&self) -> ProfileMetadata {
        ProfileMetadata {
            samples: self.samples,
            sampling_time: self.sampling_time,
            latency_time: self.latency_time,
            cpus: self.cpus,
            volts: self.volts,
            target: self.target.clone(),
            mean: self.mean,
        }
    }

    /// Decode a container, requiring `expected_version`.
    pub fn from_bytes(data: &[u8], expected_version: &'static str) -> Result<Self, Error> {
        let container = Self::decode(data)?;
        if container.version != expected_version {
            return Err(Error::VersionMismatch {
                expected: expected_version,
                found: container.version,
            });
        }
        let expected_kind = kind_of_version(expected_version);
        if container.kind() != expected_kind {
            return Err(Error::UnexpectedProfileKind {
                expected: expected_kind,
                found: container.kind(),
            });
        }
        Ok(container)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// `"full"`, `"aggregated"`, or `"empty"` if there is no content.
    pub fn kind(&self) -> &'static str {
        match self.content {
            Some(ProfileContent::Full(_)) => "full",
            Some(ProfileContent::Aggregated(_)) => "aggregated",
            None => "empty",
        }
    }

    pub fn symbol_tables(&self) -> SymbolTables {
        SymbolTables::from_parts(
            self.binaries.clone(),
            self.functions.clone(),
            self.files.clone(),
        )
    }

    pub fn set_symbol_tables(&mut self, tables: SymbolTables) {
        let (binaries, functions, files) = tables.into_parts();
        self.binaries = binaries;
        self.functions = functions;
        self.files = files;
    }

    /// Whether energies are in joules (as opposed to coulombs).
    pub fn uses_volts(&self) -> bool {
        self.volts != 0.0
    }

    /// The wall clock time between two samples.
    pub fn average_sample_time(&self) -> f64 {
        if self.samples > 0.0 {
            self.sampling_time / self.samples
        } else {
            0.0
        }
    }

    pub fn full_profile(&self) -> Result<&FullProfile, Error> {
        match &self.content {
            Some(ProfileContent::Full(full)) => Ok(full),
            _ => Err(Error::UnexpectedProfileKind {
                expected: "full",
                found: self.kind(),
            }),
        }
    }

    pub fn aggregation_table(&self) -> Result<AggregationTable, Error> {
        match &self.content {
            Some(ProfileContent::Aggregated(aggregated)) => Ok(AggregationTable::from_entries(
                KeyProjection::from_bits(aggregated.key_fields),
                aggregated.entries.clone(),
            )),
            _ => Err(Error::UnexpectedProfileKind {
                expected: "aggregated",
                found: self.kind(),
            }),
        }
    }
}

fn kind_of_version(version: &str) -> &'static str {
    if version == AGGREGATED_PROFILE_VERSION {
        "aggregated"
    } else {
        "full"
    }
}
