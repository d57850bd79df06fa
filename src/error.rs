use std::io;
use std::path::PathBuf;

/// The error type used in this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The capture ended before a fixed-size item could be read. This usually
    /// means the capture was cut short.
    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Did not recognize magic value {0:#x}")]
    UnrecognizedMagicValue(u32),

    #[error("No samples found in capture")]
    NoSamples,

    #[error("Incompatible profile version {found:?} (required: {expected:?})")]
    VersionMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("Could not decode profile: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Expected a {expected} profile, but found a {found} profile")]
    UnexpectedProfileKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error("A profile references symbol index {index} which is not in its {table} table")]
    DanglingSymbolIndex { table: &'static str, index: u32 },

    #[error("Symbol resolution failed for {path:?} at {address:#x}: {reason}")]
    Resolution {
        path: PathBuf,
        address: u64,
        reason: String,
    },

    #[error("Running {tool} failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    #[error("Malformed vm map line {0:?}")]
    InvalidVmMapLine(String),

    #[error("Malformed kallsyms line {0:?}")]
    InvalidKallsymsLine(String),

    #[error("The profiles represent more than {} runs in total", u32::MAX)]
    RunCountOverflow,

    #[error("Could not find binary {0:?} in any search path")]
    BinaryNotFound(String),

    #[error("Search path {0:?} is not a directory")]
    InvalidSearchPath(PathBuf),

    #[error("Invalid cpu range {0:?}")]
    InvalidCpuRange(String),

    #[error("Unknown aggregation key {0:?} (expected binary, function, file or line)")]
    InvalidKeyField(String),

    #[error("Fraction {0} is outside of [0, 1]")]
    InvalidFraction(f64),

    #[error("Limit {0} is out of range")]
    InvalidLimit(f64),

    #[error("Unknown error metric {0:?}")]
    InvalidErrorMetric(String),

    #[error("Profile voltages don't match: {0} V vs. {1} V")]
    UnitModeMismatch(f64, f64),

    #[error("Profiles were aggregated by different keys: {0} vs. {1}")]
    ProjectionMismatch(String, String),

    #[error("Insufficient amount of profiles passed")]
    NoProfiles,
}

/// Which class of failure an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The input ended before an expected fixed-size field.
    Truncation,
    /// The input is not what the reading tool expects (magic, version, layout).
    Format,
    /// An external symbol resolution call failed.
    Resolution,
    /// A user-supplied argument or a cross-input consistency check failed.
    Validation,
    /// A referenced binary could not be located.
    Lookup,
    /// Any other I/O failure.
    Io,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Read(_) => ErrorCategory::Truncation,
            Error::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                ErrorCategory::Truncation
            }
            Error::IoError(_) => ErrorCategory::Io,
            Error::UnrecognizedMagicValue(_)
            | Error::NoSamples
            | Error::VersionMismatch { .. }
            | Error::Decode(_)
            | Error::UnexpectedProfileKind { .. }
            | Error::DanglingSymbolIndex { .. }
            | Error::InvalidVmMapLine(_)
            | Error::InvalidKallsymsLine(_)
            | Error::RunCountOverflow => ErrorCategory::Format,
            Error::Resolution { .. } | Error::ExternalTool { .. } => ErrorCategory::Resolution,
            Error::BinaryNotFound(_) => ErrorCategory::Lookup,
            Error::InvalidSearchPath(_)
            | Error::InvalidCpuRange(_)
            | Error::InvalidKeyField(_)
            | Error::InvalidFraction(_)
            | Error::InvalidLimit(_)
            | Error::InvalidErrorMetric(_)
            | Error::UnitModeMismatch(..)
            | Error::ProjectionMismatch(..)
            | Error::NoProfiles => ErrorCategory::Validation,
        }
    }
}

/// This error indicates that the capture was not large enough to
/// read the respective item.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    #[error("Could not read CaptureMagic")]
    CaptureMagic,

    #[error("Could not read CaptureHeader")]
    CaptureHeader,

    #[error("Could not read SampleHeader")]
    SampleHeader,

    #[error("Could not read ThreadSample")]
    ThreadSample,

    #[error("Could not read ModuleRecord")]
    ModuleRecord,
}
