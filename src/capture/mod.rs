//! Parsing code for raw sampler captures.
//!
//! A capture is written by the sampler at the end of a profiling run. It is a
//! flat binary file without padding, in a single byte order which is not
//! recorded in the file:
//!
//! ```plaintext
//! Header:      magic:u32  wallTimeUs:u64  latencyUs:u64  sampleCount:u64  moduleCount:u32
//! Sample[n]:   metric:f64  threadCount:u32
//!              Thread[threadCount]: threadId:u32  programCounter:u64  cpuTimeNs:u64
//! Module[m]:   startAddr:u64  size:u64  label:[u8; 256] (NUL-padded)
//! ```
//!
//! The metric is the instantaneous current (or power) measured at the time of
//! the sample. The CPU time of each thread is cumulative since thread start.
//!
//! # Example
//!
//! ```
//! use power_profile_data::capture::RawCapture;
//!
//! # fn wrapper() -> Result<(), power_profile_data::Error> {
//! let data = std::fs::read("capture.bin")?;
//! let capture = RawCapture::parse(&data, None)?;
//! println!("{} samples over {} us", capture.samples.len(), capture.header.wall_time_us);
//! for module in &capture.modules {
//!     println!("{:#x} {:#x} {}", module.start, module.size, module.label);
//! }
//! # Ok(())
//! # }
//! ```

mod header;
mod reader;
mod record;
mod writer;

pub use header::*;
pub use reader::*;
pub use record::*;
pub use writer::*;
