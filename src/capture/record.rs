use byteorder::{ByteOrder, ReadBytesExt};

use crate::error::{Error, ReadError};

/// The length of the fixed-size label field in a module record.
pub const MODULE_LABEL_LENGTH: usize = 256;

/// The state of one thread at the time of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadSample {
    pub tid: u32,
    /// The program counter of the thread when it was interrupted.
    pub pc: u64,
    /// CPU time consumed by the thread since it started, in nanoseconds.
    pub cpu_time_ns: u64,
}

impl ThreadSample {
    pub const SIZE: usize = 4 + 8 + 8; // 20 bytes

    pub fn parse<O: ByteOrder>(data: &mut &[u8]) -> Result<Self, std::io::Error> {
        let tid = data.read_u32::<O>()?;
        let pc = data.read_u64::<O>()?;
        let cpu_time_ns = data.read_u64::<O>()?;
        Ok(Self {
            tid,
            pc,
            cpu_time_ns,
        })
    }
}

/// One timestamped observation: the power metric plus the state of every
/// thread of the profiled process.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// Instantaneous current in A, or power in W, depending on the sampler setup.
    pub metric: f64,
    pub threads: Vec<ThreadSample>,
}

impl RawSample {
    /// The size of the fixed part preceding the thread tuples.
    pub const HEADER_SIZE: usize = 8 + 4; // 12 bytes

    pub fn parse<O: ByteOrder>(data: &mut &[u8]) -> Result<Self, Error> {
        let metric = data.read_f64::<O>().map_err(|_| ReadError::SampleHeader)?;
        let thread_count = data.read_u32::<O>().map_err(|_| ReadError::SampleHeader)?;

        // Don't trust the count for the allocation, a corrupt capture could claim
        // billions of threads.
        let capacity = (thread_count as usize).min(data.len() / ThreadSample::SIZE);
        let mut threads = Vec::with_capacity(capacity);
        for _ in 0..thread_count {
            let thread = ThreadSample::parse::<O>(data).map_err(|_| ReadError::ThreadSample)?;
            threads.push(thread);
        }
        Ok(Self { metric, threads })
    }

    /// The encoded size of this sample.
    pub fn encoded_len(&self) -> usize {
        Self::HEADER_SIZE + self.threads.len() * ThreadSample::SIZE
    }
}

/// A module (executable or shared library) mapped into the profiled process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// The address at which the executable part of the module is mapped.
    pub start: u64,
    /// The size of the mapping in bytes.
    pub size: u64,
    /// The name of the module, usually the file name of the binary.
    pub label: String,
}

impl ModuleRecord {
    pub const SIZE: usize = 8 + 8 + MODULE_LABEL_LENGTH; // 272 bytes

    pub fn parse<O: ByteOrder>(data: &mut &[u8]) -> Result<Self, std::io::Error> {
        let start = data.read_u64::<O>()?;
        let size = data.read_u64::<O>()?;
        let mut label_bytes = [0; MODULE_LABEL_LENGTH];
        std::io::Read::read_exact(data, &mut label_bytes)?;
        let label_len = memchr::memchr(0, &label_bytes).unwrap_or(MODULE_LABEL_LENGTH);
        let label = String::from_utf8_lossy(&label_bytes[..label_len]).into_owned();
        Ok(Self { start, size, label })
    }

    /// The first address after the mapping.
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }
}

#[cfg(test)]
mod test {
    use byteorder::{BigEndian, LittleEndian};

    use super::*;

    #[test]
    fn parse_sample_big() {
        let bytes = [
            0x3f, 0xf8, 0, 0, 0, 0, 0, 0, // 1.5
            0, 0, 0, 1, // one thread
            0, 0, 0x30, 0x39, // tid 12345
            0, 0, 0x55, 0x55, 0, 0, 0x10, 0x00, // pc
            0, 0, 0, 0, 0, 0x0f, 0x42, 0x40, // 1_000_000 ns
        ];
        let mut data = &bytes[..];
        let sample = RawSample::parse::<BigEndian>(&mut data).unwrap();
        assert!(data.is_empty());
        assert_eq!(sample.metric, 1.5);
        assert_eq!(
            sample.threads,
            vec![ThreadSample {
                tid: 12345,
                pc: 0x5555_0000_1000,
                cpu_time_ns: 1_000_000,
            }]
        );
        assert_eq!(sample.encoded_len(), bytes.len());
    }

    #[test]
    fn sample_with_missing_thread() {
        let bytes = [0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0];
        let mut data = &bytes[..];
        match RawSample::parse::<LittleEndian>(&mut data) {
            Err(Error::Read(ReadError::ThreadSample)) => {}
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn parse_module_label() {
        let mut bytes = vec![0x00, 0x10, 0, 0, 0, 0, 0, 0, 0x00, 0x20, 0, 0, 0, 0, 0, 0];
        let mut label = [0u8; MODULE_LABEL_LENGTH];
        label[..7].copy_from_slice(b"libc.so");
        bytes.extend_from_slice(&label);
        let mut data = &bytes[..];
        let module = ModuleRecord::parse::<LittleEndian>(&mut data).unwrap();
        assert_eq!(module.start, 0x1000);
        assert_eq!(module.size, 0x2000);
        assert_eq!(module.end(), 0x3000);
        assert_eq!(module.label, "libc.so");
    }
}
