use byteorder::{ByteOrder, ReadBytesExt};

use crate::error::{Error, ReadError};

/// The magic value of the current capture format generation.
pub const CAPTURE_MAGIC: u32 = 1;

/// The capture header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHeader {
    /// Identifies the capture format generation. Currently always [`CAPTURE_MAGIC`].
    pub magic: u32,
    /// Wall clock time covered by the capture, in microseconds.
    pub wall_time_us: u64,
    /// Time spent by the sampler itself (scheduling and measurement overhead),
    /// in microseconds.
    pub latency_time_us: u64,
    /// The number of sample records following the header.
    pub sample_count: u64,
    /// The number of module records following the samples.
    pub module_count: u32,
}

impl CaptureHeader {
    pub const SIZE: usize = 4 + 8 + 8 + 8 + 4; // 32 bytes

    /// Parses the header and advances `data` past it.
    pub fn parse<O: ByteOrder>(data: &mut &[u8]) -> Result<Self, Error> {
        let magic = data
            .read_u32::<O>()
            .map_err(|_| ReadError::CaptureMagic)?;
        if magic != CAPTURE_MAGIC {
            return Err(Error::UnrecognizedMagicValue(magic));
        }
        Self::parse_after_magic::<O>(magic, data).map_err(|_| ReadError::CaptureHeader.into())
    }

    fn parse_after_magic<O: ByteOrder>(
        magic: u32,
        data: &mut &[u8],
    ) -> Result<Self, std::io::Error> {
        let wall_time_us = data.read_u64::<O>()?;
        let latency_time_us = data.read_u64::<O>()?;
        let sample_count = data.read_u64::<O>()?;
        let module_count = data.read_u32::<O>()?;
        Ok(Self {
            magic,
            wall_time_us,
            latency_time_us,
            sample_count,
            module_count,
        })
    }

    /// Wall clock time in seconds.
    pub fn sampling_time(&self) -> f64 {
        self.wall_time_us as f64 / 1_000_000.0
    }

    /// Sampler overhead in seconds.
    pub fn latency_time(&self) -> f64 {
        self.latency_time_us as f64 / 1_000_000.0
    }

    /// The average sampling frequency in Hz, or 0 for an empty capture.
    pub fn frequency(&self) -> f64 {
        if self.wall_time_us == 0 {
            return 0.0;
        }
        self.sample_count as f64 * 1_000_000.0 / self.wall_time_us as f64
    }
}

#[cfg(test)]
mod test {
    use byteorder::{BigEndian, LittleEndian};

    use super::*;

    #[test]
    fn parse_little() {
        let bytes = [
            1, 0, 0, 0, // magic
            0x40, 0x42, 0x0f, 0, 0, 0, 0, 0, // 1_000_000 us
            0xe8, 0x03, 0, 0, 0, 0, 0, 0, // 1000 us
            10, 0, 0, 0, 0, 0, 0, 0, // 10 samples
            2, 0, 0, 0, // 2 modules
        ];
        let mut data = &bytes[..];
        let header = CaptureHeader::parse::<LittleEndian>(&mut data).unwrap();
        assert!(data.is_empty());
        assert_eq!(header.wall_time_us, 1_000_000);
        assert_eq!(header.latency_time_us, 1000);
        assert_eq!(header.sample_count, 10);
        assert_eq!(header.module_count, 2);
        assert_eq!(header.frequency(), 10.0);
        assert_eq!(header.latency_time(), 0.001);
    }

    #[test]
    fn wrong_byte_order_is_a_magic_error() {
        let mut bytes = vec![1, 0, 0, 0];
        bytes.resize(CaptureHeader::SIZE, 0);
        let mut data = &bytes[..];
        match CaptureHeader::parse::<BigEndian>(&mut data) {
            Err(Error::UnrecognizedMagicValue(0x0100_0000)) => {}
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn truncated_header() {
        let bytes = [1, 0, 0, 0, 0x40, 0x42];
        let mut data = &bytes[..];
        match CaptureHeader::parse::<LittleEndian>(&mut data) {
            Err(Error::Read(ReadError::CaptureHeader)) => {}
            other => panic!("unexpected result {other:?}"),
        }
        let mut data = &bytes[..2];
        match CaptureHeader::parse::<LittleEndian>(&mut data) {
            Err(Error::Read(ReadError::CaptureMagic)) => {}
            other => panic!("unexpected result {other:?}"),
        }
    }
}
