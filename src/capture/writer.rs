use std::io::Write;

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};

use super::header::{CaptureHeader, CAPTURE_MAGIC};
use super::record::{ModuleRecord, RawSample, MODULE_LABEL_LENGTH};
use crate::endianness::Endianness;

/// Encodes captures in the sampler's binary format.
///
/// The sample and module counts in the written header are taken from the
/// slices, not from any previously decoded header.
#[derive(Debug, Clone, Copy)]
pub struct CaptureWriter {
    endian: Endianness,
}

impl CaptureWriter {
    pub fn new(endian: Endianness) -> Self {
        Self { endian }
    }

    pub fn write<W: Write>(
        &self,
        writer: W,
        wall_time_us: u64,
        latency_time_us: u64,
        samples: &[RawSample],
        modules: &[ModuleRecord],
    ) -> Result<(), std::io::Error> {
        let header = CaptureHeader {
            magic: CAPTURE_MAGIC,
            wall_time_us,
            latency_time_us,
            sample_count: samples.len() as u64,
            module_count: u32::try_from(modules.len())
                .map_err(|_| std::io::ErrorKind::InvalidInput)?,
        };
        match self.endian {
            Endianness::LittleEndian => {
                write_impl::<_, LittleEndian>(writer, &header, samples, modules)
            }
            Endianness::BigEndian => write_impl::<_, BigEndian>(writer, &header, samples, modules),
        }
    }

    /// Encode into a new buffer.
    pub fn to_vec(
        &self,
        wall_time_us: u64,
        latency_time_us: u64,
        samples: &[RawSample],
        modules: &[ModuleRecord],
    ) -> Result<Vec<u8>, std::io::Error> {
        let mut buf = Vec::with_capacity(
            CaptureHeader::SIZE
                + samples.iter().map(RawSample::encoded_len).sum::<usize>()
                + modules.len() * ModuleRecord::SIZE,
        );
        self.write(&mut buf, wall_time_us, latency_time_us, samples, modules)?;
        Ok(buf)
    }
}

fn write_impl<W: Write, O: ByteOrder>(
    mut writer: W,
    header: &CaptureHeader,
    samples: &[RawSample],
    modules: &[ModuleRecord],
) -> Result<(), std::io::Error> {
    writer.write_u32::<O>(header.magic)?;
    writer.write_u64::<O>(header.wall_time_us)?;
    writer.write_u64::<O>(header.latency_time_us)?;
    writer.write_u64::<O>(header.sample_count)?;
    writer.write_u32::<O>(header.module_count)?;

    for sample in samples {
        writer.write_f64::<O>(sample.metric)?;
        let thread_count =
            u32::try_from(sample.threads.len()).map_err(|_| std::io::ErrorKind::InvalidInput)?;
        writer.write_u32::<O>(thread_count)?;
        for thread in &sample.threads {
            writer.write_u32::<O>(thread.tid)?;
            writer.write_u64::<O>(thread.pc)?;
            writer.write_u64::<O>(thread.cpu_time_ns)?;
        }
    }

    for module in modules {
        writer.write_u64::<O>(module.start)?;
        writer.write_u64::<O>(module.size)?;
        // Keep at least one NUL so the label stays terminated.
        let mut label = [0; MODULE_LABEL_LENGTH];
        let label_bytes = module.label.as_bytes();
        let len = label_bytes.len().min(MODULE_LABEL_LENGTH - 1);
        label[..len].copy_from_slice(&label_bytes[..len]);
        writer.write_all(&label)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn to_vec_matches_write() {
        let samples = [RawSample {
            metric: 0.5,
            threads: vec![],
        }];
        let modules = [ModuleRecord {
            start: 0x1000,
            size: 0x10,
            label: "app".to_string(),
        }];
        let writer = CaptureWriter::new(Endianness::BigEndian);
        let mut written = Vec::new();
        writer
            .write(&mut written, 7, 1, &samples, &modules)
            .unwrap();
        let buf = writer.to_vec(7, 1, &samples, &modules).unwrap();
        assert_eq!(buf, written);
        assert_eq!(
            buf.len(),
            CaptureHeader::SIZE + RawSample::HEADER_SIZE + ModuleRecord::SIZE
        );
    }
}
