use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::header::CaptureHeader;
use super::record::{ModuleRecord, RawSample};
use crate::endianness::Endianness;
use crate::error::{Error, ReadError};

/// A fully decoded capture.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCapture {
    /// The byte order the capture was decoded with.
    pub endian: Endianness,
    pub header: CaptureHeader,
    pub samples: Vec<RawSample>,
    pub modules: Vec<ModuleRecord>,
}

impl RawCapture {
    /// Decode a capture from `data`.
    ///
    /// If `endian` is `None`, the capture is assumed to have been written by a
    /// machine with the same byte order as this one.
    ///
    /// Fails with [`Error::UnrecognizedMagicValue`] if this is not a capture (or
    /// the byte order is wrong), and with [`Error::Read`] if the capture is cut
    /// short.
    pub fn parse(data: &[u8], endian: Option<Endianness>) -> Result<Self, Error> {
        match Endianness::forced_or_native(endian) {
            Endianness::LittleEndian => Self::parse_impl::<LittleEndian>(data),
            Endianness::BigEndian => Self::parse_impl::<BigEndian>(data),
        }
    }

    /// Only decode the header and the module records, skipping over the samples
    /// without collecting them.
    pub fn parse_without_samples(
        data: &[u8],
        endian: Option<Endianness>,
    ) -> Result<(CaptureHeader, Vec<ModuleRecord>), Error> {
        match Endianness::forced_or_native(endian) {
            Endianness::LittleEndian => Self::parse_summary_impl::<LittleEndian>(data),
            Endianness::BigEndian => Self::parse_summary_impl::<BigEndian>(data),
        }
    }

    fn parse_impl<O: ByteOrder>(data: &[u8]) -> Result<Self, Error> {
        let mut cur = data;
        let header = CaptureHeader::parse::<O>(&mut cur)?;

        let capacity = usize::try_from(header.sample_count)
            .unwrap_or(usize::MAX)
            .min(cur.len() / RawSample::HEADER_SIZE);
        let mut samples = Vec::with_capacity(capacity);
        for _ in 0..header.sample_count {
            samples.push(RawSample::parse::<O>(&mut cur)?);
        }
        log::debug!("Decoded {} raw samples", samples.len());

        let modules = Self::parse_modules::<O>(&mut cur, header.module_count)?;

        Ok(Self {
            endian: endian_of::<O>(),
            header,
            samples,
            modules,
        })
    }

    fn parse_summary_impl<O: ByteOrder>(
        data: &[u8],
    ) -> Result<(CaptureHeader, Vec<ModuleRecord>), Error> {
        let mut cur = data;
        let header = CaptureHeader::parse::<O>(&mut cur)?;
        for _ in 0..header.sample_count {
            RawSample::parse::<O>(&mut cur)?;
        }
        let modules = Self::parse_modules::<O>(&mut cur, header.module_count)?;
        Ok((header, modules))
    }

    fn parse_modules<O: ByteOrder>(
        cur: &mut &[u8],
        module_count: u32,
    ) -> Result<Vec<ModuleRecord>, Error> {
        let capacity = (module_count as usize).min(cur.len() / ModuleRecord::SIZE);
        let mut modules = Vec::with_capacity(capacity);
        for _ in 0..module_count {
            let module = ModuleRecord::parse::<O>(cur).map_err(|_| ReadError::ModuleRecord)?;
            modules.push(module);
        }
        Ok(modules)
    }
}

fn endian_of<O: ByteOrder>() -> Endianness {
    if O::read_u16(&[0, 1]) == 1 {
        Endianness::BigEndian
    } else {
        Endianness::LittleEndian
    }
}
