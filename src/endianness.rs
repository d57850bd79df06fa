/// The byte order of a capture file.
///
/// Captures carry no byte order marker, so the reader has to be told which
/// order to use. [`Endianness::NATIVE`] is the order of the machine running
/// the analysis, which only matches the capture if it was recorded on a host
/// of the same byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    LittleEndian,
    BigEndian,
}

impl Endianness {
    #[cfg(target_endian = "little")]
    pub const NATIVE: Self = Endianness::LittleEndian;
    #[cfg(target_endian = "big")]
    pub const NATIVE: Self = Endianness::BigEndian;

    /// Picks the forced byte order if there is one, and the native one otherwise.
    pub fn forced_or_native(forced: Option<Endianness>) -> Self {
        forced.unwrap_or(Self::NATIVE)
    }
}
