use std::fs;
use std::path::Path;

use crate::container::ProfileContainer;
#[cfg(feature = "zstd")]
use crate::decompression::{compress, decompress};
use crate::error::Error;

/// File name extension which selects zstd compression.
pub const COMPRESSED_EXTENSION: &str = "zst";

/// Whether profiles at `path` are stored compressed.
pub fn is_compressed_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension == COMPRESSED_EXTENSION)
}

/// Read the profile at `path`, which must have version `expected_version`.
pub fn read_profile(path: &Path, expected_version: &'static str) -> Result<ProfileContainer, Error> {
    log::info!("Reading profile {}", path.display());
    let data = fs::read(path)?;
    let data = if is_compressed_path(path) {
        decompress(&data)?
    } else {
        data
    };
    ProfileContainer::from_bytes(&data, expected_version)
}

/// Write `container` to `path`, compressed if the path ends in `.zst`.
pub fn write_profile(path: &Path, container: &ProfileContainer) -> Result<(), Error> {
    let mut data = container.to_bytes();
    if is_compressed_path(path) {
        data = compress(&data)?;
    }
    fs::write(path, data)?;
    log::info!("Profile written to {}", path.display());
    Ok(())
}

#[cfg(not(feature = "zstd"))]
fn decompress(_data: &[u8]) -> std::io::Result<Vec<u8>> {
    Err(compression_unsupported())
}

#[cfg(not(feature = "zstd"))]
fn compress(_data: &[u8]) -> std::io::Result<Vec<u8>> {
    Err(compression_unsupported())
}

#[cfg(not(feature = "zstd"))]
fn compression_unsupported() -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "Compressed profiles require the zstd feature",
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compressed_paths() {
        assert!(is_compressed_path(Path::new("out/profile.bin.zst")));
        assert!(!is_compressed_path(Path::new("out/profile.bin")));
        assert!(!is_compressed_path(Path::new("zst")));
    }
}
