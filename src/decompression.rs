use std::io;

use zstd_safe::{CompressionLevel, DCtx, InBuffer, OutBuffer};

/// The level used when writing compressed profiles.
pub const COMPRESSION_LEVEL: CompressionLevel = 19;

const CHUNK_SIZE: usize = 1024 * 1024;

/// Decompress a complete zstd stream, which may consist of several frames.
pub fn decompress(compressed_data: &[u8]) -> io::Result<Vec<u8>> {
    let mut dctx = DCtx::create();
    let mut chunk = vec![0; CHUNK_SIZE];
    let mut in_buffer = InBuffer::around(compressed_data);
    let mut uncompressed_data = Vec::with_capacity(compressed_data.len() * 4);

    loop {
        let mut out_buffer = OutBuffer::around(&mut chunk[..]);
        let remaining_hint = dctx
            .decompress_stream(&mut out_buffer, &mut in_buffer)
            .map_err(|code| zstd_error("decompression", code))?;
        let out_len = out_buffer.pos();
        uncompressed_data.extend_from_slice(&chunk[..out_len]);

        let input_consumed = in_buffer.pos() == compressed_data.len();
        if input_consumed && out_len < chunk.len() {
            if remaining_hint != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Zstd stream ended in the middle of a frame",
                ));
            }
            break;
        }
    }
    Ok(uncompressed_data)
}

/// Compress `data` into a single zstd frame.
pub fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut compressed_data = vec![0; zstd_safe::compress_bound(data.len())];
    let len = zstd_safe::compress(&mut compressed_data[..], data, COMPRESSION_LEVEL)
        .map_err(|code| zstd_error("compression", code))?;
    compressed_data.truncate(len);
    Ok(compressed_data)
}

fn zstd_error(operation: &str, code: zstd_safe::ErrorCode) -> io::Error {
    let error_name = zstd_safe::get_error_name(code);
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Zstd {operation} failed: {error_name}"),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compress_then_decompress() {
        let data: Vec<u8> = (0..10_000u32).flat_map(|i| (i % 251).to_le_bytes()).collect();
        let compressed = compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn truncated_stream() {
        let data = vec![7u8; 4096];
        let compressed = compress(&data).unwrap();
        let err = decompress(&compressed[..compressed.len() - 2]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn garbage_is_invalid_data() {
        let err = decompress(b"definitely not zstd").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
