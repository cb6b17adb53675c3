//! Deflate sectors (zlib framing), via flate2

use crate::{Error, Result};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

pub(crate) fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_size);
    ZlibDecoder::new(data).read_to_end(&mut out).map_err(|e| {
        log::debug!(
            "inflate failed: {e}; leading bytes {:02X?}",
            &data[..16.min(data.len())]
        );
        Error::compression(format!("Zlib decompression failed: {e}"))
    })?;
    Ok(out)
}

pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let failed = |e: std::io::Error| Error::compression(format!("Zlib compression failed: {e}"));
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).map_err(failed)?;
    encoder.finish().map_err(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_an_error() {
        let err = decompress(&[0x78, 0x9C, 0xFF, 0xFF, 0xFF], 10).unwrap_err();
        assert!(err.to_string().contains("Zlib"));
    }

    #[test]
    fn test_repetitive_data_shrinks() {
        let original = "A".repeat(1000).into_bytes();
        let compressed = compress(&original).unwrap();
        assert!(compressed.len() < original.len() / 2);
        assert_eq!(decompress(&compressed, original.len()).unwrap(), original);
    }
}
