//! BZip2 sectors

use crate::{Error, Result};
use bzip2::Compression;
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use std::io::{Read, Write};

fn failure(action: &str, e: std::io::Error) -> Error {
    Error::compression(format!("BZip2 {action} failed: {e}"))
}

pub(crate) fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_size);
    BzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| failure("decompression", e))?;
    Ok(out)
}

/// Only the test archive writer produces BZip2 sectors.
pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = BzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| failure("compression", e))?;
    encoder.finish().map_err(|e| failure("compression", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_magic_is_an_error() {
        let err = decompress(b"not a bzip2 stream", 512).unwrap_err();
        assert!(err.to_string().contains("BZip2"));
    }

    #[test]
    fn test_sector_round_trip() {
        let sector: Vec<u8> = (0..4096u32).map(|i| (i % 7) as u8).collect();
        let packed = compress(&sector).unwrap();
        assert_eq!(decompress(&packed, sector.len()).unwrap(), sector);
    }
}
