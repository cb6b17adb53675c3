//! Sector decompression and multi-method handling

use super::algorithms;
use super::methods::{CompressionMethod, flags};
use crate::{Error, Result};

/// Decompress one sector whose first byte is the compression method.
///
/// `expected_size` is the size of the sector once fully decoded. Stacked
/// methods are undone in the fixed StormLib order: BZip2, PKWare, zlib and
/// finally sparse.
pub fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let Some((&method, payload)) = data.split_first() else {
        return Err(Error::compression("Empty compressed data"));
    };

    log::trace!(
        "Decompressing {} bytes to {expected_size} bytes with method 0x{method:02X}",
        payload.len()
    );

    match CompressionMethod::from_flags(method) {
        CompressionMethod::None => Ok(payload.to_vec()),
        CompressionMethod::Zlib => algorithms::zlib::decompress(payload, expected_size),
        CompressionMethod::BZip2 => algorithms::bzip2::decompress(payload, expected_size),
        CompressionMethod::Lzma => algorithms::lzma::decompress(payload, expected_size),
        CompressionMethod::Sparse => algorithms::sparse::decompress(payload, expected_size),
        CompressionMethod::PKWare => algorithms::pkware::decompress(payload),
        CompressionMethod::Stacked(method) => decompress_stacked(payload, method, expected_size),
        CompressionMethod::Unsupported(method) => Err(Error::UnsupportedCompression(method)),
    }
}

/// Decompress a PKWare imploded sector (no method byte)
pub fn explode(data: &[u8]) -> Result<Vec<u8>> {
    algorithms::pkware::decompress(data)
}

fn decompress_stacked(data: &[u8], method: u8, expected_size: usize) -> Result<Vec<u8>> {
    log::trace!("Undoing stacked methods 0x{method:02X}");

    let mut current = data.to_vec();

    if method & flags::BZIP2 != 0 {
        current = algorithms::bzip2::decompress(&current, expected_size)?;
    }
    if method & flags::PKWARE != 0 {
        current = algorithms::pkware::decompress(&current)?;
    }
    if method & flags::ZLIB != 0 {
        current = algorithms::zlib::decompress(&current, expected_size)?;
    }
    if method & flags::SPARSE != 0 {
        current = algorithms::sparse::decompress(&current, expected_size)?;
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::compress;

    const TEXT: &[u8] = b"The quick brown fox jumps over the lazy dog. \
        The quick brown fox jumps over the lazy dog. \
        The quick brown fox jumps over the lazy dog.";

    #[test]
    fn test_single_methods() {
        for method in [flags::ZLIB, flags::BZIP2, flags::PKWARE] {
            let packed = compress(TEXT, method).unwrap();
            assert_eq!(packed[0], method, "method byte for 0x{method:02X}");
            assert_eq!(decompress(&packed, TEXT.len()).unwrap(), TEXT);
        }
    }

    #[test]
    fn test_stacked_sparse_and_zlib() {
        let mut raw = vec![0u8; 600];
        raw[10..20].copy_from_slice(b"0123456789");

        let packed = compress(&raw, flags::SPARSE | flags::ZLIB).unwrap();
        assert_eq!(packed[0], flags::SPARSE | flags::ZLIB);
        assert_eq!(decompress(&packed, raw.len()).unwrap(), raw);
    }

    #[test]
    fn test_wave_codecs_are_unsupported() {
        for method in [flags::HUFFMAN, flags::ADPCM_MONO, flags::ADPCM_STEREO | flags::HUFFMAN] {
            let err = decompress(&[method, 0, 0, 0], 16).unwrap_err();
            assert!(matches!(err, Error::UnsupportedCompression(m) if m == method));
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(decompress(&[], 10).is_err());
    }
}
