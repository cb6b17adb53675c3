//! LZMA decompression
//!
//! StormLib stores LZMA sectors as a filter byte (always 0), the five
//! property bytes and the raw stream; the unpacked size is known from the
//! sector. Streams that carry a full `.lzma` header are accepted as well.

use crate::{Error, Result};
use lzma_rs::decompress::{Options, UnpackedSize};
use std::io::BufReader;

/// Decompress using LZMA
pub(crate) fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected_size);

    let result = if data.len() > 6 && data[0] == 0 {
        let options = Options {
            unpacked_size: UnpackedSize::UseProvided(Some(expected_size as u64)),
            ..Options::default()
        };
        let mut input = BufReader::new(&data[1..]);
        lzma_rs::lzma_decompress_with_options(&mut input, &mut output, &options)
    } else {
        let mut input = BufReader::new(data);
        lzma_rs::lzma_decompress(&mut input, &mut output)
    };

    result.map_err(|e| Error::compression(format!("LZMA decompression failed: {e:?}")))?;
    Ok(output)
}
