//! PKWare Data Compression Library (implode/explode), via pklib

use crate::{Error, Result};
use pklib::{CompressionMode, DictionarySize, explode_bytes, implode_bytes};

pub(crate) fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    explode_bytes(data).map_err(|e| {
        log::debug!("explode of {} bytes failed: {e}", data.len());
        Error::compression(format!("PKWare explode failed: {e}"))
    })
}

/// Binary mode with a 4 KiB dictionary, the setting Blizzard tools use
pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>> {
    implode_bytes(data, CompressionMode::Binary, DictionarySize::Size4K)
        .map_err(|e| Error::compression(format!("PKWare implode failed: {e}")))
}
