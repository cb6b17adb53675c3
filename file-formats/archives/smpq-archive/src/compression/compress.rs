//! Sector compression, used to build archives for tests

use super::algorithms;
use super::methods::flags;
use crate::{Error, Result};

/// Compress `data` and prefix the method byte.
///
/// Supports zlib, BZip2, PKWare and sparse, alone or stacked the way the
/// decoder expects (sparse first, then the remaining codecs).
pub fn compress(data: &[u8], method: u8) -> Result<Vec<u8>> {
    if method == 0 || method & !flags::STACKABLE != 0 {
        return Err(Error::UnsupportedCompression(method));
    }

    let mut current = data.to_vec();
    if method & flags::SPARSE != 0 {
        current = algorithms::sparse::compress(&current);
    }
    if method & flags::ZLIB != 0 {
        current = algorithms::zlib::compress(&current)?;
    }
    if method & flags::PKWARE != 0 {
        current = algorithms::pkware::compress(&current)?;
    }
    if method & flags::BZIP2 != 0 {
        current = algorithms::bzip2::compress(&current)?;
    }

    let mut out = Vec::with_capacity(current.len() + 1);
    out.push(method);
    out.extend_from_slice(&current);
    Ok(out)
}
