//! `(attributes)` member
//!
//! Version 100 layout: a `u32` version, a `u32` flag word, then one array
//! per flag, each indexed by block: CRC32 (`u32`), file time (`u64`), MD5
//! (16 bytes) and a patch bitmap. Only the file times are kept.

use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Seek, SeekFrom};

/// Bits of the `(attributes)` flag word
pub mod flags {
    pub const CRC32: u32 = 0x01;
    pub const FILETIME: u32 = 0x02;
    pub const MD5: u32 = 0x04;
    pub const PATCH_BIT: u32 = 0x08;
}

/// File times recorded in `(attributes)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    flags: u32,
    filetimes: Vec<u64>,
}

impl Attributes {
    /// The only version written by Blizzard tools
    pub const VERSION: u32 = 100;

    /// Parse `data` as describing `block_count` blocks.
    ///
    /// Fails when the arrays announced by the flag word do not fit.
    pub fn parse(data: &[u8], block_count: usize) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let (version, flags) = match (
            cursor.read_u32::<LittleEndian>(),
            cursor.read_u32::<LittleEndian>(),
        ) {
            (Ok(version), Ok(flags)) => (version, flags),
            _ => return Err(Error::invalid_format("(attributes) shorter than its header")),
        };
        if version != Self::VERSION {
            return Err(Error::invalid_format(format!(
                "(attributes) version {version}, expected {}",
                Self::VERSION
            )));
        }

        let needed = 8 + Self::arrays_len(flags, block_count);
        if data.len() < needed {
            return Err(Error::invalid_format(format!(
                "(attributes) holds {} bytes, {needed} needed for {block_count} blocks",
                data.len()
            )));
        }

        let mut filetimes = Vec::new();
        if flags & flags::FILETIME != 0 {
            if flags & flags::CRC32 != 0 {
                cursor.seek(SeekFrom::Current(4 * block_count as i64))?;
            }
            filetimes.reserve(block_count);
            for _ in 0..block_count {
                filetimes.push(cursor.read_u64::<LittleEndian>()?);
            }
        }

        Ok(Self { flags, filetimes })
    }

    fn arrays_len(flags: u32, blocks: usize) -> usize {
        [
            (flags::CRC32, 4 * blocks),
            (flags::FILETIME, 8 * blocks),
            (flags::MD5, 16 * blocks),
            (flags::PATCH_BIT, blocks.div_ceil(8)),
        ]
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, len)| len)
        .sum()
    }

    /// Raw flag word
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Windows FILETIME of a block, 0 when none was recorded
    pub fn filetime(&self, block_index: usize) -> u64 {
        self.filetimes.get(block_index).copied().unwrap_or(0)
    }

    /// Encode an attributes member that carries only file times
    pub fn with_filetimes(filetimes: &[u64]) -> Vec<u8> {
        let mut data = Vec::with_capacity(8 + filetimes.len() * 8);
        data.extend_from_slice(&Self::VERSION.to_le_bytes());
        data.extend_from_slice(&flags::FILETIME.to_le_bytes());
        for time in filetimes {
            data.extend_from_slice(&time.to_le_bytes());
        }
        data
    }
}
