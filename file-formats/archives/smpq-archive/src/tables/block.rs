//! Block table: where each member's data lives and how it is stored

use super::common::read_table_bytes;
use crate::crypto::{hash_string, hash_type};
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};
use std::ops::{BitOr, BitOrAssign};

/// Storage flags of a block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BlockFlags(u32);

impl BlockFlags {
    /// PKWare implode without a per-sector method byte
    pub const IMPLODE: Self = Self(0x0000_0100);
    /// Sectors start with a compression method byte
    pub const COMPRESS: Self = Self(0x0000_0200);
    pub const ENCRYPTED: Self = Self(0x0001_0000);
    /// Encryption key is mixed with the block position and size
    pub const FIX_KEY: Self = Self(0x0002_0000);
    /// Member is a `PTCH` incremental patch
    pub const PATCH_FILE: Self = Self(0x0010_0000);
    pub const SINGLE_UNIT: Self = Self(0x0100_0000);
    /// Member deletes the name from lower layers
    pub const DELETE_MARKER: Self = Self(0x0200_0000);
    /// An Adler-32 table follows the sector offsets
    pub const SECTOR_CRC: Self = Self(0x0400_0000);
    pub const EXISTS: Self = Self(0x8000_0000);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether any bit of `other` is set
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn exists(self) -> bool {
        self.intersects(Self::EXISTS)
    }

    /// Compressed by any means, imploded included
    pub fn is_compressed(self) -> bool {
        self.intersects(Self::IMPLODE | Self::COMPRESS)
    }

    pub fn is_imploded(self) -> bool {
        self.intersects(Self::IMPLODE)
    }

    pub fn is_encrypted(self) -> bool {
        self.intersects(Self::ENCRYPTED)
    }

    pub fn has_fix_key(self) -> bool {
        self.intersects(Self::FIX_KEY)
    }

    pub fn is_single_unit(self) -> bool {
        self.intersects(Self::SINGLE_UNIT)
    }

    pub fn has_sector_crc(self) -> bool {
        self.intersects(Self::SECTOR_CRC)
    }

    pub fn is_patch_file(self) -> bool {
        self.intersects(Self::PATCH_FILE)
    }

    pub fn is_delete_marker(self) -> bool {
        self.intersects(Self::DELETE_MARKER)
    }
}

impl BitOr for BlockFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for BlockFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// One 16-byte block table entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockEntry {
    /// Data offset, relative to the archive header (low 32 bits)
    pub file_pos: u32,
    /// Bytes stored in the archive
    pub compressed_size: u32,
    /// Bytes after decoding
    pub file_size: u32,
    pub flags: BlockFlags,
}

impl BlockEntry {
    pub const SIZE: usize = 16;

    /// Decode an entry from already decrypted bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let Some(mut raw) = data.get(..Self::SIZE) else {
            return Err(Error::invalid_format(format!(
                "block entry needs {} bytes, got {}",
                Self::SIZE,
                data.len()
            )));
        };
        Ok(Self {
            file_pos: raw.read_u32::<LittleEndian>()?,
            compressed_size: raw.read_u32::<LittleEndian>()?,
            file_size: raw.read_u32::<LittleEndian>()?,
            flags: BlockFlags::from_bits(raw.read_u32::<LittleEndian>()?),
        })
    }

    /// Encode the entry, before table encryption
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let words = [
            self.file_pos,
            self.compressed_size,
            self.file_size,
            self.flags.bits(),
        ];
        let mut out = [0u8; Self::SIZE];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }
}

/// Decrypted block table
#[derive(Debug, Default)]
pub struct BlockTable {
    entries: Vec<BlockEntry>,
}

impl BlockTable {
    pub fn from_entries(entries: Vec<BlockEntry>) -> Self {
        Self { entries }
    }

    /// Read and decrypt `size` entries at `offset`.
    ///
    /// A table cut short by the end of the file keeps only the entries
    /// that are fully present.
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        offset: u64,
        size: u32,
        file_size: u64,
    ) -> Result<Self> {
        let key = hash_string("(block table)", hash_type::FILE_KEY);
        let raw = read_table_bytes(reader, offset, size, file_size, key, "block table")?;

        let entries = raw
            .chunks_exact(BlockEntry::SIZE)
            .map(BlockEntry::from_bytes)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&BlockEntry> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut BlockEntry> {
        self.entries.get_mut(index)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }
}

/// High 16 bits of every block's file position (format version 2 and up)
#[derive(Debug, Default)]
pub struct HiBlockTable {
    high_words: Vec<u16>,
}

impl HiBlockTable {
    /// Read up to `size` words at `offset`, stopping at the end of the file
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        offset: u64,
        size: u32,
        file_size: u64,
    ) -> Result<Self> {
        let fits = file_size.saturating_sub(offset) / 2;
        let count = u64::from(size).min(fits);
        if count < u64::from(size) {
            log::warn!("hi-block table truncated to {count} of {size} entries");
        }

        reader.seek(SeekFrom::Start(offset))?;
        let high_words = (0..count)
            .map(|_| reader.read_u16::<LittleEndian>())
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self { high_words })
    }

    /// Bits 32..48 of a block's position, 0 past the end of the table
    pub fn position_high(&self, index: usize) -> u64 {
        self.high_words
            .get(index)
            .map_or(0, |&word| u64::from(word) << 32)
    }
}
