//! Hash table: maps a name and locale to a block index

use super::common::read_table_bytes;
use crate::crypto::{hash_string, hash_type};
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek};

/// The two check hashes that identify a name inside the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameHash {
    pub a: u32,
    pub b: u32,
}

impl NameHash {
    pub fn of(name: &str) -> Self {
        Self {
            a: hash_string(name, hash_type::NAME_A),
            b: hash_string(name, hash_type::NAME_B),
        }
    }
}

/// What a hash table slot holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Never used; ends every lookup
    Free,
    /// Freed; probing continues past it
    Deleted,
    Block(u32),
}

/// One 16-byte hash table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEntry {
    pub name: NameHash,
    /// Windows LANGID, 0 for neutral
    pub locale: u16,
    /// Always 0 in shipped archives
    pub platform: u16,
    pub block_index: u32,
}

impl HashEntry {
    pub const SIZE: usize = 16;
    pub const BLOCK_FREE: u32 = 0xFFFF_FFFF;
    pub const BLOCK_DELETED: u32 = 0xFFFF_FFFE;

    /// A never used slot, as written by Blizzard tools
    pub fn free() -> Self {
        Self {
            name: NameHash {
                a: u32::MAX,
                b: u32::MAX,
            },
            locale: u16::MAX,
            platform: u16::MAX,
            block_index: Self::BLOCK_FREE,
        }
    }

    /// Entry pointing `name` in `locale` at `block_index`
    pub fn for_name(name: &str, locale: u16, block_index: u32) -> Self {
        Self {
            name: NameHash::of(name),
            locale,
            platform: 0,
            block_index,
        }
    }

    pub fn slot(&self) -> Slot {
        match self.block_index {
            Self::BLOCK_FREE => Slot::Free,
            Self::BLOCK_DELETED => Slot::Deleted,
            index => Slot::Block(index),
        }
    }

    /// Whether the entry points at a block
    pub fn is_valid(&self) -> bool {
        matches!(self.slot(), Slot::Block(_))
    }

    /// Decode an entry from already decrypted bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let Some(mut raw) = data.get(..Self::SIZE) else {
            return Err(Error::invalid_format(format!(
                "hash entry needs {} bytes, got {}",
                Self::SIZE,
                data.len()
            )));
        };
        Ok(Self {
            name: NameHash {
                a: raw.read_u32::<LittleEndian>()?,
                b: raw.read_u32::<LittleEndian>()?,
            },
            locale: raw.read_u16::<LittleEndian>()?,
            platform: raw.read_u16::<LittleEndian>()?,
            block_index: raw.read_u32::<LittleEndian>()?,
        })
    }

    /// Encode the entry, before table encryption
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..4].copy_from_slice(&self.name.a.to_le_bytes());
        out[4..8].copy_from_slice(&self.name.b.to_le_bytes());
        out[8..10].copy_from_slice(&self.locale.to_le_bytes());
        out[10..12].copy_from_slice(&self.platform.to_le_bytes());
        out[12..].copy_from_slice(&self.block_index.to_le_bytes());
        out
    }
}

/// Decrypted hash table, sized to a power of two
#[derive(Debug)]
pub struct HashTable {
    entries: Vec<HashEntry>,
}

impl HashTable {
    /// Table of `size` free slots
    pub fn new(size: usize) -> Result<Self> {
        if !size.is_power_of_two() || u32::try_from(size).is_err() {
            return Err(Error::hash_table(format!(
                "hash table size {size} is not a power of two"
            )));
        }
        Ok(Self {
            entries: vec![HashEntry::free(); size],
        })
    }

    /// Read and decrypt `size` entries at `offset`.
    ///
    /// Entries missing because the table was cut by the end of the file
    /// read as free.
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        offset: u64,
        size: u32,
        file_size: u64,
    ) -> Result<Self> {
        let mut table = Self::new(size as usize)?;

        let key = hash_string("(hash table)", hash_type::FILE_KEY);
        let raw = read_table_bytes(reader, offset, size, file_size, key, "hash table")?;
        for (slot, chunk) in table
            .entries
            .iter_mut()
            .zip(raw.chunks_exact(HashEntry::SIZE))
        {
            *slot = HashEntry::from_bytes(chunk)?;
        }

        Ok(table)
    }

    pub fn entries(&self) -> &[HashEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HashEntry> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut HashEntry> {
        self.entries.get_mut(index)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Slot indices in lookup order for `name`, wrapping once around
    fn slot_sequence(&self, name: &str) -> impl Iterator<Item = usize> + use<> {
        let mask = self.entries.len() - 1;
        let start = hash_string(name, hash_type::TABLE_OFFSET) as usize & mask;
        (0..self.entries.len()).map(move |step| (start + step) & mask)
    }

    /// Find a file in the hash table.
    ///
    /// An entry carrying exactly `locale` wins. Otherwise the neutral
    /// (locale 0) entry is used, and when the neutral locale itself was
    /// asked for and there is none, the first entry with a matching name.
    pub fn find_file(&self, name: &str, locale: u16) -> Option<(usize, &HashEntry)> {
        let wanted = NameHash::of(name);
        let mut neutral = None;
        let mut first = None;

        for index in self.slot_sequence(name) {
            let entry = &self.entries[index];
            match entry.slot() {
                Slot::Free => break,
                Slot::Deleted => continue,
                Slot::Block(_) if entry.name != wanted => continue,
                Slot::Block(_) => {}
            }
            if entry.locale == locale {
                return Some((index, entry));
            }
            if entry.locale == 0 {
                neutral.get_or_insert(index);
            }
            first.get_or_insert(index);
        }

        let found = neutral.or(first.filter(|_| locale == 0))?;
        Some((found, &self.entries[found]))
    }

    /// Put `name` into the first free or deleted slot of its lookup sequence
    pub fn insert(&mut self, name: &str, locale: u16, block_index: u32) -> Result<usize> {
        let index = self
            .slot_sequence(name)
            .find(|&index| !self.entries[index].is_valid())
            .ok_or_else(|| Error::hash_table("hash table is full"))?;
        self.entries[index] = HashEntry::for_name(name, locale, block_index);
        Ok(index)
    }
}
