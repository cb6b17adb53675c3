//! In-place archive edits: removing and renaming members
//!
//! Edits change the loaded hash and block tables. [`MutableArchive::flush`]
//! writes them back over the originals, so both tables keep their size and
//! position. When names were removed or added, a fresh `(listfile)` is
//! appended at the end of the file and its block entry repointed. Space
//! held by removed members is not reclaimed.
//!
//! Only format versions 1 and 2 can be edited; later versions carry
//! HET/BET tables this engine does not maintain.
//!
//! # Examples
//!
//! ```no_run
//! use smpq_archive::{MutableArchive, OpenOptions};
//!
//! let mut archive = MutableArchive::open("maps.mpq", &OpenOptions::new())?;
//! archive.remove_file("maps\\old.w3m", 0)?;
//! archive.rename_file("maps\\new.w3m", "maps\\current.w3m", 0)?;
//! archive.flush()?;
//! # Ok::<(), smpq_archive::Error>(())
//! ```

use crate::archive::{Archive, FileInfo, OpenOptions, PATCH_INFO_SIZE};
use crate::crypto::{decrypt_bytes, encrypt_bytes, file_key, hash_string, hash_type};
use crate::header::FormatVersion;
use crate::special_files::{self, is_reserved_name};
use crate::tables::{BlockEntry, BlockFlags, HashEntry, NameHash, Slot};
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Offset of the 32-bit archive size inside the header
const ARCHIVE_SIZE_OFFSET: u64 = 8;

/// An archive opened for modification
#[derive(Debug)]
pub struct MutableArchive {
    archive: Archive,
    file: File,
    /// Names to drop from `(listfile)`
    removed: Vec<String>,
    /// Names to add to `(listfile)`
    added: Vec<String>,
    dirty: bool,
}

impl MutableArchive {
    /// Open an archive for reading and writing.
    ///
    /// Fails with [`Error::UnsupportedVersion`] for format version 3 and
    /// later, and when either table runs past the end of the file.
    pub fn open<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let archive = Archive::open(path, options)?;

        let header = archive.header();
        if header.format_version >= FormatVersion::V3 {
            return Err(Error::UnsupportedVersion(header.format_version.number()));
        }
        for (what, pos, count) in [
            ("hash table", header.hash_table_pos, header.hash_table_size),
            ("block table", header.block_table_pos, header.block_table_size),
        ] {
            if archive.archive_offset() + pos + u64::from(count) * 16 > archive.file_size() {
                return Err(Error::invalid_format(format!(
                    "{what} runs past the end of the file"
                )));
            }
        }

        let file = fs::OpenOptions::new().read(true).write(true).open(path)?;
        log::debug!("Opened {} for modification", path.display());

        Ok(Self {
            archive,
            file,
            removed: Vec::new(),
            added: Vec::new(),
            dirty: false,
        })
    }

    /// The archive as currently edited
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    fn lookup(&self, name: &str, locale: u16) -> Result<FileInfo> {
        if is_reserved_name(name) {
            return Err(Error::InternalFile(name.to_string()));
        }
        self.archive
            .find_file(name, locale)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))
    }

    /// Remove `name` in `locale` from the archive.
    ///
    /// The hash entry is marked deleted. The block entry is cleared unless
    /// another hash entry still points at it.
    pub fn remove_file(&mut self, name: &str, locale: u16) -> Result<()> {
        let info = self.lookup(name, locale)?;
        let (hash_table, block_table) = self.archive.tables_mut();

        if let Some(entry) = hash_table.get_mut(info.hash_index) {
            *entry = deleted_entry();
        }
        let block_slot = Slot::Block(info.block_index as u32);
        if !hash_table.entries().iter().any(|e| e.slot() == block_slot) {
            if let Some(block) = block_table.get_mut(info.block_index) {
                *block = BlockEntry::default();
            }
        }

        log::debug!("Removed {name} (block {})", info.block_index);
        self.forget_name(name);
        self.dirty = true;
        Ok(())
    }

    /// Give the member `old_name` in `locale` the name `new_name`.
    ///
    /// Encrypted members are re-encrypted under the key of the new name.
    pub fn rename_file(&mut self, old_name: &str, new_name: &str, locale: u16) -> Result<()> {
        let info = self.lookup(old_name, locale)?;
        if is_reserved_name(new_name) {
            return Err(Error::InternalFile(new_name.to_string()));
        }
        if self
            .archive
            .hash_table()
            .find_file(new_name, info.locale)
            .is_some_and(|(_, entry)| entry.locale == info.locale)
        {
            return Err(Error::FileExists(new_name.to_string()));
        }

        let (old_key, new_key) = if info.flags.is_encrypted() {
            let reached_by_name = self
                .archive
                .hash_table()
                .get(info.hash_index)
                .is_some_and(|entry| entry.name == NameHash::of(old_name));
            if !reached_by_name {
                return Err(Error::invalid_format(format!(
                    "{old_name}: the real name of this encrypted member is unknown"
                )));
            }
            let new_key = file_key(
                new_name,
                info.block_pos,
                info.file_size as u32,
                info.flags.has_fix_key(),
            );
            (info.encryption_key(), new_key)
        } else {
            (0, 0)
        };

        let hash_table = self.archive.tables_mut().0;
        let Some(old_entry) = hash_table.get(info.hash_index).copied() else {
            return Err(Error::hash_table("hash entry vanished during rename"));
        };
        if let Some(entry) = hash_table.get_mut(info.hash_index) {
            *entry = deleted_entry();
        }
        let inserted = hash_table.insert(new_name, old_entry.locale, old_entry.block_index);
        let new_index = match inserted {
            Ok(index) => index,
            Err(e) => {
                if let Some(entry) = hash_table.get_mut(info.hash_index) {
                    *entry = old_entry;
                }
                return Err(e);
            }
        };

        if old_key != new_key {
            if let Err(e) = self.recrypt(&info, old_key, new_key) {
                let hash_table = self.archive.tables_mut().0;
                if let Some(entry) = hash_table.get_mut(new_index) {
                    *entry = deleted_entry();
                }
                if let Some(entry) = hash_table.get_mut(info.hash_index) {
                    *entry = old_entry;
                }
                return Err(e);
            }
        }

        log::debug!("Renamed {old_name} to {new_name}");
        self.forget_name(old_name);
        self.removed
            .retain(|name| !name.eq_ignore_ascii_case(new_name));
        self.added.push(new_name.to_string());
        self.dirty = true;
        Ok(())
    }

    fn forget_name(&mut self, name: &str) {
        self.added.retain(|added| !added.eq_ignore_ascii_case(name));
        self.removed.push(name.to_string());
    }

    /// Decrypt a member's stored bytes with `old_key` and encrypt them
    /// again with `new_key`, in place
    fn recrypt(&mut self, info: &FileInfo, old_key: u32, new_key: u32) -> Result<()> {
        let mut stored = vec![0u8; info.compressed_size as usize];
        self.file.seek(SeekFrom::Start(info.file_pos))?;
        self.file.read_exact(&mut stored)?;

        let (skip, data_size) = if info.flags.is_patch_file() {
            let mut patch_info = stored.as_slice();
            let length = patch_info.read_u32::<LittleEndian>()?;
            let _flags = patch_info.read_u32::<LittleEndian>()?;
            let data_size = patch_info.read_u32::<LittleEndian>()?;
            if length < PATCH_INFO_SIZE || length as usize > stored.len() {
                return Err(Error::invalid_format(format!(
                    "Bad patch info header ({length} bytes) for {}",
                    info.name
                )));
            }
            (length as usize, u64::from(data_size))
        } else {
            (0, info.file_size)
        };

        recrypt_sectors(
            &mut stored[skip..],
            data_size,
            self.archive.header().sector_size(),
            info.flags,
            old_key,
            new_key,
        )
        .map_err(|e| match e {
            Error::InvalidFormat(msg) => Error::InvalidFormat(format!("{}: {msg}", info.name)),
            other => other,
        })?;

        self.file.seek(SeekFrom::Start(info.file_pos))?;
        self.file.write_all(&stored)?;
        log::trace!("{}: re-encrypted {} bytes", info.name, stored.len());
        Ok(())
    }

    /// Write every pending change to disk
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if !self.removed.is_empty() || !self.added.is_empty() {
            self.rewrite_listfile()?;
        }
        self.write_tables()?;
        self.file.sync_all()?;

        self.removed.clear();
        self.added.clear();
        self.dirty = false;
        Ok(())
    }

    /// Append an updated `(listfile)` and point its block at it
    fn rewrite_listfile(&mut self) -> Result<()> {
        if self.archive.options().no_listfile {
            return Ok(());
        }
        let Some(info) = self.archive.find_file(special_files::RESERVED_LISTFILE, 0) else {
            return Ok(());
        };

        let mut names = self.archive.listfile_names()?;
        names.retain(|name| {
            !self
                .removed
                .iter()
                .any(|removed| removed.eq_ignore_ascii_case(name))
        });
        for added in &self.added {
            if !names.iter().any(|name| name.eq_ignore_ascii_case(added)) {
                names.push(added.clone());
            }
        }
        let mut text = names.join("\r\n");
        if !text.is_empty() {
            text.push_str("\r\n");
        }

        let archive_offset = self.archive.archive_offset();
        let position = self.file.seek(SeekFrom::End(0))? - archive_offset;
        let high = position >> 32;
        let hi_block_pos = self.archive.header().hi_block_table_pos.filter(|&pos| pos != 0);
        if high != 0 && (hi_block_pos.is_none() || high > u64::from(u16::MAX)) {
            return Err(Error::invalid_format(
                "archive too large to append a new (listfile)",
            ));
        }
        let size = u32::try_from(text.len())
            .map_err(|_| Error::invalid_format("(listfile) too large"))?;

        self.file.write_all(text.as_bytes())?;

        if let Some(pos) = hi_block_pos {
            self.file
                .seek(SeekFrom::Start(archive_offset + pos + info.block_index as u64 * 2))?;
            self.file.write_u16::<LittleEndian>(high as u16)?;
        }

        let block_table = self.archive.tables_mut().1;
        if let Some(block) = block_table.get_mut(info.block_index) {
            *block = BlockEntry {
                file_pos: position as u32,
                compressed_size: size,
                file_size: size,
                flags: BlockFlags::EXISTS,
            };
        }

        let archive_size = u32::try_from(position + u64::from(size)).unwrap_or(u32::MAX);
        self.file
            .seek(SeekFrom::Start(archive_offset + ARCHIVE_SIZE_OFFSET))?;
        self.file.write_u32::<LittleEndian>(archive_size)?;

        log::debug!("Rewrote (listfile) with {} names at 0x{position:X}", names.len());
        Ok(())
    }

    /// Encrypt both tables and write them over the originals
    fn write_tables(&mut self) -> Result<()> {
        let archive_offset = self.archive.archive_offset();
        let header = self.archive.header();
        let hash_pos = archive_offset + header.hash_table_pos;
        let block_pos = archive_offset + header.block_table_pos;

        let mut hash_bytes: Vec<u8> = self
            .archive
            .hash_table()
            .entries()
            .iter()
            .flat_map(HashEntry::to_bytes)
            .collect();
        encrypt_bytes(&mut hash_bytes, hash_string("(hash table)", hash_type::FILE_KEY));

        let mut block_bytes: Vec<u8> = self
            .archive
            .block_table()
            .entries()
            .iter()
            .flat_map(BlockEntry::to_bytes)
            .collect();
        encrypt_bytes(&mut block_bytes, hash_string("(block table)", hash_type::FILE_KEY));

        self.file.seek(SeekFrom::Start(hash_pos))?;
        self.file.write_all(&hash_bytes)?;
        self.file.seek(SeekFrom::Start(block_pos))?;
        self.file.write_all(&block_bytes)?;
        Ok(())
    }
}

impl Drop for MutableArchive {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!(
                "Cannot write changes to {}: {e}",
                self.archive.path().display()
            );
        }
    }
}

fn deleted_entry() -> HashEntry {
    HashEntry {
        block_index: HashEntry::BLOCK_DELETED,
        ..HashEntry::free()
    }
}

/// Swap the encryption key of a member body laid out as `flags` say
fn recrypt_sectors(
    body: &mut [u8],
    data_size: u64,
    sector_size: usize,
    flags: BlockFlags,
    old_key: u32,
    new_key: u32,
) -> Result<()> {
    let swap = |chunk: &mut [u8], offset: u32| {
        decrypt_bytes(chunk, old_key.wrapping_add(offset));
        encrypt_bytes(chunk, new_key.wrapping_add(offset));
    };

    if data_size == 0 {
        return Ok(());
    }
    if flags.is_single_unit() {
        swap(body, 0);
        return Ok(());
    }
    if !flags.is_compressed() {
        for (index, sector) in body.chunks_mut(sector_size).enumerate() {
            swap(sector, index as u32);
        }
        return Ok(());
    }

    let sector_count = data_size.div_ceil(sector_size as u64) as usize;
    let entry_count = sector_count + 1 + usize::from(flags.has_sector_crc());
    let Some(table) = body.get_mut(..entry_count * 4) else {
        return Err(Error::invalid_format("sector offset table runs past the data"));
    };
    decrypt_bytes(table, old_key.wrapping_sub(1));
    let offsets: Vec<usize> = table
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize)
        .collect();
    encrypt_bytes(table, new_key.wrapping_sub(1));

    for (index, bounds) in offsets.windows(2).take(sector_count).enumerate() {
        let sector = body
            .get_mut(bounds[0]..bounds[1])
            .ok_or_else(|| Error::invalid_format("Corrupt sector offset table"))?;
        swap(sector, index as u32);
    }
    Ok(())
}
