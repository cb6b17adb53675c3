//! Minimal version 1 archive writer for tests

use crate::archive::sector_checksum;
use crate::compression::{compress, flags};
use crate::crypto::{encrypt_bytes, file_key, hash_string, hash_type};
use crate::signatures::{MPQ_ARCHIVE, MPQ_USERDATA};
use crate::special_files::Attributes;
use crate::tables::{BlockEntry, BlockFlags, HashTable};
use crate::{Result, calculate_sector_size};
use md5::{Digest, Md5};
use std::fs;
use std::path::Path;

const HEADER_SIZE: u32 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Normal,
    DeleteMarker,
    Patch,
}

/// A member to write into a test archive
#[derive(Debug, Clone)]
pub struct TestFile {
    /// Name within the archive
    pub name: String,
    /// Content (the `PTCH` payload for patch members)
    pub data: Vec<u8>,
    kind: Kind,
    compression: Option<u8>,
    encrypted: bool,
    fix_key: bool,
    single_unit: bool,
    sector_crc: bool,
    corrupt_checksum: bool,
    locale: u16,
    file_time: u64,
}

impl TestFile {
    /// Plain, uncompressed member
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            data,
            kind: Kind::Normal,
            compression: None,
            encrypted: false,
            fix_key: false,
            single_unit: false,
            sector_crc: false,
            corrupt_checksum: false,
            locale: 0,
            file_time: 0,
        }
    }

    /// Deletion marker hiding `name` in lower layers
    pub fn delete_marker(name: &str) -> Self {
        Self {
            kind: Kind::DeleteMarker,
            ..Self::new(name, Vec::new())
        }
    }

    /// Incremental patch member carrying a `PTCH` payload
    pub fn patch(name: &str, ptch: Vec<u8>) -> Self {
        Self {
            kind: Kind::Patch,
            ..Self::new(name, ptch)
        }
    }

    /// Compress sectors with zlib
    pub fn zlib(self) -> Self {
        self.compression(flags::ZLIB)
    }

    /// Compress sectors with the given method mask
    pub fn compression(mut self, method: u8) -> Self {
        self.compression = Some(method);
        self
    }

    /// Encrypt with the name-derived key
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    /// Encrypt with the position-adjusted key
    pub fn fix_key(mut self) -> Self {
        self.encrypted = true;
        self.fix_key = true;
        self
    }

    /// Store as one unit instead of sectors
    pub fn single_unit(mut self) -> Self {
        self.single_unit = true;
        self
    }

    /// Write per-sector checksums (compressed members only)
    pub fn sector_crc(mut self) -> Self {
        self.sector_crc = true;
        self
    }

    /// Store a wrong checksum for the first sector
    pub fn corrupt_checksum(mut self) -> Self {
        self.corrupt_checksum = true;
        self
    }

    /// Hash table locale
    pub fn locale(mut self, locale: u16) -> Self {
        self.locale = locale;
        self
    }

    /// Time stamp recorded in `(attributes)`
    pub fn file_time(mut self, file_time: u64) -> Self {
        self.file_time = file_time;
        self
    }
}

/// Builder writing small version 1 archives
#[derive(Debug, Clone)]
pub struct TestArchiveBuilder {
    files: Vec<TestFile>,
    sector_shift: u16,
    hash_table_size: Option<u32>,
    listfile: bool,
    attributes: bool,
    user_data: Option<u32>,
}

impl Default for TestArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestArchiveBuilder {
    /// Empty archive with 4 KiB sectors
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            sector_shift: 3,
            hash_table_size: None,
            listfile: false,
            attributes: false,
            user_data: None,
        }
    }

    /// Add a member; block indices follow insertion order
    pub fn file(mut self, file: TestFile) -> Self {
        self.files.push(file);
        self
    }

    /// Sector size shift (`512 << shift`)
    pub fn sector_shift(mut self, shift: u16) -> Self {
        self.sector_shift = shift;
        self
    }

    /// Fixed hash table size (power of two)
    pub fn hash_table_size(mut self, size: u32) -> Self {
        self.hash_table_size = Some(size);
        self
    }

    /// Append a `(listfile)` naming every member
    pub fn with_listfile(mut self) -> Self {
        self.listfile = true;
        self
    }

    /// Append an `(attributes)` file with the members' time stamps
    pub fn with_attributes(mut self) -> Self {
        self.attributes = true;
        self
    }

    /// Place the archive behind a user data header at `offset`
    pub fn user_data(mut self, offset: u32) -> Self {
        self.user_data = Some(offset);
        self
    }

    /// Write the archive to `path`
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.build()?)?;
        Ok(())
    }

    /// Build the archive bytes
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut files = self.files.clone();
        if self.listfile {
            let names: Vec<&str> = self.files.iter().map(|f| f.name.as_str()).collect();
            files.push(TestFile::new("(listfile)", names.join("\r\n").into_bytes()));
        }
        if self.attributes {
            // The attributes member covers its own block with a zero time
            let mut filetimes: Vec<u64> = files.iter().map(|f| f.file_time).collect();
            filetimes.push(0);
            files.push(TestFile::new("(attributes)", Attributes::with_filetimes(&filetimes)));
        }

        let sector_size = calculate_sector_size(self.sector_shift);
        let mut body = Vec::new();
        let mut blocks = Vec::with_capacity(files.len());
        for file in &files {
            let block_pos = HEADER_SIZE + body.len() as u32;
            let (stored, block) = encode_file(file, block_pos, sector_size)?;
            body.extend_from_slice(&stored);
            blocks.push(block);
        }

        let hash_size = self
            .hash_table_size
            .unwrap_or_else(|| ((files.len() * 2).next_power_of_two() as u32).max(16));
        let mut hash_table = HashTable::new(hash_size as usize)?;
        for (index, file) in files.iter().enumerate() {
            hash_table.insert(&file.name, file.locale, index as u32)?;
        }

        let mut hash_bytes: Vec<u8> = hash_table
            .entries()
            .iter()
            .flat_map(|entry| entry.to_bytes())
            .collect();
        encrypt_bytes(
            &mut hash_bytes,
            hash_string("(hash table)", hash_type::FILE_KEY),
        );
        let mut block_bytes: Vec<u8> = blocks.iter().flat_map(BlockEntry::to_bytes).collect();
        encrypt_bytes(
            &mut block_bytes,
            hash_string("(block table)", hash_type::FILE_KEY),
        );

        let hash_pos = HEADER_SIZE + body.len() as u32;
        let block_pos = hash_pos + hash_bytes.len() as u32;
        let archive_size = block_pos + block_bytes.len() as u32;

        let mut out = Vec::new();
        if let Some(offset) = self.user_data {
            out.extend_from_slice(&MPQ_USERDATA.to_le_bytes());
            out.extend_from_slice(&(offset - 16).to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&16u32.to_le_bytes());
            out.resize(offset as usize, 0);
        }

        out.extend_from_slice(&MPQ_ARCHIVE.to_le_bytes());
        out.extend_from_slice(&HEADER_SIZE.to_le_bytes());
        out.extend_from_slice(&archive_size.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&self.sector_shift.to_le_bytes());
        out.extend_from_slice(&hash_pos.to_le_bytes());
        out.extend_from_slice(&block_pos.to_le_bytes());
        out.extend_from_slice(&hash_size.to_le_bytes());
        out.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out.extend_from_slice(&hash_bytes);
        out.extend_from_slice(&block_bytes);
        Ok(out)
    }
}

fn encode_file(file: &TestFile, block_pos: u32, sector_size: usize) -> Result<(Vec<u8>, BlockEntry)> {
    let mut flags = BlockFlags::EXISTS;
    if file.kind == Kind::DeleteMarker {
        flags |= BlockFlags::DELETE_MARKER;
        let block = BlockEntry {
            file_pos: block_pos,
            compressed_size: 0,
            file_size: 0,
            flags,
        };
        return Ok((Vec::new(), block));
    }

    let content = &file.data;
    let file_size = content.len() as u32;
    if file.encrypted {
        flags |= BlockFlags::ENCRYPTED;
    }
    if file.fix_key {
        flags |= BlockFlags::FIX_KEY;
    }
    if file.compression.is_some() {
        flags |= BlockFlags::COMPRESS;
    }
    let key = if file.encrypted {
        file_key(&file.name, block_pos, file_size, file.fix_key)
    } else {
        0
    };
    // Unencrypted members keep key 0 for the offset table and every sector
    let table_key = if key == 0 { 0 } else { key.wrapping_sub(1) };
    let sector_key = |index: usize| if key == 0 { 0 } else { key.wrapping_add(index as u32) };

    let mut stored = Vec::new();
    if file.kind == Kind::Patch {
        flags |= BlockFlags::PATCH_FILE;
        stored.extend_from_slice(&0x1Cu32.to_le_bytes());
        stored.extend_from_slice(&0x8000_0000u32.to_le_bytes());
        stored.extend_from_slice(&file_size.to_le_bytes());
        stored.extend_from_slice(&Md5::digest(content));
    }

    if content.is_empty() {
        // nothing stored
    } else if file.single_unit {
        flags |= BlockFlags::SINGLE_UNIT;
        let mut unit = encode_sector(content, file.compression)?;
        encrypt_bytes(&mut unit, key);
        stored.extend_from_slice(&unit);
    } else if let Some(method) = file.compression {
        let sectors: Vec<Vec<u8>> = content
            .chunks(sector_size)
            .map(|chunk| encode_sector(chunk, Some(method)))
            .collect::<Result<_>>()?;

        let mut checksums: Vec<u32> = sectors.iter().map(|s| sector_checksum(s)).collect();
        if file.corrupt_checksum {
            checksums[0] = checksums[0].wrapping_add(1);
        }
        if file.sector_crc {
            flags |= BlockFlags::SECTOR_CRC;
        }

        let entry_count = sectors.len() + 1 + usize::from(file.sector_crc);
        let mut offsets = Vec::with_capacity(entry_count);
        let mut position = (entry_count * 4) as u32;
        offsets.push(position);
        for sector in &sectors {
            position += sector.len() as u32;
            offsets.push(position);
        }
        if file.sector_crc {
            offsets.push(position + (checksums.len() * 4) as u32);
        }

        let mut table: Vec<u8> = offsets.iter().flat_map(|o| o.to_le_bytes()).collect();
        encrypt_bytes(&mut table, table_key);
        stored.extend_from_slice(&table);
        for (index, sector) in sectors.into_iter().enumerate() {
            let mut sector = sector;
            encrypt_bytes(&mut sector, sector_key(index));
            stored.extend_from_slice(&sector);
        }
        if file.sector_crc {
            stored.extend(checksums.iter().flat_map(|c| c.to_le_bytes()));
        }
    } else {
        for (index, chunk) in content.chunks(sector_size).enumerate() {
            let mut sector = chunk.to_vec();
            encrypt_bytes(&mut sector, sector_key(index));
            stored.extend_from_slice(&sector);
        }
    }

    let block = BlockEntry {
        file_pos: block_pos,
        compressed_size: stored.len() as u32,
        file_size,
        flags,
    };
    Ok((stored, block))
}

/// Compress one sector, keeping it raw when compression does not help
fn encode_sector(data: &[u8], method: Option<u8>) -> Result<Vec<u8>> {
    let Some(method) = method else {
        return Ok(data.to_vec());
    };
    let compressed = compress(data, method)?;
    Ok(if compressed.len() < data.len() {
        compressed
    } else {
        data.to_vec()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Archive, OpenOptions};
    use tempfile::TempDir;

    #[test]
    fn test_builder_writes_readable_header() {
        let data = TestArchiveBuilder::new()
            .file(TestFile::new("a.txt", b"a".to_vec()))
            .build()
            .unwrap();
        assert_eq!(&data[..4], b"MPQ\x1A");

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mpq");
        fs::write(&path, data).unwrap();
        let archive = Archive::open(&path, &OpenOptions::new()).unwrap();
        assert_eq!(archive.header().hash_table_size, 16);
        assert_eq!(archive.block_table().size(), 1);
    }

    #[test]
    fn test_plain_member_offset_table_is_stored_in_the_clear() {
        let content: Vec<u8> = (0..1500u32).map(|i| (i % 7) as u8).collect();
        let data = TestArchiveBuilder::new()
            .sector_shift(0)
            .file(TestFile::new("plain.bin", content.clone()).zlib())
            .build()
            .unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mpq");
        fs::write(&path, &data).unwrap();
        let archive = Archive::open(&path, &OpenOptions::new()).unwrap();

        // Three 512-byte sectors and the end offset
        let start = archive.block_table().get(0).unwrap().file_pos as usize;
        let first = u32::from_le_bytes([data[start], data[start + 1], data[start + 2], data[start + 3]]);
        assert_eq!(first, 16);
        assert_eq!(archive.read_member("plain.bin", 0).unwrap(), content);
    }

    #[test]
    fn test_attributes_cover_every_block() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mpq");
        TestArchiveBuilder::new()
            .file(TestFile::new("a.txt", b"a".to_vec()).file_time(42))
            .with_listfile()
            .with_attributes()
            .write(&path)
            .unwrap();

        let archive = Archive::open(&path, &OpenOptions::new()).unwrap();
        let attributes = archive.attributes().unwrap();
        assert_eq!(attributes.flags(), crate::special_files::attribute_flags::FILETIME);
        assert_eq!(attributes.filetime(0), 42);
    }
}
