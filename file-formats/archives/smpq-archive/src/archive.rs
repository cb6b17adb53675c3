//! Single MPQ archive: header and table loading, member lookup and
//! streamed member decoding
//!
//! An [`Archive`] holds only the decoded tables. Member data is read by a
//! [`MemberReader`], which opens its own handle on the archive file and
//! decodes one sector at a time, so any number of members can be streamed
//! while the archive is shared.
//!
//! # Examples
//!
//! ```no_run
//! use smpq_archive::{Archive, OpenOptions};
//! use std::io::Read;
//!
//! let archive = Archive::open("data.mpq", &OpenOptions::new())?;
//! let mut reader = archive.open_member("readme.txt", 0)?;
//! let mut text = String::new();
//! reader.read_to_string(&mut text)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::compression;
use crate::crypto::{decrypt_bytes, file_key};
use crate::header::{self, MpqHeader, UserDataHeader};
use crate::special_files::{self, Attributes};
use crate::tables::{BlockFlags, BlockTable, HashTable, HiBlockTable, NameHash};
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Size of the patch info header in front of incremental patch members
pub(crate) const PATCH_INFO_SIZE: u32 = 0x1C;

/// Options controlling how archives are opened
///
/// # Examples
///
/// ```
/// use smpq_archive::OpenOptions;
///
/// let options = OpenOptions::new()
///     .no_attributes(true)
///     .check_sector_crc(true);
/// assert!(options.check_sector_crc);
/// assert!(!options.no_listfile);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Do not read the embedded `(listfile)`
    pub no_listfile: bool,
    /// Do not read `(attributes)`; member time stamps become 0
    pub no_attributes: bool,
    /// Parse only the version 1 header fields
    pub force_version1: bool,
    /// Verify per-sector Adler-32 checksums when a member carries them
    pub check_sector_crc: bool,
    /// Archive is stored through the PART stream provider
    pub partial: bool,
    /// Archive is stored through the MPQE stream provider
    pub encrypted: bool,
}

impl OpenOptions {
    /// Create options with every switch off
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the embedded listfile
    pub fn no_listfile(mut self, value: bool) -> Self {
        self.no_listfile = value;
        self
    }

    /// Skip the attributes file
    pub fn no_attributes(mut self, value: bool) -> Self {
        self.no_attributes = value;
        self
    }

    /// Force version 1 header parsing
    pub fn force_version1(mut self, value: bool) -> Self {
        self.force_version1 = value;
        self
    }

    /// Verify sector checksums
    pub fn check_sector_crc(mut self, value: bool) -> Self {
        self.check_sector_crc = value;
        self
    }

    /// Select the partial stream provider
    pub fn partial(mut self, value: bool) -> Self {
        self.partial = value;
        self
    }

    /// Select the encrypted stream provider
    pub fn encrypted(mut self, value: bool) -> Self {
        self.encrypted = value;
        self
    }
}

/// Information about a member located in the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Name the member was looked up with
    pub name: String,
    /// Index in hash table
    pub hash_index: usize,
    /// Index in block table
    pub block_index: usize,
    /// Absolute position of the member data in the archive file
    pub file_pos: u64,
    /// Position relative to the archive header, as used by `FIX_KEY`
    pub block_pos: u32,
    /// Stored size
    pub compressed_size: u64,
    /// Uncompressed size
    pub file_size: u64,
    pub flags: BlockFlags,
    /// Locale of the hash entry that matched
    pub locale: u16,
    /// Time stamp from `(attributes)`, 0 when none was recorded
    pub file_time: u64,
}

impl FileInfo {
    /// Encryption key of the member, 0 when it is not encrypted
    pub fn encryption_key(&self) -> u32 {
        if !self.flags.is_encrypted() {
            return 0;
        }
        file_key(
            &self.name,
            self.block_pos,
            self.file_size as u32,
            self.flags.has_fix_key(),
        )
    }
}

/// An open MPQ archive
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    archive_offset: u64,
    user_data: Option<UserDataHeader>,
    header: MpqHeader,
    hash_table: HashTable,
    block_table: BlockTable,
    hi_block_table: Option<HiBlockTable>,
    attributes: Option<Attributes>,
    file_size: u64,
    has_signature: bool,
    options: OpenOptions,
}

impl Archive {
    /// Open an archive read-only and load its tables.
    ///
    /// The partial and encrypted stream providers are not supported and
    /// fail with [`Error::UnsupportedStream`].
    pub fn open<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self> {
        if options.partial {
            return Err(Error::UnsupportedStream("PART"));
        }
        if options.encrypted {
            return Err(Error::UnsupportedStream("MPQE"));
        }

        let path = path.as_ref().to_path_buf();
        let mut reader = BufReader::new(File::open(&path)?);
        let file_size = reader.seek(SeekFrom::End(0))?;

        let (archive_offset, user_data, header) =
            header::find_header(&mut reader, options.force_version1)?;

        let hash_table = HashTable::read(
            &mut reader,
            archive_offset + header.hash_table_pos,
            header.hash_table_size,
            file_size,
        )?;
        let block_table = BlockTable::read(
            &mut reader,
            archive_offset + header.block_table_pos,
            header.block_table_size,
            file_size,
        )?;
        let hi_block_table = match header.hi_block_table_pos {
            Some(pos) if pos != 0 => Some(HiBlockTable::read(
                &mut reader,
                archive_offset + pos,
                header.block_table_size,
                file_size,
            )?),
            _ => None,
        };

        log::debug!(
            "Opened {}: {} hash entries, {} blocks",
            path.display(),
            hash_table.size(),
            block_table.size()
        );

        let mut archive = Self {
            path,
            archive_offset,
            user_data,
            header,
            hash_table,
            block_table,
            hi_block_table,
            attributes: None,
            file_size,
            has_signature: false,
            options: options.clone(),
        };

        archive.has_signature = archive
            .find_file(special_files::RESERVED_SIGNATURE, 0)
            .is_some();

        if !options.no_attributes {
            archive.attributes = archive.load_attributes();
        }

        Ok(archive)
    }

    /// Read `(attributes)`, ignoring it with a warning when it is damaged
    fn load_attributes(&self) -> Option<Attributes> {
        let data = match self.read_member(special_files::RESERVED_ATTRIBUTES, 0) {
            Ok(data) => data,
            Err(Error::FileNotFound(_)) => return None,
            Err(e) => {
                log::warn!("Ignoring unreadable (attributes): {e}");
                return None;
            }
        };

        // Some writers leave the attributes file itself out of the arrays
        let block_count = self.block_table.size();
        Attributes::parse(&data, block_count)
            .or_else(|_| Attributes::parse(&data, block_count.saturating_sub(1)))
            .map_err(|e| log::warn!("Ignoring malformed (attributes): {e}"))
            .ok()
    }

    /// Path of the archive file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the MPQ header
    pub fn header(&self) -> &MpqHeader {
        &self.header
    }

    /// Get the user data header, if the archive has one
    pub fn user_data(&self) -> Option<&UserDataHeader> {
        self.user_data.as_ref()
    }

    /// Absolute offset of the archive header in the file
    pub fn archive_offset(&self) -> u64 {
        self.archive_offset
    }

    /// Size of the archive file on disk
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Get the hash table
    pub fn hash_table(&self) -> &HashTable {
        &self.hash_table
    }

    /// Get the block table
    pub fn block_table(&self) -> &BlockTable {
        &self.block_table
    }

    pub(crate) fn tables_mut(&mut self) -> (&mut HashTable, &mut BlockTable) {
        (&mut self.hash_table, &mut self.block_table)
    }

    /// Parsed `(attributes)`, when present and loaded
    pub fn attributes(&self) -> Option<&Attributes> {
        self.attributes.as_ref()
    }

    /// Whether the archive carries a `(signature)` member
    pub fn has_signature(&self) -> bool {
        self.has_signature
    }

    /// Options the archive was opened with
    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// Number of block entries that hold a file
    pub fn file_count(&self) -> usize {
        self.block_table
            .entries()
            .iter()
            .filter(|block| block.flags.exists())
            .count()
    }

    /// Look up a member by name.
    ///
    /// Locale resolution follows [`HashTable::find_file`]. Blocks without
    /// the `EXISTS` flag are not files. Deletion markers and patch members
    /// are returned as found; callers decide what they mean. Stub names
    /// (`File00000012.xxx`) address the block directly when no hash entry
    /// matches.
    pub fn find_file(&self, name: &str, locale: u16) -> Option<FileInfo> {
        if let Some((hash_index, entry)) = self.hash_table.find_file(name, locale) {
            return self.file_info(name, hash_index, entry.block_index as usize, entry.locale);
        }

        if special_files::is_stub_name(name) {
            let block_index = name[4..12].parse::<usize>().ok()?;
            let hash_index = self
                .hash_table
                .entries()
                .iter()
                .position(|entry| entry.is_valid() && entry.block_index as usize == block_index)?;
            let locale = self.hash_table.entries()[hash_index].locale;
            return self.file_info(name, hash_index, block_index, locale);
        }

        None
    }

    fn file_info(
        &self,
        name: &str,
        hash_index: usize,
        block_index: usize,
        locale: u16,
    ) -> Option<FileInfo> {
        let Some(block) = self.block_table.get(block_index) else {
            log::warn!(
                "{}: hash entry {hash_index} points past the block table",
                self.path.display()
            );
            return None;
        };
        if !block.flags.exists() {
            return None;
        }

        let high = self
            .hi_block_table
            .as_ref()
            .map_or(0, |hi| hi.position_high(block_index));

        Some(FileInfo {
            name: name.to_string(),
            hash_index,
            block_index,
            file_pos: self.archive_offset + high + u64::from(block.file_pos),
            block_pos: block.file_pos,
            compressed_size: u64::from(block.compressed_size),
            file_size: u64::from(block.file_size),
            flags: block.flags,
            locale,
            file_time: self
                .attributes
                .as_ref()
                .map_or(0, |attrs| attrs.filetime(block_index)),
        })
    }

    /// Open a located member for streaming
    pub fn open_file(&self, info: &FileInfo) -> Result<MemberReader> {
        MemberReader::new(
            &self.path,
            info.clone(),
            self.header.sector_size(),
            self.options.check_sector_crc,
        )
    }

    /// Look up and open a member for streaming.
    ///
    /// Deletion markers read as not found. Incremental patch members hold a
    /// `PTCH` payload rather than file content; they are only meaningful to
    /// a [`PatchChain`](crate::PatchChain).
    pub fn open_member(&self, name: &str, locale: u16) -> Result<MemberReader> {
        let info = self
            .find_file(name, locale)
            .filter(|info| !info.flags.is_delete_marker())
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;
        self.open_file(&info)
    }

    /// Read a whole member into memory
    pub fn read_member(&self, name: &str, locale: u16) -> Result<Vec<u8>> {
        let mut reader = self.open_member(name, locale)?;
        let mut data = Vec::with_capacity(reader.size() as usize);
        reader.read_to_end(&mut data).map_err(Error::from_io)?;
        Ok(data)
    }

    /// Names from the embedded `(listfile)`.
    ///
    /// Empty when the archive has none or was opened with `no_listfile`.
    pub fn listfile_names(&self) -> Result<Vec<String>> {
        if self.options.no_listfile {
            return Ok(Vec::new());
        }
        match self.read_member(special_files::RESERVED_LISTFILE, 0) {
            Ok(data) => Ok(special_files::parse_listfile(&data)),
            Err(Error::FileNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Block indices of existing files that none of `names` reaches
    pub fn unnamed_blocks(&self, names: &[String]) -> Vec<usize> {
        let named: HashSet<NameHash> = names.iter().map(|name| NameHash::of(name)).collect();

        let mut blocks: Vec<usize> = self
            .hash_table
            .entries()
            .iter()
            .filter(|entry| entry.is_valid() && !named.contains(&entry.name))
            .map(|entry| entry.block_index as usize)
            .filter(|&index| {
                self.block_table
                    .get(index)
                    .is_some_and(|block| block.flags.exists() && !block.flags.is_delete_marker())
            })
            .collect();
        blocks.sort_unstable();
        blocks.dedup();
        blocks
    }
}

/// How a member's bytes are laid out on disk
#[derive(Debug)]
enum Layout {
    /// Nothing to read
    Empty,
    /// One encoded unit covering the whole member
    SingleUnit,
    /// Compressed sectors addressed by an offset table
    Compressed {
        offsets: Vec<u32>,
        checksums: Option<Vec<u32>>,
    },
    /// Uncompressed sectors stored back to back
    Plain,
}

/// Streaming reader over one archive member.
///
/// Each call to [`Read::read`] hands out bytes from the current decoded
/// sector and decodes the next one when it runs dry.
#[derive(Debug)]
pub struct MemberReader {
    reader: BufReader<File>,
    info: FileInfo,
    key: u32,
    sector_size: usize,
    /// Start of the stored data (after the patch info header, if any)
    data_pos: u64,
    /// Stored size of the data
    stored_size: u64,
    /// Decoded size of the data
    data_size: u64,
    layout: Layout,
    next_sector: usize,
    sector_count: usize,
    buffer: Vec<u8>,
    buffer_pos: usize,
}

impl MemberReader {
    fn new(
        path: &Path,
        info: FileInfo,
        sector_size: usize,
        check_sector_crc: bool,
    ) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let key = info.encryption_key();

        let (data_pos, stored_size, data_size) = if info.flags.is_patch_file() {
            reader.seek(SeekFrom::Start(info.file_pos))?;
            let length = reader.read_u32::<LittleEndian>()?;
            let _flags = reader.read_u32::<LittleEndian>()?;
            let data_size = reader.read_u32::<LittleEndian>()?;
            if length < PATCH_INFO_SIZE || u64::from(length) > info.compressed_size {
                return Err(Error::invalid_format(format!(
                    "Bad patch info header ({length} bytes) for {}",
                    info.name
                )));
            }
            (
                info.file_pos + u64::from(length),
                info.compressed_size - u64::from(length),
                u64::from(data_size),
            )
        } else {
            (info.file_pos, info.compressed_size, info.file_size)
        };

        let sector_count = if info.flags.is_single_unit() {
            1
        } else {
            data_size.div_ceil(sector_size as u64) as usize
        };

        let mut member = Self {
            reader,
            info,
            key,
            sector_size,
            data_pos,
            stored_size,
            data_size,
            layout: Layout::Empty,
            next_sector: 0,
            sector_count,
            buffer: Vec::new(),
            buffer_pos: 0,
        };

        member.layout = if member.data_size == 0 {
            Layout::Empty
        } else if member.info.flags.is_single_unit() {
            Layout::SingleUnit
        } else if member.info.flags.is_compressed() {
            member.read_sector_offsets(check_sector_crc)?
        } else {
            Layout::Plain
        };

        Ok(member)
    }

    /// Name the member was opened with
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Decoded size of the member
    pub fn size(&self) -> u64 {
        self.data_size
    }

    /// Lookup details of the member
    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    fn read_sector_offsets(&mut self, check_sector_crc: bool) -> Result<Layout> {
        let has_crc = self.info.flags.has_sector_crc();
        let entry_count = self.sector_count + 1 + usize::from(has_crc);
        let table_len = entry_count * 4;

        let mut raw = vec![0u8; table_len];
        self.reader.seek(SeekFrom::Start(self.data_pos))?;
        self.reader.read_exact(&mut raw)?;
        if self.key != 0 {
            decrypt_bytes(&mut raw, self.key.wrapping_sub(1));
        }

        let offsets: Vec<u32> = raw
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        if offsets[0] as usize != table_len
            || offsets.windows(2).any(|pair| pair[0] > pair[1])
            || u64::from(offsets[entry_count - 1]) > self.stored_size
        {
            return Err(Error::invalid_format(format!(
                "Corrupt sector offset table for {}",
                self.info.name
            )));
        }

        let checksums = if has_crc && check_sector_crc {
            self.read_sector_checksums(&offsets)?
        } else {
            None
        };

        log::trace!(
            "{}: {} sectors, checksums {}",
            self.info.name,
            self.sector_count,
            if checksums.is_some() { "on" } else { "off" }
        );

        Ok(Layout::Compressed { offsets, checksums })
    }

    /// Read the checksum block stored between the last two offsets
    fn read_sector_checksums(&mut self, offsets: &[u32]) -> Result<Option<Vec<u32>>> {
        let start = offsets[self.sector_count];
        let end = offsets[self.sector_count + 1];
        let expected_len = self.sector_count * 4;
        if end <= start {
            return Ok(None);
        }

        let mut raw = vec![0u8; (end - start) as usize];
        self.reader
            .seek(SeekFrom::Start(self.data_pos + u64::from(start)))?;
        self.reader.read_exact(&mut raw)?;

        let raw = if raw.len() < expected_len {
            compression::decompress(&raw, expected_len)?
        } else {
            raw
        };
        if raw.len() < expected_len {
            log::warn!("{}: sector checksum block too short", self.info.name);
            return Ok(None);
        }

        Ok(Some(
            raw[..expected_len]
                .chunks_exact(4)
                .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        ))
    }

    /// Expected decoded length of sector `index`
    fn sector_len(&self, index: usize) -> usize {
        let start = (index * self.sector_size) as u64;
        (self.data_size - start).min(self.sector_size as u64) as usize
    }

    /// Decode the next sector into the buffer; false at end of data
    fn fill_buffer(&mut self) -> Result<bool> {
        if self.next_sector >= self.sector_count {
            return Ok(false);
        }
        let index = self.next_sector;
        self.next_sector += 1;

        let (offset, stored_len, expected_len) = match &self.layout {
            Layout::Empty => return Ok(false),
            Layout::SingleUnit => (0, self.stored_size as usize, self.data_size as usize),
            Layout::Compressed { offsets, .. } => (
                u64::from(offsets[index]),
                (offsets[index + 1] - offsets[index]) as usize,
                self.sector_len(index),
            ),
            Layout::Plain => {
                let len = self.sector_len(index);
                ((index * self.sector_size) as u64, len, len)
            }
        };

        let mut raw = vec![0u8; stored_len];
        self.reader
            .seek(SeekFrom::Start(self.data_pos + offset))?;
        self.reader.read_exact(&mut raw)?;

        if self.key != 0 {
            decrypt_bytes(&mut raw, self.key.wrapping_add(index as u32));
        }

        if let Layout::Compressed {
            checksums: Some(checksums),
            ..
        } = &self.layout
        {
            let expected = checksums[index];
            if expected != 0 {
                let actual = sector_checksum(&raw);
                if actual != expected {
                    return Err(Error::ChecksumMismatch {
                        file: format!("{} (sector {index})", self.info.name),
                        expected,
                        actual,
                    });
                }
            }
        }

        self.buffer = if stored_len < expected_len && self.info.flags.is_compressed() {
            if self.info.flags.is_imploded() {
                compression::explode(&raw)?
            } else {
                compression::decompress(&raw, expected_len)?
            }
        } else {
            raw
        };

        if self.buffer.len() != expected_len {
            return Err(Error::compression(format!(
                "{}: sector {index} decoded to {} bytes, expected {expected_len}",
                self.info.name,
                self.buffer.len()
            )));
        }

        self.buffer_pos = 0;
        Ok(true)
    }
}

impl Read for MemberReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.buffer_pos >= self.buffer.len() {
            if !self.fill_buffer()? {
                return Ok(0);
            }
        }

        let available = &self.buffer[self.buffer_pos..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.buffer_pos += count;
        Ok(count)
    }
}

/// Adler-32 of a raw sector as stored in sector checksum tables
pub(crate) fn sector_checksum(data: &[u8]) -> u32 {
    let mut adler = adler2::Adler32::from_checksum(0);
    adler.write_slice(data);
    adler.checksum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestArchiveBuilder, TestFile};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn build(dir: &TempDir, builder: TestArchiveBuilder) -> PathBuf {
        let path = dir.path().join("test.mpq");
        builder.write(&path).unwrap();
        path
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_open_options_builder() {
        let options = OpenOptions::new()
            .no_listfile(true)
            .force_version1(true);
        assert!(options.no_listfile);
        assert!(options.force_version1);
        assert!(!options.no_attributes);
        assert_eq!(OpenOptions::new(), OpenOptions::default());
    }

    #[test]
    fn test_unsupported_stream_providers() {
        let dir = TempDir::new().unwrap();
        let path = build(&dir, TestArchiveBuilder::new());

        let err = Archive::open(&path, &OpenOptions::new().partial(true)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedStream("PART")));
        let err = Archive::open(&path, &OpenOptions::new().encrypted(true)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedStream("MPQE")));
    }

    #[test]
    fn test_not_an_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.bin");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();
        let err = Archive::open(&path, &OpenOptions::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_read_plain_and_compressed_members() {
        let dir = TempDir::new().unwrap();
        let big = sample(10_000);
        let path = build(
            &dir,
            TestArchiveBuilder::new()
                .file(TestFile::new("plain.txt", b"hello world".to_vec()))
                .file(TestFile::new("data\\big.bin", big.clone()).zlib())
                .file(TestFile::new("data\\raw.bin", big.clone())),
        );

        let archive = Archive::open(&path, &OpenOptions::new()).unwrap();
        assert_eq!(archive.read_member("plain.txt", 0).unwrap(), b"hello world");
        assert_eq!(archive.read_member("data\\big.bin", 0).unwrap(), big);
        assert_eq!(archive.read_member("DATA/RAW.BIN", 0).unwrap(), big);
        assert!(archive.read_member("missing", 0).unwrap_err().is_not_found());
    }

    #[test]
    fn test_small_reads_stream_across_sectors() {
        let dir = TempDir::new().unwrap();
        let data = sample(5_000);
        let path = build(
            &dir,
            TestArchiveBuilder::new()
                .sector_shift(0)
                .file(TestFile::new("a.bin", data.clone()).zlib()),
        );
        let archive = Archive::open(&path, &OpenOptions::new()).unwrap();
        let mut reader = archive.open_member("a.bin", 0).unwrap();
        assert_eq!(reader.size(), 5_000);

        let mut out = Vec::new();
        let mut chunk = [0u8; 100];
        loop {
            let n = reader.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, data);
    }

    #[test]
    fn test_encrypted_members() {
        let dir = TempDir::new().unwrap();
        let data = sample(3_000);
        let path = build(
            &dir,
            TestArchiveBuilder::new()
                .file(TestFile::new("war3map.j", data.clone()).zlib().encrypted())
                .file(TestFile::new("units\\a.slk", data.clone()).encrypted().fix_key())
                .file(
                    TestFile::new("single.txt", data.clone())
                        .zlib()
                        .single_unit()
                        .encrypted(),
                ),
        );
        let archive = Archive::open(&path, &OpenOptions::new()).unwrap();
        assert_eq!(archive.read_member("war3map.j", 0).unwrap(), data);
        assert_eq!(archive.read_member("units\\a.slk", 0).unwrap(), data);
        assert_eq!(archive.read_member("single.txt", 0).unwrap(), data);
    }

    #[test]
    fn test_empty_member() {
        let dir = TempDir::new().unwrap();
        let path = build(
            &dir,
            TestArchiveBuilder::new().file(TestFile::new("empty.txt", Vec::new())),
        );
        let archive = Archive::open(&path, &OpenOptions::new()).unwrap();
        assert!(archive.read_member("empty.txt", 0).unwrap().is_empty());
    }

    #[test]
    fn test_locale_selection() {
        let dir = TempDir::new().unwrap();
        let path = build(
            &dir,
            TestArchiveBuilder::new()
                .file(TestFile::new("text.txt", b"neutral".to_vec()))
                .file(TestFile::new("text.txt", b"german".to_vec()).locale(0x407)),
        );
        let archive = Archive::open(&path, &OpenOptions::new()).unwrap();
        assert_eq!(archive.read_member("text.txt", 0x407).unwrap(), b"german");
        assert_eq!(archive.read_member("text.txt", 0).unwrap(), b"neutral");
        assert_eq!(archive.read_member("text.txt", 0x409).unwrap(), b"neutral");
    }

    #[test]
    fn test_delete_marker_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = build(
            &dir,
            TestArchiveBuilder::new().file(TestFile::delete_marker("gone.txt")),
        );
        let archive = Archive::open(&path, &OpenOptions::new()).unwrap();
        let info = archive.find_file("gone.txt", 0).unwrap();
        assert!(info.flags.is_delete_marker());
        assert!(archive.open_member("gone.txt", 0).unwrap_err().is_not_found());
    }

    #[test]
    fn test_sector_checksums() {
        let dir = TempDir::new().unwrap();
        let data = sample(4_000);
        let path = build(
            &dir,
            TestArchiveBuilder::new()
                .sector_shift(0)
                .file(TestFile::new("crc.bin", data.clone()).zlib().sector_crc())
                .file(
                    TestFile::new("bad.bin", data.clone())
                        .zlib()
                        .sector_crc()
                        .corrupt_checksum(),
                ),
        );

        let checked = Archive::open(&path, &OpenOptions::new().check_sector_crc(true)).unwrap();
        assert_eq!(checked.read_member("crc.bin", 0).unwrap(), data);
        let err = checked.read_member("bad.bin", 0).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));

        let unchecked = Archive::open(&path, &OpenOptions::new()).unwrap();
        assert_eq!(unchecked.read_member("bad.bin", 0).unwrap(), data);
    }

    #[test]
    fn test_listfile_and_attributes() {
        let dir = TempDir::new().unwrap();
        let path = build(
            &dir,
            TestArchiveBuilder::new()
                .file(TestFile::new("a.txt", b"a".to_vec()).file_time(0x01D0_0000_0000_0000))
                .file(TestFile::new("b\\c.txt", b"c".to_vec()))
                .with_listfile()
                .with_attributes(),
        );

        let archive = Archive::open(&path, &OpenOptions::new()).unwrap();
        let names = archive.listfile_names().unwrap();
        assert!(names.contains(&"a.txt".to_string()));
        assert!(names.contains(&"b\\c.txt".to_string()));
        assert_eq!(archive.find_file("a.txt", 0).unwrap().file_time, 0x01D0_0000_0000_0000);
        assert_eq!(archive.find_file("b\\c.txt", 0).unwrap().file_time, 0);

        let bare = Archive::open(
            &path,
            &OpenOptions::new().no_listfile(true).no_attributes(true),
        )
        .unwrap();
        assert!(bare.listfile_names().unwrap().is_empty());
        assert!(bare.attributes().is_none());
        assert_eq!(bare.find_file("a.txt", 0).unwrap().file_time, 0);
    }

    #[test]
    fn test_unnamed_blocks_and_stub_lookup() {
        let dir = TempDir::new().unwrap();
        let path = build(
            &dir,
            TestArchiveBuilder::new()
                .file(TestFile::new("known.txt", b"known".to_vec()))
                .file(TestFile::new("secret.txt", b"secret".to_vec())),
        );
        let archive = Archive::open(&path, &OpenOptions::new()).unwrap();
        assert_eq!(archive.file_count(), 2);

        let unnamed = archive.unnamed_blocks(&["known.txt".to_string()]);
        assert_eq!(unnamed, vec![1]);

        let stub = special_files::stub_name(1);
        assert_eq!(archive.read_member(&stub, 0).unwrap(), b"secret");
    }

    #[test]
    fn test_user_data_header_is_followed() {
        let dir = TempDir::new().unwrap();
        let path = build(
            &dir,
            TestArchiveBuilder::new()
                .user_data(0x400)
                .file(TestFile::new("a.txt", b"behind user data".to_vec())),
        );
        let archive = Archive::open(&path, &OpenOptions::new()).unwrap();
        assert!(archive.user_data().is_some());
        assert_eq!(archive.archive_offset(), 0x400);
        assert_eq!(archive.read_member("a.txt", 0).unwrap(), b"behind user data");
    }
}
