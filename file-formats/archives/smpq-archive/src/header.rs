//! MPQ header structures and parsing

use crate::signatures::{MPQ_ARCHIVE, MPQ_USERDATA};
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

/// Header alignment requirement (512 bytes)
pub const HEADER_ALIGNMENT: u64 = 0x200;

/// MPQ format version
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FormatVersion {
    /// Version 1 - Original format (32-byte header)
    V1 = 0,
    /// Version 2 - Burning Crusade (44-byte header)
    V2 = 1,
    /// Version 3 - Cataclysm Beta (68-byte header)
    V3 = 2,
    /// Version 4 - Cataclysm+ (208-byte header)
    V4 = 3,
}

impl FormatVersion {
    /// Get the header size for this version
    pub fn header_size(&self) -> u32 {
        match self {
            FormatVersion::V1 => 0x20,
            FormatVersion::V2 => 0x2C,
            FormatVersion::V3 => 0x44,
            FormatVersion::V4 => 0xD0,
        }
    }

    /// Create from raw version number
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(FormatVersion::V1),
            1 => Some(FormatVersion::V2),
            2 => Some(FormatVersion::V3),
            3 => Some(FormatVersion::V4),
            _ => None,
        }
    }

    /// Human readable version number (1-4)
    pub fn number(&self) -> u16 {
        *self as u16 + 1
    }
}

/// User data header that may precede the archive header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDataHeader {
    /// Bytes reserved for user data
    pub user_data_size: u32,
    /// Distance from this header to the archive header
    pub header_offset: u32,
    /// Size of this header
    pub user_data_header_size: u32,
}

/// Archive header, reduced to what classic table lookup needs.
///
/// Offsets are relative to the start of the header. Version 2 adds the
/// high 16 bits of the table offsets and the hi-block table, version 3 a
/// 64-bit archive size. The HET/BET tables of versions 3 and 4 are not
/// read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpqHeader {
    /// Header size the archive claims
    pub header_size: u32,
    /// Format version; version 1 when forced
    pub format_version: FormatVersion,
    /// Sector size shift (`512 << block_size`)
    pub block_size: u16,
    /// Archive size, 64-bit from version 3 on
    pub archive_size: u64,
    /// Hash table offset
    pub hash_table_pos: u64,
    /// Block table offset
    pub block_table_pos: u64,
    /// Hash table entry count
    pub hash_table_size: u32,
    /// Block table entry count
    pub block_table_size: u32,
    /// Hi-block table offset, version 2 and later
    pub hi_block_table_pos: Option<u64>,
}

fn widen(lo: u32, hi: u16) -> u64 {
    (u64::from(hi) << 32) | u64::from(lo)
}

impl MpqHeader {
    /// Read an MPQ header from the current position of `reader`.
    ///
    /// With `force_version1` every field past the 32-byte v1 header is
    /// ignored and the archive is treated as version 1, whatever its
    /// header claims.
    pub fn read<R: Read>(reader: &mut R, force_version1: bool) -> Result<Self> {
        if reader.read_u32::<LittleEndian>()? != MPQ_ARCHIVE {
            return Err(Error::invalid_format("Invalid MPQ header signature"));
        }

        let header_size = reader.read_u32::<LittleEndian>()?;
        let archive_size = reader.read_u32::<LittleEndian>()?;
        let raw_version = reader.read_u16::<LittleEndian>()?;
        let block_size = reader.read_u16::<LittleEndian>()?;
        let hash_lo = reader.read_u32::<LittleEndian>()?;
        let block_lo = reader.read_u32::<LittleEndian>()?;
        let hash_table_size = reader.read_u32::<LittleEndian>()?;
        let block_table_size = reader.read_u32::<LittleEndian>()?;

        let format_version = if force_version1 {
            FormatVersion::V1
        } else {
            let version =
                FormatVersion::from_raw(raw_version).ok_or(Error::UnsupportedVersion(raw_version))?;
            if header_size < version.header_size() {
                return Err(Error::invalid_format(format!(
                    "Header size {header_size} too small for version {}",
                    version.number()
                )));
            }
            version
        };

        let mut header = Self {
            header_size,
            format_version,
            block_size,
            archive_size: u64::from(archive_size),
            hash_table_pos: u64::from(hash_lo),
            block_table_pos: u64::from(block_lo),
            hash_table_size,
            block_table_size,
            hi_block_table_pos: None,
        };

        if format_version >= FormatVersion::V2 {
            header.hi_block_table_pos = Some(reader.read_u64::<LittleEndian>()?);
            header.hash_table_pos = widen(hash_lo, reader.read_u16::<LittleEndian>()?);
            header.block_table_pos = widen(block_lo, reader.read_u16::<LittleEndian>()?);
        }
        if format_version >= FormatVersion::V3 {
            header.archive_size = reader.read_u64::<LittleEndian>()?;
        }

        Ok(header)
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> usize {
        crate::calculate_sector_size(self.block_size)
    }
}

/// Find the MPQ header in a file.
///
/// Candidates are checked at every 512-byte boundary. Returns the absolute
/// offset of the archive header (which every table offset is relative to),
/// the user data header when one led there, and the parsed header.
pub fn find_header<R: Read + Seek>(
    reader: &mut R,
    force_version1: bool,
) -> Result<(u64, Option<UserDataHeader>, MpqHeader)> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    let mut offset = 0u64;

    while offset < file_size {
        reader.seek(SeekFrom::Start(offset))?;

        let signature = match reader.read_u32::<LittleEndian>() {
            Ok(sig) => sig,
            Err(_) => break,
        };

        match signature {
            MPQ_ARCHIVE => {
                reader.seek(SeekFrom::Start(offset))?;
                let header = MpqHeader::read(reader, force_version1)?;
                log::debug!(
                    "MPQ header at 0x{offset:X}: v{} sector size {}",
                    header.format_version.number(),
                    header.sector_size()
                );
                return Ok((offset, None, header));
            }
            MPQ_USERDATA => {
                let user_data = UserDataHeader {
                    user_data_size: reader.read_u32::<LittleEndian>()?,
                    header_offset: reader.read_u32::<LittleEndian>()?,
                    user_data_header_size: reader.read_u32::<LittleEndian>()?,
                };

                let mpq_offset = offset + u64::from(user_data.header_offset);
                if mpq_offset + 4 <= file_size {
                    reader.seek(SeekFrom::Start(mpq_offset))?;
                    if reader.read_u32::<LittleEndian>()? == MPQ_ARCHIVE {
                        reader.seek(SeekFrom::Start(mpq_offset))?;
                        let header = MpqHeader::read(reader, force_version1)?;
                        log::debug!("MPQ header at 0x{mpq_offset:X} behind user data");
                        return Ok((mpq_offset, Some(user_data), header));
                    }
                }
            }
            _ => {}
        }

        offset += HEADER_ALIGNMENT;
    }

    Err(Error::invalid_format("No MPQ header found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::{Cursor, Write};

    fn v1_header(block_size: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.write_u32::<LittleEndian>(MPQ_ARCHIVE).unwrap();
        data.write_u32::<LittleEndian>(0x20).unwrap();
        data.write_u32::<LittleEndian>(0x1000).unwrap();
        data.write_u16::<LittleEndian>(0).unwrap();
        data.write_u16::<LittleEndian>(block_size).unwrap();
        data.write_u32::<LittleEndian>(0x20).unwrap();
        data.write_u32::<LittleEndian>(0x120).unwrap();
        data.write_u32::<LittleEndian>(16).unwrap();
        data.write_u32::<LittleEndian>(4).unwrap();
        data
    }

    #[test]
    fn test_read_v1_header() {
        let data = v1_header(3);
        let header = MpqHeader::read(&mut Cursor::new(data), false).unwrap();
        assert_eq!(header.format_version, FormatVersion::V1);
        assert_eq!(header.sector_size(), 4096);
        assert_eq!(header.hash_table_pos, 0x20);
        assert_eq!(header.hash_table_size, 16);
        assert!(header.hi_block_table_pos.is_none());
    }

    #[test]
    fn test_find_header_at_alignment() {
        let mut data = vec![0u8; 0x400];
        data.extend(v1_header(3));
        let (offset, user_data, header) = find_header(&mut Cursor::new(data), false).unwrap();
        assert_eq!(offset, 0x400);
        assert!(user_data.is_none());
        assert_eq!(header.block_table_size, 4);
    }

    #[test]
    fn test_find_header_through_user_data() {
        let mut data = Vec::new();
        data.write_u32::<LittleEndian>(MPQ_USERDATA).unwrap();
        data.write_u32::<LittleEndian>(0x100).unwrap();
        data.write_u32::<LittleEndian>(0x200).unwrap();
        data.write_u32::<LittleEndian>(0x10).unwrap();
        data.resize(0x200, 0);
        data.extend(v1_header(0));

        let (offset, user_data, _) = find_header(&mut Cursor::new(data), false).unwrap();
        assert_eq!(offset, 0x200);
        assert_eq!(user_data.unwrap().header_offset, 0x200);
    }

    #[test]
    fn test_no_header() {
        let data = vec![0u8; 2048];
        let err = find_header(&mut Cursor::new(data), false).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_force_version1_ignores_extended_fields() {
        let mut data = v1_header(3);
        // Claim v2 with a v2 header size but no extended fields behind it
        data[4..8].copy_from_slice(&0x2Cu32.to_le_bytes());
        data[12..14].copy_from_slice(&1u16.to_le_bytes());

        assert!(MpqHeader::read(&mut Cursor::new(data.clone()), false).is_err());

        let header = MpqHeader::read(&mut Cursor::new(data), true).unwrap();
        assert_eq!(header.format_version, FormatVersion::V1);
        assert!(header.hi_block_table_pos.is_none());
    }

    #[test]
    fn test_unsupported_version() {
        let mut data = v1_header(3);
        data[12..14].copy_from_slice(&7u16.to_le_bytes());
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_all(&data).unwrap();
        cursor.set_position(0);
        assert!(matches!(
            MpqHeader::read(&mut cursor, false),
            Err(Error::UnsupportedVersion(7))
        ));
    }
}
