//! Incremental patch members (`PTCH`)
//!
//! A patch member does not carry file content. It carries a transform
//! that turns the same-named member of a lower layer into the new content:
//!
//! - `COPY`: the payload is the new file
//! - `BSD0`: an RLE-packed bsdiff40 stream applied to the old file
//!
//! Both sides are guarded by the MD5 hashes in the `MD5_` block.

use crate::signatures::PATCH_MEMBER;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use md5::{Digest, Md5};
use std::io::{Cursor, Read};

/// Magic signature for MD5 block ('MD5_')
const MD5_SIGNATURE: u32 = 0x5f35_444d;

/// Magic signature for XFRM block ('XFRM')
const XFRM_SIGNATURE: u32 = 0x4d52_4658;

/// Magic signature of a bsdiff40 stream ('BSDIFF40')
const BSDIFF40_SIGNATURE: u64 = 0x3034_4646_4944_5342;

/// Patch transform type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchType {
    /// Payload replaces the file
    Copy,
    /// Payload is a bsdiff40 delta
    Bsd0,
}

impl PatchType {
    /// Parse patch type from its magic value
    fn from_magic(magic: u32) -> Result<Self> {
        match magic {
            0x5950_4f43 => Ok(Self::Copy), // 'COPY'
            0x3044_5342 => Ok(Self::Bsd0), // 'BSD0'
            _ => Err(Error::patch(format!("Unknown patch type: 0x{magic:08X}"))),
        }
    }

    /// Magic value for this patch type
    pub fn to_magic(self) -> u32 {
        match self {
            Self::Copy => 0x5950_4f43,
            Self::Bsd0 => 0x3044_5342,
        }
    }
}

/// Headers of a patch member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchHeader {
    /// Size of the whole patch once unpacked, headers included
    pub patch_data_size: u32,
    /// Size of the file the patch applies to
    pub size_before: u32,
    /// Size of the patched file
    pub size_after: u32,
    /// MD5 of the file the patch applies to
    pub md5_before: [u8; 16],
    /// MD5 of the patched file
    pub md5_after: [u8; 16],
    /// Transform type
    pub patch_type: PatchType,
    /// Size of the XFRM payload (block size minus its 12-byte header)
    pub xfrm_data_size: u32,
}

impl PatchHeader {
    /// Size of the PTCH, MD5_ and XFRM headers together
    pub const HEADER_SIZE: usize = 16 + 40 + 12;

    /// Read just the leading 16 bytes: signature and the three sizes.
    ///
    /// Enough to learn the patched size without reading the payload.
    pub fn read_sizes<R: Read>(reader: &mut R) -> Result<(u32, u32, u32)> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != PATCH_MEMBER {
            return Err(Error::patch(format!(
                "Invalid PTCH signature: 0x{signature:08X}"
            )));
        }
        Ok((
            reader.read_u32::<LittleEndian>()?,
            reader.read_u32::<LittleEndian>()?,
            reader.read_u32::<LittleEndian>()?,
        ))
    }

    /// Parse the PTCH, MD5_ and XFRM headers
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let (patch_data_size, size_before, size_after) = Self::read_sizes(reader)?;

        let md5_sig = reader.read_u32::<LittleEndian>()?;
        let md5_block_size = reader.read_u32::<LittleEndian>()?;
        if md5_sig != MD5_SIGNATURE || md5_block_size != 40 {
            return Err(Error::patch("Missing or malformed MD5_ block"));
        }

        let mut md5_before = [0u8; 16];
        reader.read_exact(&mut md5_before)?;
        let mut md5_after = [0u8; 16];
        reader.read_exact(&mut md5_after)?;

        let xfrm_sig = reader.read_u32::<LittleEndian>()?;
        if xfrm_sig != XFRM_SIGNATURE {
            return Err(Error::patch(format!(
                "Invalid XFRM signature: 0x{xfrm_sig:08X}"
            )));
        }
        let xfrm_block_size = reader.read_u32::<LittleEndian>()?;
        let patch_type = PatchType::from_magic(reader.read_u32::<LittleEndian>()?)?;

        log::debug!(
            "PTCH {patch_type:?}: {size_before} -> {size_after} bytes, md5 {} -> {}",
            hex::encode(md5_before),
            hex::encode(md5_after)
        );

        Ok(Self {
            patch_data_size,
            size_before,
            size_after,
            md5_before,
            md5_after,
            patch_type,
            xfrm_data_size: xfrm_block_size.saturating_sub(12),
        })
    }
}

/// Parsed patch member
#[derive(Debug, Clone)]
pub struct PatchFile {
    /// Headers
    pub header: PatchHeader,
    /// XFRM payload as stored
    pub data: Vec<u8>,
}

impl PatchFile {
    /// Parse a complete decoded patch member
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < PatchHeader::HEADER_SIZE {
            return Err(Error::patch(format!(
                "Patch member too small: {} bytes",
                data.len()
            )));
        }

        let mut reader = Cursor::new(data);
        let header = PatchHeader::parse(&mut reader)?;

        let payload = &data[PatchHeader::HEADER_SIZE..];
        let len = (header.xfrm_data_size as usize).min(payload.len());

        Ok(Self {
            data: payload[..len].to_vec(),
            header,
        })
    }

    /// Apply the patch to `base`, checking both MD5 hashes
    pub fn apply(&self, base: &[u8]) -> Result<Vec<u8>> {
        verify_md5(base, &self.header.md5_before, "base")?;

        let patched = match self.header.patch_type {
            PatchType::Copy => self.data.clone(),
            PatchType::Bsd0 => self.apply_bsd0(base)?,
        };

        if patched.len() != self.header.size_after as usize {
            return Err(Error::patch(format!(
                "Patched size {} differs from the recorded {}",
                patched.len(),
                self.header.size_after
            )));
        }
        verify_md5(&patched, &self.header.md5_after, "patched")?;

        Ok(patched)
    }

    fn apply_bsd0(&self, base: &[u8]) -> Result<Vec<u8>> {
        let unpacked_size =
            (self.header.patch_data_size as usize).saturating_sub(PatchHeader::HEADER_SIZE);

        let stream = if self.data.len() < unpacked_size {
            unpack_rle(&self.data, unpacked_size)
        } else {
            self.data.clone()
        };

        apply_bsdiff40(&stream, base)
    }
}

fn verify_md5(data: &[u8], expected: &[u8; 16], what: &str) -> Result<()> {
    let actual = Md5::digest(data);
    if actual.as_slice() != expected {
        return Err(Error::patch(format!(
            "MD5 mismatch on {what} data: expected {}, got {}",
            hex::encode(expected),
            hex::encode(actual)
        )));
    }
    Ok(())
}

/// Unpack the RLE wrapping of a BSD0 payload.
///
/// The packed stream starts with a 4-byte size that is skipped. A control
/// byte with the high bit set is followed by `(b & 0x7F) + 1` literal bytes;
/// otherwise it skips `b + 1` output bytes, which stay zero.
fn unpack_rle(packed: &[u8], unpacked_size: usize) -> Vec<u8> {
    let mut out = vec![0u8; unpacked_size];
    let mut input = packed.iter().skip(4).copied();
    let mut pos = 0;

    while pos < unpacked_size {
        let Some(control) = input.next() else {
            break;
        };
        if control & 0x80 != 0 {
            for _ in 0..=(control & 0x7F) {
                let Some(byte) = input.next() else {
                    break;
                };
                if pos == unpacked_size {
                    break;
                }
                out[pos] = byte;
                pos += 1;
            }
        } else {
            pos += usize::from(control) + 1;
        }
    }

    out
}

/// Apply a bsdiff40 stream with 32-bit control words
fn apply_bsdiff40(stream: &[u8], old: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Cursor::new(stream);
    let signature = reader.read_u64::<LittleEndian>()?;
    if signature != BSDIFF40_SIGNATURE {
        return Err(Error::patch(format!(
            "Invalid BSDIFF40 signature: 0x{signature:016X}"
        )));
    }

    let ctrl_size = reader.read_u64::<LittleEndian>()? as usize;
    let data_size = reader.read_u64::<LittleEndian>()? as usize;
    let new_size = reader.read_u64::<LittleEndian>()? as usize;

    let ctrl_start = 32;
    let data_start = ctrl_start + ctrl_size;
    let extra_start = data_start + data_size;
    if extra_start > stream.len() {
        return Err(Error::patch(format!(
            "bsdiff stream truncated: need {extra_start} bytes, have {}",
            stream.len()
        )));
    }

    let mut ctrl = Cursor::new(&stream[ctrl_start..data_start]);
    let diff_block = &stream[data_start..extra_start];
    let extra_block = &stream[extra_start..];

    let mut new = vec![0u8; new_size];
    let mut new_pos = 0usize;
    let mut old_pos = 0usize;
    let mut diff_pos = 0usize;
    let mut extra_pos = 0usize;

    while new_pos < new_size {
        let add = ctrl.read_u32::<LittleEndian>()? as usize;
        let copy = ctrl.read_u32::<LittleEndian>()? as usize;
        let seek = ctrl.read_u32::<LittleEndian>()?;

        if new_pos + add > new_size || diff_pos + add > diff_block.len() {
            return Err(Error::patch("bsdiff add block out of range"));
        }
        for i in 0..add {
            let old_byte = old.get(old_pos + i).copied().unwrap_or(0);
            new[new_pos + i] = diff_block[diff_pos + i].wrapping_add(old_byte);
        }
        new_pos += add;
        old_pos += add;
        diff_pos += add;

        if new_pos + copy > new_size || extra_pos + copy > extra_block.len() {
            return Err(Error::patch("bsdiff extra block out of range"));
        }
        new[new_pos..new_pos + copy].copy_from_slice(&extra_block[extra_pos..extra_pos + copy]);
        new_pos += copy;
        extra_pos += copy;

        // sign and magnitude
        if seek & 0x8000_0000 != 0 {
            old_pos = old_pos.saturating_sub((seek & 0x7FFF_FFFF) as usize);
        } else {
            old_pos += seek as usize;
        }
    }

    Ok(new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{bsd0_patch, copy_patch};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_patch_type_magic() {
        assert_eq!(PatchType::from_magic(0x5950_4f43).unwrap(), PatchType::Copy);
        assert_eq!(PatchType::from_magic(0x3044_5342).unwrap(), PatchType::Bsd0);
        assert_eq!(PatchType::Bsd0.to_magic(), 0x3044_5342);
        assert!(PatchType::from_magic(0xDEAD_BEEF).is_err());
    }

    #[test]
    fn test_read_sizes() {
        let data = copy_patch(b"old", b"new content");
        let (_, before, after) = PatchHeader::read_sizes(&mut Cursor::new(&data)).unwrap();
        assert_eq!((before, after), (3, 11));
    }

    #[test]
    fn test_payload_starts_after_transform_type() {
        let patch = PatchFile::parse(&copy_patch(b"old", b"NEWDATA")).unwrap();
        assert_eq!(patch.data, b"NEWDATA");
        assert_eq!(patch.header.xfrm_data_size, 7);
        assert_eq!(
            patch.header.patch_data_size as usize,
            PatchHeader::HEADER_SIZE + 7
        );
    }

    #[test]
    fn test_apply_copy() {
        let patch = PatchFile::parse(&copy_patch(b"old bytes", b"brand new bytes")).unwrap();
        assert_eq!(patch.header.patch_type, PatchType::Copy);
        assert_eq!(patch.apply(b"old bytes").unwrap(), b"brand new bytes");
    }

    #[test]
    fn test_apply_bsd0() {
        let old = b"The quick brown fox jumps over the lazy dog".to_vec();
        let new = b"The quick red fox jumps over the lazy cat, twice".to_vec();
        let patch = PatchFile::parse(&bsd0_patch(&old, &new)).unwrap();
        assert_eq!(patch.header.patch_type, PatchType::Bsd0);
        assert_eq!(patch.apply(&old).unwrap(), new);
    }

    #[test]
    fn test_base_md5_mismatch() {
        let patch = PatchFile::parse(&copy_patch(b"expected", b"new")).unwrap();
        let err = patch.apply(b"something else").unwrap_err();
        assert!(matches!(err, Error::Patch(_)));
    }

    #[test]
    fn test_unpack_rle() {
        // size header, 2 literals, skip 3, 1 literal
        let packed = [0, 0, 0, 0, 0x81, 7, 8, 0x02, 0x80, 9];
        assert_eq!(unpack_rle(&packed, 8), vec![7, 8, 0, 0, 0, 9, 0, 0]);
    }

    #[test]
    fn test_bsdiff_backward_seek() {
        let old = b"abcdef";
        let mut stream = Vec::new();
        stream.extend_from_slice(&BSDIFF40_SIGNATURE.to_le_bytes());
        stream.extend_from_slice(&24u64.to_le_bytes());
        stream.extend_from_slice(&6u64.to_le_bytes());
        stream.extend_from_slice(&6u64.to_le_bytes());
        // copy "abc", then seek back 3 and copy "abc" again
        for word in [3u32, 0, 0x8000_0000 + 3, 3, 0, 0] {
            stream.extend_from_slice(&word.to_le_bytes());
        }
        stream.extend_from_slice(&[0; 6]);
        assert_eq!(apply_bsdiff40(&stream, old).unwrap(), b"abcabc");
    }
}
