//! Test utilities for MPQ archives
//!
//! The engine only reads archives. Tests in this workspace need small,
//! fully controlled archives to read, so this module carries a minimal
//! version 1 writer ([`TestArchiveBuilder`]) and helpers producing `PTCH`
//! payloads for incremental patch members.
//!
//! Enabled for this crate's own tests and, through the `test-utils`
//! feature, for the tests of dependent crates.

mod builder;

pub use builder::{TestArchiveBuilder, TestFile};

use crate::patch::PatchHeader;
use md5::{Digest, Md5};

const PTCH_SIGNATURE: u32 = 0x4843_5450;
const MD5_SIGNATURE: u32 = 0x5f35_444d;
const XFRM_SIGNATURE: u32 = 0x4d52_4658;
const COPY_TYPE: u32 = 0x5950_4f43;
const BSD0_TYPE: u32 = 0x3044_5342;

fn ptch(before: &[u8], after: &[u8], patch_type: u32, unpacked: usize, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(PatchHeader::HEADER_SIZE + payload.len());
    data.extend_from_slice(&PTCH_SIGNATURE.to_le_bytes());
    data.extend_from_slice(&((PatchHeader::HEADER_SIZE + unpacked) as u32).to_le_bytes());
    data.extend_from_slice(&(before.len() as u32).to_le_bytes());
    data.extend_from_slice(&(after.len() as u32).to_le_bytes());

    data.extend_from_slice(&MD5_SIGNATURE.to_le_bytes());
    data.extend_from_slice(&40u32.to_le_bytes());
    data.extend_from_slice(&Md5::digest(before));
    data.extend_from_slice(&Md5::digest(after));

    data.extend_from_slice(&XFRM_SIGNATURE.to_le_bytes());
    data.extend_from_slice(&((12 + payload.len()) as u32).to_le_bytes());
    data.extend_from_slice(&patch_type.to_le_bytes());
    data.extend_from_slice(payload);
    data
}

/// `PTCH` payload that replaces `before` with `after`
pub fn copy_patch(before: &[u8], after: &[u8]) -> Vec<u8> {
    ptch(before, after, COPY_TYPE, after.len(), after)
}

/// `PTCH` payload turning `before` into `after` through a BSD0 delta.
///
/// The delta is the simplest valid bsdiff40 stream: one control entry that
/// adds over the common length and copies the rest from the extra block.
/// It is RLE packed when that makes it smaller.
pub fn bsd0_patch(before: &[u8], after: &[u8]) -> Vec<u8> {
    let common = before.len().min(after.len());
    let diff: Vec<u8> = after[..common]
        .iter()
        .zip(before)
        .map(|(new, old)| new.wrapping_sub(*old))
        .collect();
    let extra = &after[common..];

    let mut stream = Vec::new();
    stream.extend_from_slice(&0x3034_4646_4944_5342u64.to_le_bytes());
    stream.extend_from_slice(&12u64.to_le_bytes());
    stream.extend_from_slice(&(diff.len() as u64).to_le_bytes());
    stream.extend_from_slice(&(after.len() as u64).to_le_bytes());
    stream.extend_from_slice(&(common as u32).to_le_bytes());
    stream.extend_from_slice(&(extra.len() as u32).to_le_bytes());
    stream.extend_from_slice(&0u32.to_le_bytes());
    stream.extend_from_slice(&diff);
    stream.extend_from_slice(extra);

    let packed = pack_rle(&stream);
    if packed.len() < stream.len() {
        ptch(before, after, BSD0_TYPE, stream.len(), &packed)
    } else {
        ptch(before, after, BSD0_TYPE, stream.len(), &stream)
    }
}

/// RLE packing understood by the BSD0 decoder: zero runs become one skip
/// byte, everything else goes out as literal runs of up to 128 bytes.
fn pack_rle(data: &[u8]) -> Vec<u8> {
    let mut out = (data.len() as u32).to_le_bytes().to_vec();
    let mut pos = 0;

    while pos < data.len() {
        let zeros = data[pos..].iter().take(128).take_while(|&&b| b == 0).count();
        if zeros > 0 {
            out.push((zeros - 1) as u8);
            pos += zeros;
            continue;
        }
        let literals = data[pos..]
            .iter()
            .take(128)
            .take_while(|&&b| b != 0)
            .count();
        out.push(0x80 | (literals - 1) as u8);
        out.extend_from_slice(&data[pos..pos + literals]);
        pos += literals;
    }

    out
}
