//! # smpq_archive - MPQ archive engine
//!
//! The archive engine behind the `smpq` extraction tool. It opens MPQ
//! archives (format versions 1 through 4), layers patch archives on top of a
//! base archive and streams member data one sector at a time.
//!
//! ## Features
//!
//! - Header discovery at 512-byte alignment, including user-data headers
//! - Classic hash/block table lookup with explicit locale selection
//! - Streamed sector decoding with decryption, sector checksums and
//!   zlib/bzip2/LZMA/sparse/PKWARE decompression
//! - Ordered patch chains with per-layer path prefixes, deletion markers and
//!   incremental (`PTCH`) patch members
//! - Listfile management and StormLib-style wildcard search
//! - In-place removal and renaming of members ([`MutableArchive`])
//!
//! ## Examples
//!
//! ```no_run
//! use smpq_archive::{OpenOptions, PatchChain};
//! use std::io::Read;
//!
//! # fn main() -> Result<(), smpq_archive::Error> {
//! let mut chain = PatchChain::open("base.mpq", &OpenOptions::new())?;
//! chain.apply_patch("patch.mpq", "")?;
//! chain.add_listfile(None)?;
//!
//! if let Some(mut cursor) = chain.find("*.txt", None, 0)? {
//!     while let Some(record) = cursor.next_record() {
//!         let mut member = chain.open_member(&record.name, 0)?;
//!         let mut data = Vec::new();
//!         member.read_to_end(&mut data)?;
//!         println!("{} ({} bytes)", record.name, data.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod archive;
pub mod compression;
pub mod crypto;
pub mod error;
pub mod filetime;
pub mod find;
pub mod header;
pub mod modification;
pub mod patch;
pub mod patch_chain;
pub mod path;
pub mod special_files;
pub mod tables;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use archive::{Archive, FileInfo, MemberReader, OpenOptions};
pub use error::{Error, Result};
pub use find::{FindCursor, FindRecord, wildcard_match};
pub use header::{FormatVersion, MpqHeader};
pub use modification::MutableArchive;
pub use patch_chain::{ChainInfo, Member, PatchChain};
pub use tables::{BlockEntry, BlockFlags, BlockTable, HashEntry, HashTable};

pub use crypto::{decrypt_block, decrypt_dword, encrypt_block, hash_string, hash_type};

/// Magic numbers, read as little-endian `u32`
pub mod signatures {
    /// `MPQ\x1A`, the archive header
    pub const MPQ_ARCHIVE: u32 = u32::from_le_bytes(*b"MPQ\x1A");
    /// `MPQ\x1B`, a user-data header pointing at the archive header
    pub const MPQ_USERDATA: u32 = u32::from_le_bytes(*b"MPQ\x1B");
    /// `PTCH`, start of an incremental patch member
    pub const PATCH_MEMBER: u32 = u32::from_le_bytes(*b"PTCH");
}

/// Sector size for a header's block size shift
pub fn calculate_sector_size(block_size_shift: u16) -> usize {
    512usize << block_size_shift
}
