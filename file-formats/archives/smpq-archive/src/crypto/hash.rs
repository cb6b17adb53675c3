//! Hash algorithms for MPQ file name hashing

use super::keys::{ASCII_TO_UPPER, ENCRYPTION_TABLE};

/// Seed selectors for [`hash_string`]
///
/// A name is hashed three times: once to pick its hash table slot and twice
/// more to produce the check values stored in the entry.
pub mod hash_type {
    /// Starting slot in the hash table
    pub const TABLE_OFFSET: u32 = 0;
    /// First check value
    pub const NAME_A: u32 = 1;
    /// Second check value
    pub const NAME_B: u32 = 2;
    /// Encryption key of a member or table
    pub const FILE_KEY: u32 = 3;
}

/// Hash a string using the MPQ hash algorithm
///
/// Forward slashes hash like backslashes and ASCII letters are folded to
/// upper case, so `a/b.txt` and `A\B.TXT` share a hash.
pub fn hash_string(filename: &str, hash_type: u32) -> u32 {
    let mut seed1: u32 = 0x7FED_7FED;
    let mut seed2: u32 = 0xEEEE_EEEE;

    for &byte in filename.as_bytes() {
        let ch = if byte == b'/' {
            b'\\'
        } else {
            ASCII_TO_UPPER[byte as usize]
        };

        let table_idx = (hash_type * 0x100 + u32::from(ch)) as usize;
        seed1 = ENCRYPTION_TABLE[table_idx] ^ seed1.wrapping_add(seed2);
        seed2 = u32::from(ch)
            .wrapping_add(seed1)
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
    }

    seed1
}

/// Compute the encryption key of a member.
///
/// The key is derived from the base name only (the part after the last
/// path separator). With `FIX_KEY` the key is additionally mixed with the
/// block position relative to the archive start and the unpacked size.
pub fn file_key(filename: &str, block_pos: u32, file_size: u32, fix_key: bool) -> u32 {
    let base = filename
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or(filename);

    let key = hash_string(base, hash_type::FILE_KEY);
    if fix_key {
        key.wrapping_add(block_pos) ^ file_size
    } else {
        key
    }
}
