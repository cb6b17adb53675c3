//! MPQ stream cipher
//!
//! Tables and encrypted members are processed as little-endian DWORDs. The
//! key stream depends on the key and on the plaintext seen so far, so the
//! two directions differ only in which word feeds the seed.

use super::keys::ENCRYPTION_TABLE;

const SEED: u32 = 0xEEEE_EEEE;

fn key_mix(key: u32) -> u32 {
    ENCRYPTION_TABLE[0x400 + (key & 0xFF) as usize]
}

fn apply(words: &mut [u32], mut key: u32, decrypting: bool) {
    if key == 0 {
        return;
    }
    let mut seed = SEED;
    for word in words {
        seed = seed.wrapping_add(key_mix(key));
        let input = *word;
        *word ^= key.wrapping_add(seed);
        let plain = if decrypting { *word } else { input };

        key = (!key << 21).wrapping_add(0x1111_1111) | (key >> 11);
        seed = plain
            .wrapping_add(seed)
            .wrapping_add(seed << 5)
            .wrapping_add(3);
    }
}

/// Run `apply` over the whole DWORDs of a byte buffer. A trailing partial
/// DWORD is stored in the clear and left untouched.
fn apply_bytes(data: &mut [u8], key: u32, decrypting: bool) {
    if key == 0 || data.len() < 4 {
        return;
    }
    let mut words: Vec<u32> = data
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    apply(&mut words, key, decrypting);
    for (chunk, word) in data.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

pub fn decrypt_block(data: &mut [u32], key: u32) {
    apply(data, key, true);
}

/// Only the test archive writer encrypts.
pub fn encrypt_block(data: &mut [u32], key: u32) {
    apply(data, key, false);
}

pub fn decrypt_bytes(data: &mut [u8], key: u32) {
    apply_bytes(data, key, true);
}

pub fn encrypt_bytes(data: &mut [u8], key: u32) {
    apply_bytes(data, key, false);
}

/// Decrypt the first DWORD of a stream on its own
pub fn decrypt_dword(value: u32, key: u32) -> u32 {
    if key == 0 {
        return value;
    }
    value ^ key.wrapping_add(SEED.wrapping_add(key_mix(key)))
}
