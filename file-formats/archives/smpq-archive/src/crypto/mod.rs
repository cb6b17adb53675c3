//! Cryptographic operations for MPQ files
//!
//! MPQ uses one 0x500-entry table for both name hashing and the stream
//! cipher that protects the hash table, the block table and encrypted
//! members. Both are provided here:
//!
//! ```
//! use smpq_archive::crypto::{hash_string, hash_type};
//!
//! let offset = hash_string("(listfile)", hash_type::TABLE_OFFSET);
//! assert_eq!(offset, 0x5F3D_E859);
//! ```

mod cipher;
mod hash;
mod keys;

pub use cipher::{decrypt_block, decrypt_bytes, decrypt_dword, encrypt_block, encrypt_bytes};
pub use hash::{file_key, hash_string, hash_type};
pub use keys::{ASCII_TO_UPPER, ENCRYPTION_TABLE};
