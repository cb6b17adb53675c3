//! MPQ table structures (hash, block, hi-block)

mod block;
mod common;
mod hash;

pub use block::{BlockEntry, BlockFlags, BlockTable, HiBlockTable};
pub use hash::{HashEntry, HashTable, NameHash, Slot};

pub(crate) use common::read_table_bytes;
