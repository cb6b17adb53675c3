//! Compression and decompression for MPQ sectors
//!
//! A compressed sector starts with one method byte naming the codecs that
//! were stacked on it. Imploded members (`FLAG_IMPLODE`) carry no method
//! byte and go through [`explode`] instead.

mod algorithms;
mod compress;
mod decompress;
mod methods;

pub use compress::compress;
pub use decompress::{decompress, explode};
pub use methods::{CompressionMethod, flags};
