//! Common utilities for MPQ tables

use crate::Result;
use crate::crypto::decrypt_bytes;
use std::io::{Read, Seek, SeekFrom};

/// Read `entry_count` 16-byte entries at `offset`, decrypting with `key`.
///
/// Tables that claim to run past `file_size` are cut at the end of the
/// file; the returned buffer then holds fewer whole entries than asked for.
pub(crate) fn read_table_bytes<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    entry_count: u32,
    file_size: u64,
    key: u32,
    what: &str,
) -> Result<Vec<u8>> {
    let wanted = u64::from(entry_count) * 16;
    let available = file_size.saturating_sub(offset);
    let byte_size = if wanted > available {
        let truncated = available - available % 16;
        log::warn!(
            "{what} claims {entry_count} entries but only {} fit in the file",
            truncated / 16
        );
        truncated
    } else {
        wanted
    };

    let mut data = vec![0u8; byte_size as usize];
    if !data.is_empty() {
        reader.seek(SeekFrom::Start(offset))?;
        reader.read_exact(&mut data)?;
        decrypt_bytes(&mut data, key);
    }

    log::debug!("Loaded {what}: {} entries at 0x{offset:X}", data.len() / 16);
    Ok(data)
}
