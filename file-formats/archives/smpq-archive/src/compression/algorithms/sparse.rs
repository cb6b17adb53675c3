//! Sparse (zero run) compression, StormLib format
//!
//! The stream starts with the big-endian decoded size. A control byte with
//! the high bit set copies `(b & 0x7F) + 1` literal bytes; otherwise it
//! emits `(b & 0x7F) + 3` zero bytes.

use crate::{Error, Result};

/// Decompress sparse data
pub(crate) fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    if data.len() < 5 {
        return Err(Error::compression("Sparse data too small"));
    }

    let out_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if out_size > expected_size {
        return Err(Error::compression(format!(
            "Sparse size {out_size} exceeds expected size {expected_size}"
        )));
    }

    let mut output = Vec::with_capacity(out_size);
    let mut pos = 4;

    while pos < data.len() && output.len() < out_size {
        let control = data[pos];
        pos += 1;
        let remaining = out_size - output.len();

        if control & 0x80 != 0 {
            let chunk = (usize::from(control & 0x7F) + 1).min(remaining);
            let end = pos + chunk;
            if end > data.len() {
                return Err(Error::compression("Sparse literal run past end of data"));
            }
            output.extend_from_slice(&data[pos..end]);
            pos = end;
        } else {
            let chunk = (usize::from(control & 0x7F) + 3).min(remaining);
            output.resize(output.len() + chunk, 0);
        }
    }

    Ok(output)
}

/// Compress data into sparse format
pub(crate) fn compress(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len() + data.len() / 128 + 5);
    output.extend_from_slice(&(data.len() as u32).to_be_bytes());

    let mut pos = 0;
    while pos < data.len() {
        let zeros = data[pos..].iter().take_while(|&&b| b == 0).count();
        if zeros >= 3 {
            let run = zeros.min(0x7F + 3);
            output.push((run - 3) as u8);
            pos += run;
            continue;
        }

        // Literal run up to the next stretch of three zeros
        let mut end = pos;
        while end < data.len() && end - pos < 0x80 {
            if data[end..].starts_with(&[0, 0, 0]) {
                break;
            }
            end += 1;
        }
        output.push(0x80 | (end - pos - 1) as u8);
        output.extend_from_slice(&data[pos..end]);
        pos = end;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_known_stream() {
        // 4 zeros, "AB", 3 zeros
        let data = [0, 0, 0, 9, 0x01, 0x81, b'A', b'B', 0x00];
        assert_eq!(
            decompress(&data, 9).unwrap(),
            vec![0, 0, 0, 0, b'A', b'B', 0, 0, 0]
        );
    }

    #[test]
    fn test_stored_size_is_bounded() {
        let data = [0, 0, 1, 0, 0x7F];
        assert!(decompress(&data, 16).is_err());
    }

    #[test]
    fn test_mixed_data_roundtrip() {
        let mut raw = vec![0u8; 300];
        raw[0] = 1;
        raw[150..160].fill(7);
        raw.extend_from_slice(&[1, 0, 0, 2]);
        let packed = compress(&raw);
        assert!(packed.len() < raw.len());
        assert_eq!(decompress(&packed, raw.len()).unwrap(), raw);
    }
}
