//! Static tables shared by hashing and encryption

/// The MPQ encryption table, generated at compile time.
pub static ENCRYPTION_TABLE: [u32; 0x500] = generate_encryption_table();

/// ASCII uppercase table used when hashing names.
pub static ASCII_TO_UPPER: [u8; 256] = generate_upper_table();

const fn generate_encryption_table() -> [u32; 0x500] {
    let mut table = [0u32; 0x500];
    let mut seed: u32 = 0x0010_0001;

    let mut index1 = 0;
    while index1 < 0x100 {
        let mut index2 = index1;
        let mut i = 0;
        while i < 5 {
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let temp1 = (seed & 0xFFFF) << 0x10;

            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let temp2 = seed & 0xFFFF;

            table[index2] = temp1 | temp2;
            index2 += 0x100;
            i += 1;
        }
        index1 += 1;
    }

    table
}

const fn generate_upper_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).to_ascii_uppercase();
        i += 1;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_table_known_values() {
        // First entries of the StormLib table
        assert_eq!(ENCRYPTION_TABLE[0], 0x55C6_36E2);
        assert_eq!(ENCRYPTION_TABLE[1], 0x02BE_0170);
        assert_eq!(ENCRYPTION_TABLE[0x100], 0x76F8_C1B1);
    }

    #[test]
    fn test_upper_table() {
        assert_eq!(ASCII_TO_UPPER[b'a' as usize], b'A');
        assert_eq!(ASCII_TO_UPPER[b'\\' as usize], b'\\');
        assert_eq!(ASCII_TO_UPPER[0xE9], 0xE9);
    }
}
