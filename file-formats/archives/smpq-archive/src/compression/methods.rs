//! Sector compression method byte

/// Bits of the method byte that starts every compressed sector
pub mod flags {
    pub const HUFFMAN: u8 = 0x01;
    pub const ZLIB: u8 = 0x02;
    /// PKWare DCL implode
    pub const PKWARE: u8 = 0x08;
    pub const BZIP2: u8 = 0x10;
    /// Run-length zero filling
    pub const SPARSE: u8 = 0x20;
    pub const ADPCM_MONO: u8 = 0x40;
    pub const ADPCM_STEREO: u8 = 0x80;
    /// A value rather than a bit, it overlaps `ZLIB | BZIP2`
    pub const LZMA: u8 = 0x12;

    /// Bits this crate can undo when they are stacked
    pub const STACKABLE: u8 = ZLIB | PKWARE | BZIP2 | SPARSE;
}

/// How the payload of a sector was packed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    None,
    Zlib,
    PKWare,
    BZip2,
    Sparse,
    Lzma,
    /// Several [`flags::STACKABLE`] bits at once
    Stacked(u8),
    /// Audio codecs and unknown bits
    Unsupported(u8),
}

impl CompressionMethod {
    /// Classify a sector's method byte
    pub fn from_flags(method: u8) -> Self {
        match method {
            0 => Self::None,
            flags::ZLIB => Self::Zlib,
            flags::PKWARE => Self::PKWare,
            flags::BZIP2 => Self::BZip2,
            flags::SPARSE => Self::Sparse,
            flags::LZMA => Self::Lzma,
            m if m & !flags::STACKABLE == 0 => Self::Stacked(m),
            m => Self::Unsupported(m),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}
