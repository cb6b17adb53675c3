//! Engine errors

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while reading archives and members
#[derive(Error, Debug)]
pub enum Error {
    /// Host I/O failure, shown as the operating system reports it
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Damaged or foreign data
    #[error("Invalid MPQ format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported MPQ version: {0}")]
    UnsupportedVersion(u16),

    /// Stream provider (`PART`, `MPQE`) without a reader
    #[error("Unsupported stream provider: {0}")]
    UnsupportedStream(&'static str),

    /// Name absent from the archive, or deleted by a patch
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Target name of a rename is taken
    #[error("File already exists: {0}")]
    FileExists(String),

    /// `(listfile)`, `(attributes)` and the like cannot be edited directly
    #[error("Cannot modify internal file: {0}")]
    InternalFile(String),

    #[error("Hash table error: {0}")]
    HashTable(String),

    #[error("Compression error: {0}")]
    Compression(String),

    /// Sector method byte with no decoder here
    #[error("Unsupported compression method 0x{0:02X}")]
    UnsupportedCompression(u8),

    /// `PTCH` member that cannot be applied
    #[error("Patch error: {0}")]
    Patch(String),

    /// Sector whose Adler-32 does not match the stored checksum
    #[error("Checksum mismatch for {file}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Member name and sector number
        file: String,
        expected: u32,
        actual: u32,
    },
}

impl Error {
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    pub fn compression(msg: impl Into<String>) -> Self {
        Self::Compression(msg.into())
    }

    pub fn hash_table(msg: impl Into<String>) -> Self {
        Self::HashTable(msg.into())
    }

    pub fn patch(msg: impl Into<String>) -> Self {
        Self::Patch(msg.into())
    }

    /// Whether the archive itself is damaged
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat(_) | Self::HashTable(_) | Self::ChecksumMismatch { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_))
    }

    /// Undo the wrapping done by `From<Error> for io::Error`.
    ///
    /// Member readers implement [`io::Read`], so engine errors reach
    /// callers boxed inside an [`io::Error`].
    pub fn from_io(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<Self>()) {
            return Self::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Self>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => Self::Io(io::Error::new(kind, other)),
            None => Self::Io(io::Error::from(kind)),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::Io(inner) => return inner,
            Error::FileNotFound(_) => io::ErrorKind::NotFound,
            Error::FileExists(_) => io::ErrorKind::AlreadyExists,
            Error::UnsupportedCompression(_) | Error::UnsupportedStream(_) => {
                io::ErrorKind::Unsupported
            }
            _ => io::ErrorKind::InvalidData,
        };
        Self::new(kind, err)
    }
}
