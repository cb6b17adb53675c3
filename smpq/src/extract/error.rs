//! Error types for extraction runs

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure that ends a whole run
#[derive(Error, Debug)]
pub enum FatalError {
    /// The base archive could not be opened
    #[error("Cannot open archive `{}': {source}", path.display())]
    OpenArchive {
        /// Path of the base archive
        path: PathBuf,
        /// Engine failure
        source: smpq_archive::Error,
    },

    /// A patch archive could not be layered onto the base
    #[error("Cannot open patched archive `{}': {source}", path.display())]
    ApplyPatch {
        /// Path of the patch archive
        path: PathBuf,
        /// Engine failure
        source: smpq_archive::Error,
    },

    /// A member could not be renamed
    #[error("Cannot rename file `{name}': {source}")]
    Rename {
        /// Name of the member in the archive
        name: String,
        source: smpq_archive::Error,
    },

    /// Edited tables could not be written back
    #[error("Cannot write archive `{}': {source}", path.display())]
    WriteArchive {
        path: PathBuf,
        source: smpq_archive::Error,
    },
}

/// Failure to create one level of a directory hierarchy
#[derive(Error, Debug)]
#[error("Cannot create directory `{}': {source}", path.display())]
pub struct DirError {
    /// Directory that could not be created
    pub path: PathBuf,
    /// Underlying failure
    pub source: io::Error,
}

/// Failure confined to a single member; the run continues
#[derive(Error, Debug)]
pub enum MemberError {
    #[error("reserved archive member")]
    Reserved,

    #[error("name is {0} bytes long")]
    PathTooLong(usize),

    #[error("name leaves the destination directory")]
    OutsideDestination,

    #[error("{0}")]
    Open(smpq_archive::Error),

    #[error(transparent)]
    CreateDir(DirError),

    #[error("File exists")]
    Exists,

    #[error("Is a directory")]
    IsDirectory,

    #[error("{0}")]
    Remove(io::Error),

    #[error("{0}")]
    Create(io::Error),

    #[error("{0}")]
    Read(io::Error),

    #[error("{0}")]
    Write(io::Error),

    #[error("{0}")]
    SetTime(io::Error),
}

impl MemberError {
    /// Report message naming the failed step
    pub fn message(&self) -> &'static str {
        match self {
            Self::Reserved => "Skip reserved file",
            Self::PathTooLong(_)
            | Self::OutsideDestination
            | Self::CreateDir(_)
            | Self::Exists
            | Self::IsDirectory => {
                "Cannot extract file"
            }
            Self::Open(_) => "Cannot open file in archive",
            Self::Remove(_) => "Cannot remove existing file",
            Self::Create(_) => "Cannot open file",
            Self::Read(_) => "Cannot read file",
            Self::Write(_) => "Cannot write file",
            Self::SetTime(_) => "Cannot set file time",
        }
    }

    /// Whether the report names the archive member rather than the host file
    pub fn concerns_member(&self) -> bool {
        matches!(self, Self::Open(_) | Self::Read(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_error_display() {
        let err = FatalError::OpenArchive {
            path: PathBuf::from("art.MPQ"),
            source: smpq_archive::Error::invalid_format("no header"),
        };
        assert_eq!(
            err.to_string(),
            "Cannot open archive `art.MPQ': Invalid MPQ format: no header"
        );
    }

    #[test]
    fn test_member_error_messages() {
        assert_eq!(MemberError::Exists.message(), "Cannot extract file");
        assert_eq!(MemberError::Exists.to_string(), "File exists");
        assert!(MemberError::Read(io::Error::other("bad sector")).concerns_member());
        assert!(!MemberError::Write(io::Error::other("disk full")).concerns_member());

        let err = MemberError::CreateDir(DirError {
            path: PathBuf::from("a/b"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        });
        assert!(err.to_string().starts_with("Cannot create directory `a/b'"));
    }
}
