//! Path conversion between archive names and host paths
//!
//! MPQ member names use backslashes (`\`) as separators no matter which
//! system wrote them. Names coming from the command line are converted to
//! that form before lookup, and names going to disk are converted back to
//! the host form.
//!
//! ```
//! use smpq_archive::path::{from_archive_path, to_archive_path};
//!
//! assert_eq!(to_archive_path("dir/sub/file.txt"), "dir\\sub\\file.txt");
//!
//! #[cfg(unix)]
//! assert_eq!(from_archive_path("dir\\sub\\file.txt"), "dir/sub/file.txt");
//! ```

/// Convert a host path into the archive's canonical form
pub fn to_archive_path(path: &str) -> String {
    path.replace('/', "\\")
}

/// Convert an archive name into the host path form
///
/// On Windows this is the identity; elsewhere every backslash becomes the
/// native separator.
pub fn from_archive_path(path: &str) -> String {
    #[cfg(windows)]
    {
        path.to_string()
    }

    #[cfg(not(windows))]
    {
        path.replace('\\', std::path::MAIN_SEPARATOR_STR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_to_archive_path() {
        assert_eq!(to_archive_path("a/b/c.txt"), "a\\b\\c.txt");
        assert_eq!(to_archive_path("a\\b/c.txt"), "a\\b\\c.txt");
        assert_eq!(to_archive_path(""), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_from_archive_path() {
        assert_eq!(from_archive_path("a\\b\\c.txt"), "a/b/c.txt");
        assert_eq!(from_archive_path("plain.txt"), "plain.txt");
    }

    proptest! {
        #[test]
        fn host_paths_survive_archive_form(path in "[a-z0-9_./]{0,64}") {
            let native = path.replace('/', std::path::MAIN_SEPARATOR_STR);
            prop_assert_eq!(from_archive_path(&to_archive_path(&path)), native);
        }

        #[test]
        fn archive_form_has_no_forward_slash(path in "[a-zA-Z/\\\\]{0,64}") {
            prop_assert!(!to_archive_path(&path).contains('/'));
        }
    }
}
