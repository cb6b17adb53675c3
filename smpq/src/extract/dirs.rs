//! Directory materialization
//!
//! Archive names are flat strings; the directories they imply are created
//! on demand before a member is written.

use std::fs;
use std::io;
use std::path::Path;

use super::error::DirError;

/// Make sure `path` and all of its ancestors exist.
///
/// An empty path, `.` and the filesystem root succeed without touching
/// anything. An existing entry counts as success at every level. On
/// failure the returned error names the first level that could not be
/// created; the levels above it are left in place.
pub fn ensure_dir(path: &Path) -> Result<(), DirError> {
    if path.as_os_str().is_empty() || path == Path::new(".") {
        return Ok(());
    }
    let Some(parent) = path.parent() else {
        return Ok(());
    };

    ensure_dir(parent)?;

    match fs::create_dir(path) {
        Ok(()) => {
            log::debug!("Created directory {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(source) => Err(DirError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_trivial_paths() {
        ensure_dir(Path::new("")).unwrap();
        ensure_dir(Path::new(".")).unwrap();
        ensure_dir(Path::new("/")).unwrap();
    }

    #[test]
    fn test_creates_every_level() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("a").join("b").join("c");

        ensure_dir(&deep).unwrap();
        assert!(deep.is_dir());

        // Second run finds everything in place
        ensure_dir(&deep).unwrap();
    }

    #[test]
    fn test_failure_names_the_level() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("a");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = ensure_dir(&blocker.join("b").join("c")).unwrap_err();
        assert_eq!(err.path, blocker.join("b"));
    }
}
