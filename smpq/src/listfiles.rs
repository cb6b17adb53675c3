//! System listfile discovery
//!
//! Listfiles shared by every archive live in one directory:
//! `/usr/share/stormlib` on Unix, the directory of the executable on
//! Windows. Every regular `.txt` file directly inside it is a listfile.

use std::fs;
use std::path::{Path, PathBuf};

#[cfg(not(windows))]
const SYSTEM_LISTFILE_DIR: &str = "/usr/share/stormlib";

/// Platform directory of system listfiles
#[cfg(not(windows))]
pub fn default_dir() -> Option<PathBuf> {
    Some(PathBuf::from(SYSTEM_LISTFILE_DIR))
}

/// Platform directory of system listfiles
#[cfg(windows)]
pub fn default_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Listfiles found in `dir`, sorted by path.
///
/// A missing or unreadable directory yields no listfiles.
pub fn system_listfiles(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        log::debug!("No system listfile directory at {}", dir.display());
        return Vec::new();
    };

    let mut listfiles: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_listfile_name(path) && path.is_file())
        .collect();
    listfiles.sort();
    listfiles
}

fn is_listfile_name(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}
