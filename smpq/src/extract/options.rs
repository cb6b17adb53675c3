//! Options of one extraction run

use std::path::{Path, PathBuf};

use smpq_archive::OpenOptions;

use crate::listfiles;

/// Immutable switches for [`run_extraction`](super::run_extraction)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Print one record per member instead of writing files
    pub list_only: bool,
    /// Replace existing regular files
    pub overwrite: bool,
    /// Print a status line before each action
    pub verbose: bool,
    /// Suppress error and status lines
    pub quiet: bool,
    /// Skip the listfiles in [`Self::system_listfile_dir`]
    pub no_system_listfiles: bool,
    /// Ignore the `(listfile)` members of the archives
    pub no_archive_listfile: bool,
    /// Ignore the `(attributes)` member
    pub no_attributes: bool,
    /// Parse every header as format version 1
    pub force_version1: bool,
    /// Verify sector checksums while reading
    pub sector_crc_check: bool,
    /// Archive uses the partial stream provider
    pub partial: bool,
    /// Archive uses the encrypted (MPQE) stream provider
    pub encrypted: bool,
    /// Listfile on the host merged before every search
    pub external_listfile: Option<PathBuf>,
    /// Directory holding system listfiles, `None` when the platform has none
    pub system_listfile_dir: Option<PathBuf>,
    /// Directory that extracted paths are resolved against
    pub destination: PathBuf,
    /// Locale used for every member lookup, 0 is neutral
    pub locale: u16,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            list_only: false,
            overwrite: false,
            verbose: false,
            quiet: false,
            no_system_listfiles: false,
            no_archive_listfile: false,
            no_attributes: false,
            force_version1: false,
            sector_crc_check: false,
            partial: false,
            encrypted: false,
            external_listfile: None,
            system_listfile_dir: listfiles::default_dir(),
            destination: PathBuf::from("."),
            locale: 0,
        }
    }
}

impl ExtractOptions {
    /// Engine options derived from these switches
    pub fn open_options(&self) -> OpenOptions {
        OpenOptions::new()
            .no_listfile(self.no_archive_listfile)
            .no_attributes(self.no_attributes)
            .force_version1(self.force_version1)
            .check_sector_crc(self.sector_crc_check)
            .partial(self.partial)
            .encrypted(self.encrypted)
    }

    /// Host path of a member, given its name in host form
    pub fn host_path(&self, relative: &str) -> PathBuf {
        if self.destination == Path::new(".") {
            PathBuf::from(relative)
        } else {
            self.destination.join(relative)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_open_options() {
        let options = ExtractOptions {
            no_archive_listfile: true,
            sector_crc_check: true,
            encrypted: true,
            ..ExtractOptions::default()
        };
        assert_eq!(
            options.open_options(),
            OpenOptions::new()
                .no_listfile(true)
                .check_sector_crc(true)
                .encrypted(true)
        );
    }

    #[test]
    fn test_host_path() {
        let options = ExtractOptions::default();
        assert_eq!(options.host_path("a.txt"), PathBuf::from("a.txt"));

        let options = ExtractOptions {
            destination: PathBuf::from("out"),
            ..ExtractOptions::default()
        };
        assert_eq!(options.host_path("a.txt"), Path::new("out").join("a.txt"));
    }
}
