//! Patch chain setup and mask resolution

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use smpq_archive::path::to_archive_path;
use smpq_archive::{FindCursor, FindRecord, PatchChain};

use super::error::FatalError;
use super::options::ExtractOptions;
use crate::listfiles;
use crate::report::Reporter;

/// One patch archive layered onto the base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSpec {
    /// Subtree of the base the patch applies to, empty for all of it
    pub prefix: String,
    /// Patch archive on the host
    pub archive: PathBuf,
}

impl PatchSpec {
    /// Parse `[prefix:]archive`, splitting on the first colon
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(':') {
            Some((prefix, archive)) => Self {
                prefix: prefix.to_string(),
                archive: PathBuf::from(archive),
            },
            None => Self {
                prefix: String::new(),
                archive: PathBuf::from(spec),
            },
        }
    }
}

impl FromStr for PatchSpec {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Open `archive` and layer `patches` on top of it, in order.
///
/// The first patch that fails aborts the run; the partially built chain is
/// dropped before the error is returned.
pub fn open_chain(
    archive: &Path,
    patches: &[PatchSpec],
    options: &ExtractOptions,
    reporter: &Reporter,
) -> Result<PatchChain, FatalError> {
    let label = archive.display().to_string();

    let mut chain = match PatchChain::open(archive, &options.open_options()) {
        Ok(chain) => chain,
        Err(source) => {
            reporter.error(&label, "Cannot open archive", &label, &source);
            return Err(FatalError::OpenArchive {
                path: archive.to_path_buf(),
                source,
            });
        }
    };

    for patch in patches {
        let patch_label = patch.archive.display().to_string();
        reporter.verbose(&label, "Opening patched archive", &patch_label);

        if let Err(source) = chain.apply_patch(&patch.archive, &patch.prefix) {
            reporter.error(&label, "Cannot open patched archive", &patch_label, &source);
            return Err(FatalError::ApplyPatch {
                path: patch.archive.clone(),
                source,
            });
        }
    }

    Ok(chain)
}

/// Merge system listfiles, then the archives' own listfiles.
///
/// A listfile that cannot be read is logged and skipped.
pub fn load_listfiles(
    chain: &mut PatchChain,
    label: &str,
    options: &ExtractOptions,
    reporter: &Reporter,
) {
    if !options.no_system_listfiles {
        let listfiles = options
            .system_listfile_dir
            .as_deref()
            .map(listfiles::system_listfiles)
            .unwrap_or_default();

        for listfile in listfiles {
            reporter.verbose(label, "Loading system listfile", &listfile.display().to_string());
            if let Err(e) = chain.add_listfile(Some(&listfile)) {
                log::warn!("Cannot load listfile {}: {e}", listfile.display());
            }
        }
    }

    if !options.no_archive_listfile {
        if let Err(e) = chain.add_listfile(None) {
            log::warn!("Cannot load archive listfile of {label}: {e}");
        }
    }
}

/// Members a mask stands for
#[derive(Debug)]
pub enum MaskResolution {
    /// The mask matched through a wildcard search
    Wildcard(FindCursor),
    /// Nothing matched; the mask is taken as a member name
    Literal(Option<FindRecord>),
}

impl MaskResolution {
    /// Resolution holding exactly `record`
    pub fn literal(record: FindRecord) -> Self {
        Self::Literal(Some(record))
    }
}

impl Iterator for MaskResolution {
    type Item = FindRecord;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Wildcard(cursor) => cursor.next_record(),
            Self::Literal(record) => record.take(),
        }
    }
}

/// Expand `mask` against `chain`.
///
/// A search that matches nothing falls back to `mask` as a literal name.
/// Its record carries the resolved size when the name exists (0 otherwise)
/// and no time stamp; opening it later reports whether it really exists.
pub fn resolve_mask(
    chain: &mut PatchChain,
    mask: &str,
    options: &ExtractOptions,
) -> smpq_archive::Result<MaskResolution> {
    let mask = to_archive_path(mask);

    if let Some(cursor) = chain.find(&mask, options.external_listfile.as_deref(), options.locale)? {
        return Ok(MaskResolution::Wildcard(cursor));
    }

    log::debug!("Mask '{mask}' matched nothing, trying it as a name");
    Ok(literal_resolution(chain, &mask, options))
}

/// Take `mask` as a member name without searching.
///
/// Used when a search matches nothing or cannot run at all.
pub fn literal_resolution(
    chain: &PatchChain,
    mask: &str,
    options: &ExtractOptions,
) -> MaskResolution {
    let name = to_archive_path(mask);
    let size = chain.file_size(&name, options.locale).unwrap_or(0);
    MaskResolution::literal(FindRecord {
        name,
        size,
        file_time: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_patch_spec_parse() {
        assert_eq!(
            PatchSpec::parse("patch.mpq"),
            PatchSpec {
                prefix: String::new(),
                archive: PathBuf::from("patch.mpq"),
            }
        );
        assert_eq!(
            "base:patch.mpq".parse::<PatchSpec>().unwrap(),
            PatchSpec {
                prefix: "base".to_string(),
                archive: PathBuf::from("patch.mpq"),
            }
        );
        assert_eq!(PatchSpec::parse("a:b:c.mpq").archive, PathBuf::from("b:c.mpq"));
        assert_eq!(PatchSpec::parse(":p.mpq").prefix, "");
    }

    #[test]
    fn test_literal_resolution_yields_once() {
        let mut resolution = MaskResolution::literal(FindRecord {
            name: "a.txt".to_string(),
            size: 3,
            file_time: 0,
        });
        assert_eq!(resolution.next().map(|r| r.name), Some("a.txt".to_string()));
        assert!(resolution.next().is_none());
    }
}
