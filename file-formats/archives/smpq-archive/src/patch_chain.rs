//! Base archive plus ordered patch layers
//!
//! A [`PatchChain`] owns the base archive and every patch archive layered
//! on top of it. Layers are kept in the order they were applied; later
//! layers shadow earlier ones. Each patch layer may be scoped to a path
//! prefix: member `N` of the base is shadowed by the patch member
//! `prefix + N`.
//!
//! # Examples
//!
//! ```no_run
//! use smpq_archive::{OpenOptions, PatchChain};
//!
//! let mut chain = PatchChain::open("art.MPQ", &OpenOptions::new())?;
//! chain.apply_patch("wow-update-13164.MPQ", "base")?;
//! chain.add_listfile(None)?;
//! println!("{} layers", chain.layer_count());
//! # Ok::<(), smpq_archive::Error>(())
//! ```

use crate::archive::{Archive, FileInfo, MemberReader, OpenOptions};
use crate::find::{FindCursor, FindRecord, wildcard_match};
use crate::patch::{PatchFile, PatchHeader};
use crate::path::to_archive_path;
use crate::special_files::{
    RESERVED_ATTRIBUTES, RESERVED_LISTFILE, RESERVED_SIGNATURE, parse_listfile, stub_name,
};
use crate::{Error, Result};
use std::collections::HashSet;
use std::io::{self, Cursor, Read};
use std::path::Path;

/// Members whose names are known without a listfile
const ENGINE_NAMES: [&str; 3] = [RESERVED_LISTFILE, RESERVED_ATTRIBUTES, RESERVED_SIGNATURE];

#[derive(Debug)]
struct Layer {
    archive: Archive,
    prefix: String,
}

/// Where a name resolves to across the layers
#[derive(Debug)]
struct Resolution {
    layer: usize,
    info: FileInfo,
    /// Incremental patches to apply on top, oldest first
    patches: Vec<(usize, FileInfo)>,
}

/// Summary of the base archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainInfo {
    /// Archive size recorded in the header
    pub archive_size: u64,
    /// MPQ format version number (1-4)
    pub format_version: u16,
    /// Block entries that hold a file
    pub file_count: usize,
    /// Hash table capacity
    pub max_file_count: usize,
    /// Hash table entries recorded in the header
    pub hash_table_size: u32,
    /// Block table entries recorded in the header
    pub block_table_size: u32,
    /// Sector size in bytes
    pub sector_size: usize,
    /// Partial stream provider in use
    pub partial: bool,
    /// Encrypted stream provider in use
    pub encrypted: bool,
    /// Archive carries a `(signature)` member
    pub has_signature: bool,
}

/// Open member of a patch chain
#[derive(Debug)]
pub enum Member {
    /// Streamed straight from one archive
    Stream(MemberReader),
    /// Rebuilt in memory from incremental patches
    Buffered(Cursor<Vec<u8>>),
}

impl Member {
    /// Decoded size of the member
    pub fn size(&self) -> u64 {
        match self {
            Self::Stream(reader) => reader.size(),
            Self::Buffered(cursor) => cursor.get_ref().len() as u64,
        }
    }
}

impl Read for Member {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Stream(reader) => reader.read(buf),
            Self::Buffered(cursor) => cursor.read(buf),
        }
    }
}

/// A base archive with zero or more patch archives layered on top
#[derive(Debug)]
pub struct PatchChain {
    layers: Vec<Layer>,
    options: OpenOptions,
    names: Vec<String>,
    known: HashSet<String>,
}

impl PatchChain {
    /// Open the base archive
    pub fn open<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self> {
        let archive = Archive::open(path, options)?;
        Ok(Self {
            layers: vec![Layer {
                archive,
                prefix: String::new(),
            }],
            options: options.clone(),
            names: Vec::new(),
            known: HashSet::new(),
        })
    }

    /// Layer a patch archive on top of the chain, scoped to `prefix`.
    ///
    /// An empty prefix patches the whole archive.
    pub fn apply_patch<P: AsRef<Path>>(&mut self, path: P, prefix: &str) -> Result<()> {
        let archive = Archive::open(path.as_ref(), &self.options)?;
        let prefix = normalize_prefix(prefix);
        log::debug!(
            "Layer {}: {} (prefix '{prefix}')",
            self.layers.len(),
            path.as_ref().display()
        );
        self.layers.push(Layer { archive, prefix });
        Ok(())
    }

    /// Number of layers including the base
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// The base archive
    pub fn base(&self) -> &Archive {
        &self.layers[0].archive
    }

    /// Normalised prefixes of every layer, base first
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|layer| layer.prefix.as_str())
    }

    /// Names known to the chain, in first-seen order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Merge names into the chain.
    ///
    /// `None` merges the embedded `(listfile)` of every layer; names in a
    /// patch layer are stripped of its prefix and ignored when outside it.
    /// The engine's own members are named too, whatever the listfile says.
    /// `Some(path)` merges a listfile from the host filesystem.
    pub fn add_listfile(&mut self, listfile: Option<&Path>) -> Result<()> {
        let mut collected = Vec::new();
        match listfile {
            Some(path) => {
                let data = std::fs::read(path)?;
                collected = parse_listfile(&data);
                log::debug!(
                    "Listfile {}: {} names",
                    path.display(),
                    collected.len()
                );
            }
            None => {
                for layer in &self.layers {
                    collected.extend(
                        ENGINE_NAMES
                            .iter()
                            .filter(|name| layer.archive.find_file(name, 0).is_some())
                            .map(ToString::to_string),
                    );
                    for name in layer.archive.listfile_names()? {
                        if let Some(stripped) = strip_prefix(&name, &layer.prefix) {
                            collected.push(stripped.to_string());
                        }
                    }
                }
            }
        }

        for name in collected {
            let name = to_archive_path(&name);
            if self.known.insert(name.to_ascii_uppercase()) {
                self.names.push(name);
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &str, locale: u16) -> Option<Resolution> {
        let mut patches = Vec::new();

        for (index, layer) in self.layers.iter().enumerate().rev() {
            let lookup = format!("{}{name}", layer.prefix);
            let Some(info) = layer.archive.find_file(&lookup, locale) else {
                continue;
            };

            if info.flags.is_delete_marker() {
                log::trace!("{name}: deleted in layer {index}");
                return None;
            }
            if info.flags.is_patch_file() {
                patches.push((index, info));
                continue;
            }

            patches.reverse();
            return Some(Resolution {
                layer: index,
                info,
                patches,
            });
        }

        None
    }

    /// Check whether `name` resolves to a member
    pub fn contains(&self, name: &str, locale: u16) -> bool {
        self.resolve(name, locale).is_some()
    }

    fn resolved_size(&self, resolution: &Resolution) -> Result<u64> {
        let Some((layer, info)) = resolution.patches.last() else {
            return Ok(resolution.info.file_size);
        };
        let mut reader = self.layers[*layer].archive.open_file(info)?;
        let (_, _, size_after) = PatchHeader::read_sizes(&mut reader)?;
        Ok(u64::from(size_after))
    }

    /// Size and time stamp reported for a resolved name
    fn summarize(&self, name: &str, resolution: &Resolution) -> (u64, u64) {
        let size = self.resolved_size(resolution).unwrap_or_else(|e| {
            log::warn!("{name}: cannot read patch header: {e}");
            resolution.info.file_size
        });
        (size, Self::resolved_time(resolution))
    }

    /// Decoded size of `name` as the chain resolves it, `None` when the
    /// name does not resolve
    pub fn file_size(&self, name: &str, locale: u16) -> Option<u64> {
        let resolution = self.resolve(name, locale)?;
        Some(self.summarize(name, &resolution).0)
    }

    fn resolved_time(resolution: &Resolution) -> u64 {
        resolution
            .patches
            .iter()
            .rev()
            .map(|(_, info)| info.file_time)
            .find(|&time| time != 0)
            .unwrap_or(resolution.info.file_time)
    }

    /// Open a member through the chain.
    ///
    /// Unpatched members stream straight from their layer. Members with
    /// incremental patches are rebuilt in memory, each patch applied in
    /// layer order on top of the full member below it.
    pub fn open_member(&self, name: &str, locale: u16) -> Result<Member> {
        let resolution = self
            .resolve(name, locale)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;

        let base = self.layers[resolution.layer].archive.open_file(&resolution.info)?;
        if resolution.patches.is_empty() {
            return Ok(Member::Stream(base));
        }

        let mut data = read_all(base)?;
        for (layer, info) in &resolution.patches {
            let raw = read_all(self.layers[*layer].archive.open_file(info)?)?;
            data = PatchFile::parse(&raw)?.apply(&data)?;
            log::debug!("{name}: applied patch from layer {layer}");
        }

        Ok(Member::Buffered(Cursor::new(data)))
    }

    /// Search every layer for names matching `mask`.
    ///
    /// `external_listfile` is merged first. Layers are visited base first;
    /// a name is reported once for every layer that holds it, as long as
    /// the chain still resolves it. Base members no name reaches are
    /// reported under their stub name. Returns `None` when nothing matches.
    pub fn find(
        &mut self,
        mask: &str,
        external_listfile: Option<&Path>,
        locale: u16,
    ) -> Result<Option<FindCursor>> {
        if external_listfile.is_some() {
            self.add_listfile(external_listfile)?;
        }

        let mut records = Vec::new();
        let mut resolved: Vec<Option<Option<(u64, u64)>>> = vec![None; self.names.len()];

        for (index, layer) in self.layers.iter().enumerate() {
            for (slot, name) in self.names.iter().enumerate() {
                if !wildcard_match(mask, name) {
                    continue;
                }
                let lookup = format!("{}{name}", layer.prefix);
                if layer.archive.find_file(&lookup, locale).is_none() {
                    continue;
                }

                let summary = *resolved[slot].get_or_insert_with(|| {
                    self.resolve(name, locale)
                        .map(|resolution| self.summarize(name, &resolution))
                });

                if let Some((size, file_time)) = summary {
                    records.push(FindRecord {
                        name: name.clone(),
                        size,
                        file_time,
                    });
                }
            }

            if index == 0 {
                for block in layer.archive.unnamed_blocks(&self.names) {
                    let stub = stub_name(block);
                    if !wildcard_match(mask, &stub) {
                        continue;
                    }
                    if let Some(info) = layer.archive.find_file(&stub, locale) {
                        if info.flags.is_patch_file() {
                            continue;
                        }
                        records.push(FindRecord {
                            name: stub,
                            size: info.file_size,
                            file_time: info.file_time,
                        });
                    }
                }
            }
        }

        log::debug!("Mask '{mask}': {} records", records.len());
        Ok((!records.is_empty()).then(|| FindCursor::new(records)))
    }

    /// Summary of the base archive
    pub fn info(&self) -> ChainInfo {
        let base = self.base();
        let header = base.header();
        ChainInfo {
            archive_size: header.archive_size,
            format_version: header.format_version.number(),
            file_count: base.file_count(),
            max_file_count: base.hash_table().size(),
            hash_table_size: header.hash_table_size,
            block_table_size: header.block_table_size,
            sector_size: header.sector_size(),
            partial: self.options.partial,
            encrypted: self.options.encrypted,
            has_signature: base.has_signature(),
        }
    }
}

/// Backslashes, trailing backslash, empty for global scope
fn normalize_prefix(prefix: &str) -> String {
    let prefix = to_archive_path(prefix);
    let prefix = prefix.trim_start_matches('\\');
    if prefix.is_empty() || prefix.ends_with('\\') {
        prefix.to_string()
    } else {
        format!("{prefix}\\")
    }
}

fn strip_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(name);
    }
    let head = name.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &name[prefix.len()..])
        .filter(|rest| !rest.is_empty())
}

fn read_all(mut reader: MemberReader) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(reader.size() as usize);
    reader.read_to_end(&mut data).map_err(Error::from_io)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestArchiveBuilder, TestFile, bsd0_patch, copy_patch};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, builder: TestArchiveBuilder) -> PathBuf {
        let path = dir.path().join(name);
        builder.write(&path).unwrap();
        path
    }

    fn read(chain: &PatchChain, name: &str) -> Vec<u8> {
        let mut data = Vec::new();
        chain
            .open_member(name, 0)
            .unwrap()
            .read_to_end(&mut data)
            .unwrap();
        data
    }

    fn names(cursor: Option<FindCursor>) -> Vec<String> {
        cursor.map_or_else(Vec::new, |c| c.map(|r| r.name).collect())
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("base"), "base\\");
        assert_eq!(normalize_prefix("enUS/base/"), "enUS\\base\\");
        assert_eq!(normalize_prefix("base\\"), "base\\");
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("Base\\a.txt", "base\\"), Some("a.txt"));
        assert_eq!(strip_prefix("enUS\\a.txt", "base\\"), None);
        assert_eq!(strip_prefix("base\\", "base\\"), None);
        assert_eq!(strip_prefix("a.txt", ""), Some("a.txt"));
    }

    #[test]
    fn test_later_layer_shadows_base() {
        let dir = TempDir::new().unwrap();
        let base = write(
            &dir,
            "base.mpq",
            TestArchiveBuilder::new()
                .file(TestFile::new("data\\a.txt", b"base".to_vec()))
                .file(TestFile::new("data\\b.txt", b"only base".to_vec()))
                .with_listfile(),
        );
        let patch = write(
            &dir,
            "patch.mpq",
            TestArchiveBuilder::new()
                .file(TestFile::new("data\\a.txt", b"patched!".to_vec()).zlib())
                .with_listfile(),
        );

        let mut chain = PatchChain::open(&base, &OpenOptions::new()).unwrap();
        chain.apply_patch(&patch, "").unwrap();
        chain.add_listfile(None).unwrap();

        assert_eq!(chain.layer_count(), 2);
        assert_eq!(read(&chain, "data\\a.txt"), b"patched!");
        assert_eq!(read(&chain, "data\\b.txt"), b"only base");

        let records: Vec<FindRecord> = chain.find("data\\a.txt", None, 0).unwrap().unwrap().collect();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.size == 8));
    }

    #[test]
    fn test_prefixed_patch_layer() {
        let dir = TempDir::new().unwrap();
        let base = write(
            &dir,
            "base.mpq",
            TestArchiveBuilder::new()
                .file(TestFile::new("a.txt", b"old".to_vec()))
                .with_listfile(),
        );
        let patch = write(
            &dir,
            "patch.mpq",
            TestArchiveBuilder::new()
                .file(TestFile::new("base\\a.txt", b"new".to_vec()))
                .file(TestFile::new("enUS\\a.txt", b"other scope".to_vec()))
                .file(TestFile::new("base\\extra.txt", b"added".to_vec()))
                .with_listfile(),
        );

        let mut chain = PatchChain::open(&base, &OpenOptions::new()).unwrap();
        chain.apply_patch(&patch, "base").unwrap();
        chain.add_listfile(None).unwrap();

        assert_eq!(chain.names(), ["(listfile)", "a.txt", "extra.txt"]);
        assert_eq!(read(&chain, "a.txt"), b"new");
        assert_eq!(read(&chain, "extra.txt"), b"added");
        assert_eq!(
            names(chain.find("*", None, 0).unwrap()),
            ["(listfile)", "a.txt", "a.txt", "extra.txt"]
        );
    }

    #[test]
    fn test_delete_marker_hides_lower_layers() {
        let dir = TempDir::new().unwrap();
        let base = write(
            &dir,
            "base.mpq",
            TestArchiveBuilder::new()
                .file(TestFile::new("gone.txt", b"soon deleted".to_vec()))
                .file(TestFile::new("kept.txt", b"kept".to_vec()))
                .with_listfile(),
        );
        let patch = write(
            &dir,
            "patch.mpq",
            TestArchiveBuilder::new().file(TestFile::delete_marker("gone.txt")),
        );

        let mut chain = PatchChain::open(&base, &OpenOptions::new()).unwrap();
        chain.apply_patch(&patch, "").unwrap();
        chain.add_listfile(None).unwrap();

        assert!(!chain.contains("gone.txt", 0));
        assert!(chain.open_member("gone.txt", 0).unwrap_err().is_not_found());
        assert_eq!(names(chain.find("*.txt", None, 0).unwrap()), ["kept.txt"]);
    }

    #[test]
    fn test_incremental_patches_stack() {
        let dir = TempDir::new().unwrap();
        let v1 = b"version one of the file, with a long shared tail ..........".to_vec();
        let v2 = b"version two of the file, with a long shared tail ..........".to_vec();
        let v3 = b"version three".to_vec();

        let base = write(
            &dir,
            "base.mpq",
            TestArchiveBuilder::new()
                .file(TestFile::new("f.txt", v1.clone()))
                .with_listfile(),
        );
        let patch1 = write(
            &dir,
            "p1.mpq",
            TestArchiveBuilder::new().file(TestFile::patch("f.txt", bsd0_patch(&v1, &v2))),
        );
        let patch2 = write(
            &dir,
            "p2.mpq",
            TestArchiveBuilder::new().file(TestFile::patch("f.txt", copy_patch(&v2, &v3)).zlib()),
        );

        let mut chain = PatchChain::open(&base, &OpenOptions::new()).unwrap();
        chain.apply_patch(&patch1, "").unwrap();
        chain.apply_patch(&patch2, "").unwrap();
        chain.add_listfile(None).unwrap();

        let member = chain.open_member("f.txt", 0).unwrap();
        assert!(matches!(member, Member::Buffered(_)));
        assert_eq!(member.size(), v3.len() as u64);
        assert_eq!(read(&chain, "f.txt"), v3);

        let records: Vec<FindRecord> = chain.find("f.txt", None, 0).unwrap().unwrap().collect();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.size == v3.len() as u64));
        assert_eq!(chain.file_size("f.txt", 0), Some(v3.len() as u64));
    }

    #[test]
    fn test_patch_without_base_is_not_found() {
        let dir = TempDir::new().unwrap();
        let base = write(&dir, "base.mpq", TestArchiveBuilder::new());
        let patch = write(
            &dir,
            "patch.mpq",
            TestArchiveBuilder::new().file(TestFile::patch("f.txt", copy_patch(b"a", b"b"))),
        );

        let mut chain = PatchChain::open(&base, &OpenOptions::new()).unwrap();
        chain.apply_patch(&patch, "").unwrap();
        assert!(chain.open_member("f.txt", 0).unwrap_err().is_not_found());
        assert_eq!(chain.file_size("f.txt", 0), None);
    }

    #[test]
    fn test_listfile_merging_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let base = write(
            &dir,
            "base.mpq",
            TestArchiveBuilder::new()
                .file(TestFile::new("Data\\A.txt", b"a".to_vec()))
                .with_listfile(),
        );
        let external = dir.path().join("names.txt");
        std::fs::write(&external, "data/a.txt\r\ndata\\b.txt\n").unwrap();

        let mut chain = PatchChain::open(&base, &OpenOptions::new()).unwrap();
        chain.add_listfile(None).unwrap();
        chain.add_listfile(Some(&external)).unwrap();
        assert_eq!(chain.names(), ["(listfile)", "Data\\A.txt", "data\\b.txt"]);

        let missing = dir.path().join("missing.txt");
        assert!(matches!(chain.add_listfile(Some(&missing)), Err(Error::Io(_))));
    }

    #[test]
    fn test_find_without_listfile_reports_stubs() {
        let dir = TempDir::new().unwrap();
        let base = write(
            &dir,
            "base.mpq",
            TestArchiveBuilder::new()
                .file(TestFile::new("named.txt", b"n".to_vec()))
                .file(TestFile::new("hidden.txt", b"h".to_vec())),
        );
        let list = dir.path().join("list.txt");
        std::fs::write(&list, "named.txt\n").unwrap();

        let mut chain = PatchChain::open(&base, &OpenOptions::new()).unwrap();
        assert_eq!(names(chain.find("*", None, 0).unwrap()), ["File00000000.xxx", "File00000001.xxx"]);
        assert_eq!(
            names(chain.find("*", Some(&list), 0).unwrap()),
            ["named.txt", "File00000001.xxx"]
        );
        assert!(chain.find("*.wav", None, 0).unwrap().is_none());
    }

    #[test]
    fn test_info() {
        let dir = TempDir::new().unwrap();
        let base = write(
            &dir,
            "base.mpq",
            TestArchiveBuilder::new()
                .hash_table_size(16)
                .file(TestFile::new("a.txt", b"a".to_vec()))
                .file(TestFile::new("(signature)", vec![0; 72])),
        );
        let chain = PatchChain::open(&base, &OpenOptions::new()).unwrap();
        let info = chain.info();
        assert_eq!(info.format_version, 1);
        assert_eq!(info.file_count, 2);
        assert_eq!(info.max_file_count, 16);
        assert_eq!(info.hash_table_size, 16);
        assert_eq!(info.block_table_size, 2);
        assert_eq!(info.sector_size, 4096);
        assert!(info.has_signature);
        assert!(!info.partial);
    }

    #[test]
    fn test_bad_patch_archive_fails() {
        let dir = TempDir::new().unwrap();
        let base = write(&dir, "base.mpq", TestArchiveBuilder::new());
        let junk = dir.path().join("junk.mpq");
        std::fs::write(&junk, b"not an archive").unwrap();

        let mut chain = PatchChain::open(&base, &OpenOptions::new()).unwrap();
        assert!(chain.apply_patch(&junk, "").is_err());
        assert!(chain.apply_patch(dir.path().join("missing.mpq"), "").is_err());
        assert_eq!(chain.layer_count(), 1);
    }
}
