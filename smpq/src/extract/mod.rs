//! Patch-aware extraction
//!
//! [`run_extraction`] drives one run:
//!
//! 1. open the base archive and layer the patch archives on top, in order
//! 2. merge system and archive listfiles
//! 3. for each mask, expand it (wildcard search, literal name otherwise)
//!    and handle every member it yields: skip reserved and already seen
//!    names, then list the member or write it to disk
//!
//! Only failures of step 1 end the run. Everything that goes wrong with a
//! single member is reported and the sweep moves on.

mod dirs;
mod error;
mod options;
mod resolver;
mod seen;

pub use dirs::ensure_dir;
pub use error::{DirError, FatalError, MemberError};
pub use options::ExtractOptions;
pub use resolver::{
    MaskResolution, PatchSpec, literal_resolution, load_listfiles, open_chain, resolve_mask,
};
pub use seen::SeenSet;

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path};

use filetime::FileTime;
use smpq_archive::filetime::from_archive_time;
use smpq_archive::path::from_archive_path;
use smpq_archive::special_files::is_reserved_name;
use smpq_archive::{FindRecord, PatchChain};

use crate::report::Reporter;
use crate::utils::format::format_list_time;

/// Longest name, terminator included, that maps to a host path
pub const MAX_PATH_LEN: usize = 1024;

/// Size of the buffer members are copied through
pub const COPY_BUFFER_SIZE: usize = 0x10000;

/// Counts of what happened to the members of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Members written to disk
    pub extracted: usize,
    /// Members printed in list mode
    pub listed: usize,
    /// Reserved or already handled members
    pub skipped: usize,
    /// Members that failed
    pub failed: usize,
}

enum Outcome {
    Extracted,
    Listed,
    Seen,
}

/// Extract (or list) the members of `archive` matching `masks`.
///
/// Returns an error only when the archive or one of the patches cannot be
/// opened. Member failures are reported through `reporter` and counted in
/// the summary.
pub fn run_extraction(
    archive: &Path,
    masks: &[String],
    patches: &[PatchSpec],
    options: &ExtractOptions,
    reporter: &Reporter,
) -> Result<ExtractionSummary, FatalError> {
    let label = archive.display().to_string();

    let mut chain = open_chain(archive, patches, options, reporter)?;
    load_listfiles(&mut chain, &label, options, reporter);

    let mut summary = ExtractionSummary::default();
    for mask in masks {
        let resolution = match resolve_mask(&mut chain, mask, options) {
            Ok(resolution) => resolution,
            Err(e) => {
                let listfile = options
                    .external_listfile
                    .as_deref()
                    .map_or_else(String::new, |p| p.display().to_string());
                reporter.error(&label, "Cannot open file", &listfile, &e);
                literal_resolution(&chain, mask, options)
            }
        };

        let mut seen = SeenSet::new();
        for record in resolution {
            match process_member(&chain, &record, &mut seen, options, reporter, &label) {
                Ok(Outcome::Extracted) => summary.extracted += 1,
                Ok(Outcome::Listed) => summary.listed += 1,
                Ok(Outcome::Seen) => summary.skipped += 1,
                Err(MemberError::Reserved) => {
                    reporter.verbose(&label, MemberError::Reserved.message(), &record.name);
                    summary.skipped += 1;
                }
                Err(err) => {
                    report_member_error(reporter, &label, &record.name, options, &err);
                    summary.failed += 1;
                }
            }
        }
        seen.release();
    }

    log::debug!("{label}: {summary:?}");
    Ok(summary)
}

fn process_member(
    chain: &PatchChain,
    record: &FindRecord,
    seen: &mut SeenSet,
    options: &ExtractOptions,
    reporter: &Reporter,
    label: &str,
) -> Result<Outcome, MemberError> {
    let name = record.name.as_str();

    if name.len() + 1 > MAX_PATH_LEN {
        return Err(MemberError::PathTooLong(name.len()));
    }
    if is_reserved_name(name) {
        return Err(MemberError::Reserved);
    }
    if seen.contains(name) {
        log::trace!("{name}: already handled");
        return Ok(Outcome::Seen);
    }
    seen.insert(name);

    let relative = from_archive_path(name);

    if options.list_only {
        if !chain.contains(name, options.locale) {
            return Err(MemberError::Open(smpq_archive::Error::FileNotFound(
                name.to_string(),
            )));
        }
        let time = from_archive_time(record.file_time);
        reporter.message(format_args!(
            "{:>12} {} {relative}",
            record.size,
            format_list_time(time)
        ));
        return Ok(Outcome::Listed);
    }

    if Path::new(&relative).components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    }) {
        return Err(MemberError::OutsideDestination);
    }

    let mut member = chain
        .open_member(name, options.locale)
        .map_err(MemberError::Open)?;

    let target = options.host_path(&relative);
    reporter.verbose(label, "Extract", &target.display().to_string());

    if let Some(parent) = target.parent() {
        ensure_dir(parent).map_err(MemberError::CreateDir)?;
    }

    if let Ok(metadata) = fs::metadata(&target) {
        if metadata.is_dir() {
            return Err(MemberError::IsDirectory);
        }
        if !options.overwrite {
            return Err(MemberError::Exists);
        }
        reporter.verbose(label, "Remove old file", &target.display().to_string());
        fs::remove_file(&target).map_err(MemberError::Remove)?;
    }

    let mut output = File::create(&target).map_err(MemberError::Create)?;
    copy_member(&mut member, &mut output)?;
    drop(output);

    if let Some(seconds) = from_archive_time(record.file_time) {
        let time = FileTime::from_unix_time(seconds, 0);
        filetime::set_file_times(&target, time, time).map_err(MemberError::SetTime)?;
    }

    Ok(Outcome::Extracted)
}

/// Copy until the member reports end of data. A failed read or write
/// leaves whatever was written so far in place.
fn copy_member(member: &mut impl Read, output: &mut impl Write) -> Result<u64, MemberError> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let read = match member.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(MemberError::Read(e)),
        };
        output
            .write_all(&buffer[..read])
            .map_err(MemberError::Write)?;
        total += read as u64;
    }

    Ok(total)
}

fn report_member_error(
    reporter: &Reporter,
    label: &str,
    name: &str,
    options: &ExtractOptions,
    err: &MemberError,
) {
    if err.concerns_member() {
        reporter.error(label, err.message(), name, err);
        return;
    }

    let target = options.host_path(&from_archive_path(name));
    let target = target.display().to_string();
    match err {
        MemberError::CreateDir(dir_err) => {
            reporter.error(
                label,
                "Cannot create directory",
                &dir_err.path.display().to_string(),
                &dir_err.source,
            );
            reporter.error(label, err.message(), &target, &"No such file or directory");
        }
        _ => reporter.error(label, err.message(), &target, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FailingReader {
        remaining: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "bad sector"));
            }
            let n = buf.len().min(self.remaining);
            buf[..n].fill(b'x');
            self.remaining -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_copy_member_spans_buffers() {
        let data = vec![7u8; COPY_BUFFER_SIZE * 2 + 5];
        let mut output = Vec::new();
        let copied = copy_member(&mut data.as_slice(), &mut output).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(output, data);
    }

    #[test]
    fn test_copy_member_keeps_partial_output() {
        let mut output = Vec::new();
        let err = copy_member(&mut FailingReader { remaining: 10 }, &mut output).unwrap_err();
        assert!(matches!(err, MemberError::Read(_)));
        assert_eq!(output, vec![b'x'; 10]);
    }

    #[test]
    fn test_copy_member_write_failure() {
        let mut output = [0u8; 4];
        let err = copy_member(&mut &b"too long"[..], &mut &mut output[..]).unwrap_err();
        assert!(matches!(err, MemberError::Write(_)));
    }
}
