//! `remove` and `rename` commands

use anyhow::Result;
use std::path::Path;
use std::process::ExitCode;

use smpq_archive::MutableArchive;
use smpq_archive::path::to_archive_path;

use crate::cli::EditArgs;
use crate::extract::{ExtractOptions, FatalError, MAX_PATH_LEN};
use crate::report::Reporter;

fn open_for_edit(
    archive: &Path,
    options: &ExtractOptions,
    reporter: &Reporter,
) -> Result<MutableArchive, FatalError> {
    MutableArchive::open(archive, &options.open_options()).map_err(|source| {
        let label = archive.display().to_string();
        reporter.error(&label, "Cannot open archive", &label, &source);
        FatalError::OpenArchive {
            path: archive.to_path_buf(),
            source,
        }
    })
}

fn flush(
    mutable: &mut MutableArchive,
    archive: &Path,
    reporter: &Reporter,
) -> Result<(), FatalError> {
    mutable.flush().map_err(|source| {
        let label = archive.display().to_string();
        reporter.error(&label, "Cannot write archive", &label, &source);
        FatalError::WriteArchive {
            path: archive.to_path_buf(),
            source,
        }
    })
}

/// Remove `names` from `archive`.
///
/// A name that cannot be removed is reported and skipped. Names too long
/// for a host path are skipped silently. Returns how many members were
/// removed.
pub fn run_remove(
    archive: &Path,
    names: &[String],
    options: &ExtractOptions,
    reporter: &Reporter,
) -> Result<usize, FatalError> {
    let label = archive.display().to_string();
    let mut mutable = open_for_edit(archive, options, reporter)?;

    let mut removed = 0;
    for name in names {
        if name.len() + 1 > MAX_PATH_LEN {
            log::debug!("Skipping a {} byte name", name.len());
            continue;
        }
        let name = to_archive_path(name);
        reporter.verbose(&label, "Remove file", &name);

        match mutable.remove_file(&name, options.locale) {
            Ok(()) => removed += 1,
            Err(e) => reporter.error(&label, "Cannot remove existing file", &name, &e),
        }
    }

    flush(&mut mutable, archive, reporter)?;
    Ok(removed)
}

/// Rename the member `old_name` of `archive` to `new_name`
pub fn run_rename(
    archive: &Path,
    old_name: &str,
    new_name: &str,
    options: &ExtractOptions,
    reporter: &Reporter,
) -> Result<(), FatalError> {
    let label = archive.display().to_string();
    let mut mutable = open_for_edit(archive, options, reporter)?;

    let old_name = to_archive_path(old_name);
    let new_name = to_archive_path(new_name);
    reporter.verbose(&label, "Rename file", &old_name);

    if let Err(source) = mutable.rename_file(&old_name, &new_name, options.locale) {
        reporter.error(&label, "Cannot rename file", &old_name, &source);
        return Err(FatalError::Rename {
            name: old_name,
            source,
        });
    }

    flush(&mut mutable, archive, reporter)
}

fn edit_options(args: &EditArgs, verbose: bool, quiet: bool) -> ExtractOptions {
    ExtractOptions {
        verbose,
        quiet,
        no_archive_listfile: args.no_archive_listfile,
        no_attributes: args.no_attributes,
        force_version1: args.mpq_version == Some(1),
        sector_crc_check: args.sector_crc,
        locale: args.locale,
        ..ExtractOptions::default()
    }
}

/// Run the `remove` command
pub fn execute_remove(
    args: &EditArgs,
    names: &[String],
    verbose: bool,
    quiet: bool,
) -> Result<ExitCode> {
    let options = edit_options(args, verbose, quiet);
    let reporter = Reporter::from_options(&options);

    Ok(match run_remove(&args.archive, names, &options, &reporter) {
        Ok(removed) => {
            log::info!("{}: {removed} removed", args.archive.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::debug!("{e}");
            ExitCode::FAILURE
        }
    })
}

/// Run the `rename` command
pub fn execute_rename(
    args: &EditArgs,
    old_name: &str,
    new_name: &str,
    verbose: bool,
    quiet: bool,
) -> Result<ExitCode> {
    let options = edit_options(args, verbose, quiet);
    let reporter = Reporter::from_options(&options);

    Ok(
        match run_rename(&args.archive, old_name, new_name, &options, &reporter) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                log::debug!("{e}");
                ExitCode::FAILURE
            }
        },
    )
}
