//! `info` command

use anyhow::Result;
use std::path::Path;
use std::process::ExitCode;

use smpq_archive::{ChainInfo, OpenOptions, PatchChain};

use crate::cli::is_mpqe;
use crate::extract::{ExtractOptions, FatalError};
use crate::report::Reporter;

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

/// Print a summary of `archive`, one `Key: value` line per property.
///
/// Only the header version and stream provider switches of `options` are
/// used.
pub fn run_info(
    archive: &Path,
    options: &ExtractOptions,
    reporter: &Reporter,
) -> Result<ChainInfo, FatalError> {
    let label = archive.display().to_string();
    let open_options = OpenOptions::new()
        .force_version1(options.force_version1)
        .encrypted(options.encrypted);

    let chain = PatchChain::open(archive, &open_options).map_err(|source| {
        reporter.error(&label, "Cannot open archive", &label, &source);
        FatalError::OpenArchive {
            path: archive.to_path_buf(),
            source,
        }
    })?;
    let info = chain.info();

    reporter.message(format_args!("Archive name: {label}"));
    reporter.message(format_args!("Archive size: {}", info.archive_size));
    reporter.message(format_args!("MPQ format version: {}", info.format_version));
    reporter.message(format_args!("Number of files in archive: {}", info.file_count));
    reporter.message(format_args!(
        "Maximum file count of archive: {}",
        info.max_file_count
    ));
    reporter.message(format_args!("Hash table size: {}", info.hash_table_size));
    reporter.message(format_args!("Block table size: {}", info.block_table_size));
    reporter.message(format_args!("Sector size: {}", info.sector_size));
    reporter.message(format_args!("Archive partial: {}", yes_no(info.partial)));
    reporter.message(format_args!("Archive encrypted: {}", yes_no(info.encrypted)));
    reporter.message(format_args!(
        "Archive signature: {}",
        if info.has_signature {
            "Present (not verified)"
        } else {
            "No signature"
        }
    ));

    Ok(info)
}

/// Run the `info` command
pub fn execute(
    archive: &Path,
    mpq_version: Option<u8>,
    not_encrypted: bool,
    quiet: bool,
) -> Result<ExitCode> {
    let options = ExtractOptions {
        quiet,
        force_version1: mpq_version == Some(1),
        encrypted: !not_encrypted && is_mpqe(archive),
        ..ExtractOptions::default()
    };
    let reporter = Reporter::from_options(&options);

    Ok(match run_info(archive, &options, &reporter) {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    })
}
