//! `list` and `extract` commands

use anyhow::{Context, Result, ensure};
use std::fs;
use std::process::ExitCode;

use crate::cli::{ExtractArgs, is_mpqe};
use crate::extract::{ExtractOptions, PatchSpec, run_extraction};
use crate::listfiles;
use crate::report::Reporter;

/// Fold the command line into extraction options.
///
/// The extra listfile must exist and must not be a directory.
pub fn build_options(
    args: &ExtractArgs,
    list_only: bool,
    verbose: bool,
    quiet: bool,
) -> Result<ExtractOptions> {
    if let Some(listfile) = &args.listfile {
        let metadata = fs::metadata(listfile)
            .with_context(|| format!("Cannot open listfile `{}'", listfile.display()))?;
        ensure!(
            !metadata.is_dir(),
            "Cannot open listfile `{}': Is a directory",
            listfile.display()
        );
    }

    Ok(ExtractOptions {
        list_only,
        overwrite: args.overwrite,
        verbose,
        quiet,
        no_system_listfiles: args.no_system_listfiles,
        no_archive_listfile: args.no_archive_listfile,
        no_attributes: args.no_attributes,
        force_version1: args.mpq_version == Some(1),
        sector_crc_check: args.sector_crc,
        partial: args.partial,
        encrypted: !args.not_encrypted && is_mpqe(&args.archive),
        external_listfile: args.listfile.clone(),
        system_listfile_dir: listfiles::default_dir(),
        destination: args.directory.clone(),
        locale: args.locale,
    })
}

/// Run `list` (`list_only`) or `extract`
pub fn execute(args: &ExtractArgs, list_only: bool, verbose: bool, quiet: bool) -> Result<ExitCode> {
    let options = build_options(args, list_only, verbose, quiet)?;
    let reporter = Reporter::from_options(&options);

    let masks = if args.files.is_empty() {
        vec!["*".to_string()]
    } else {
        args.files.clone()
    };
    let patches: Vec<PatchSpec> = args.patches.iter().map(|p| PatchSpec::parse(p)).collect();

    match run_extraction(&args.archive, &masks, &patches, &options, &reporter) {
        Ok(summary) => {
            log::info!(
                "{}: {} extracted, {} listed, {} skipped, {} failed",
                args.archive.display(),
                summary.extracted,
                summary.listed,
                summary.skipped,
                summary.failed
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            log::debug!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
