//! Root CLI structure for smpq

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smpq")]
#[command(about = "Extract, list, inspect and edit MPQ archives with patch support", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except listings
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List files in an archive
    #[command(visible_alias = "l")]
    List {
        #[command(flatten)]
        args: ExtractArgs,
    },

    /// Extract files from an archive
    #[command(visible_aliases = ["x", "e"])]
    Extract {
        #[command(flatten)]
        args: ExtractArgs,
    },

    /// Show information about an archive
    #[command(visible_alias = "i")]
    Info {
        /// Path to the MPQ archive
        archive: PathBuf,

        /// MPQ format version to parse the header as (1 forces version 1)
        #[arg(short = 'M', long, value_name = "VERSION", value_parser = clap::value_parser!(u8).range(1..=4))]
        mpq_version: Option<u8>,

        /// Do not treat `.mpqe` archives as encrypted
        #[arg(short = 'X', long)]
        not_encrypted: bool,
    },

    /// Remove files from an archive
    #[command(visible_aliases = ["r", "d", "delete"])]
    Remove {
        #[command(flatten)]
        args: EditArgs,

        /// Files to remove
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Rename a file in an archive
    #[command(visible_alias = "R")]
    Rename {
        #[command(flatten)]
        args: EditArgs,

        /// Current name of the file
        old_name: String,

        /// New name of the file
        new_name: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Arguments shared by `list` and `extract`
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Path to the MPQ archive
    pub archive: PathBuf,

    /// Files to process, wildcards allowed (all files if none given)
    pub files: Vec<String>,

    /// Additional listfile
    #[arg(short = 'L', long, value_name = "FILE")]
    pub listfile: Option<PathBuf>,

    /// Do not load system listfiles
    #[arg(short = 'n', long)]
    pub no_system_listfiles: bool,

    /// Do not load the listfile stored in the archive
    #[arg(short = 'N', long)]
    pub no_archive_listfile: bool,

    /// Do not load the attributes stored in the archive
    #[arg(short = 'A', long)]
    pub no_attributes: bool,

    /// MPQ format version to parse the header as (1 forces version 1)
    #[arg(short = 'M', long, value_name = "VERSION", value_parser = clap::value_parser!(u8).range(1..=4))]
    pub mpq_version: Option<u8>,

    /// Verify sector checksums
    #[arg(short = 'S', long)]
    pub sector_crc: bool,

    /// Overwrite existing files
    #[arg(
        short = 'f',
        long = "force",
        visible_short_alias = 'o',
        visible_alias = "overwrite"
    )]
    pub overwrite: bool,

    /// Locale of the files to process
    #[arg(short = 'O', long, default_value_t = 0)]
    pub locale: u16,

    /// Archive is a partial (trial) archive
    #[arg(short = 'P', long)]
    pub partial: bool,

    /// Do not treat `.mpqe` archives as encrypted
    #[arg(short = 'X', long)]
    pub not_encrypted: bool,

    /// Patch archives layered over the archive, in order (end the list with `--`)
    #[arg(
        short = 'p',
        long = "patch",
        value_name = "[PREFIX:]ARCHIVE",
        num_args = 1..,
        action = clap::ArgAction::Append
    )]
    pub patches: Vec<String>,

    /// Directory to extract into
    #[arg(short = 'C', long, value_name = "DIR", default_value = ".")]
    pub directory: PathBuf,
}

/// Arguments shared by `remove` and `rename`
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Path to the MPQ archive
    pub archive: PathBuf,

    /// Do not update the listfile stored in the archive
    #[arg(short = 'N', long)]
    pub no_archive_listfile: bool,

    /// Do not load the attributes stored in the archive
    #[arg(short = 'A', long)]
    pub no_attributes: bool,

    /// MPQ format version to parse the header as (1 forces version 1)
    #[arg(short = 'M', long, value_name = "VERSION", value_parser = clap::value_parser!(u8).range(1..=4))]
    pub mpq_version: Option<u8>,

    /// Verify sector checksums
    #[arg(short = 'S', long)]
    pub sector_crc: bool,

    /// Locale of the files to process
    #[arg(short = 'O', long, default_value_t = 0)]
    pub locale: u16,
}

/// Whether `archive` names an encrypted (`.mpqe`) archive
pub fn is_mpqe(archive: &std::path::Path) -> bool {
    archive
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mpqe"))
}
