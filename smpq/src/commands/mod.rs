//! Command implementations

pub mod edit;
pub mod extract;
pub mod info;

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{Generator, generate};
use std::io;
use std::process::ExitCode;

use crate::cli::{Cli, Commands};

/// Run the parsed command line.
///
/// Failures the command already reported map to [`ExitCode::FAILURE`];
/// argument problems come back as errors.
pub fn execute(cli: Cli) -> Result<ExitCode> {
    let verbose = cli.verbose > 0;
    match cli.command {
        Commands::List { args } => extract::execute(&args, true, verbose, cli.quiet),
        Commands::Extract { args } => extract::execute(&args, false, verbose, cli.quiet),
        Commands::Info {
            archive,
            mpq_version,
            not_encrypted,
        } => info::execute(&archive, mpq_version, not_encrypted, cli.quiet),
        Commands::Remove { args, files } => {
            edit::execute_remove(&args, &files, verbose, cli.quiet)
        }
        Commands::Rename {
            args,
            old_name,
            new_name,
        } => edit::execute_rename(&args, &old_name, &new_name, verbose, cli.quiet),
        Commands::Completions { shell } => {
            print_completions(shell, &mut Cli::command());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_completions<G: Generator>(generator: G, cmd: &mut clap::Command) {
    generate(
        generator,
        cmd,
        cmd.get_name().to_string(),
        &mut io::stdout(),
    );
}
