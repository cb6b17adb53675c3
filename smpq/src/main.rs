//! Main entry point for the smpq CLI

use clap::Parser;
use std::process::ExitCode;

use smpq::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose > 0 {
        logger.filter_level(match cli.verbose {
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        });
    } else if cli.quiet {
        logger.filter_level(log::LevelFilter::Error);
    }
    logger.init();

    match smpq::commands::execute(cli) {
        Ok(code) => code,
        Err(e) => {
            print_failure(&e);
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::print_stderr)]
fn print_failure(error: &anyhow::Error) {
    eprintln!("{}: {error:#}", smpq::APP_NAME);
}
