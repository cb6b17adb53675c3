//! # smpq - patch-aware MPQ extraction
//!
//! Library side of the `smpq` tool. [`extract::run_extraction`] opens a base
//! archive, layers patch archives on top of it, expands wildcard masks and
//! writes every matching member to disk exactly once per mask.
//!
//! ```no_run
//! use smpq::extract::{ExtractOptions, PatchSpec, run_extraction};
//! use smpq::report::Reporter;
//! use std::path::Path;
//!
//! let options = ExtractOptions {
//!     overwrite: true,
//!     ..ExtractOptions::default()
//! };
//! let reporter = Reporter::from_options(&options);
//! let patches = [PatchSpec::parse("base:wow-update-13164.MPQ")];
//!
//! let summary = run_extraction(
//!     Path::new("art.MPQ"),
//!     &["*.blp".to_string()],
//!     &patches,
//!     &options,
//!     &reporter,
//! )?;
//! println!("{} files extracted", summary.extracted);
//! # Ok::<(), smpq::extract::FatalError>(())
//! ```

pub mod cli;
pub mod commands;
pub mod extract;
pub mod listfiles;
pub mod report;
pub mod utils;

/// Program name used as the first field of every report line
pub const APP_NAME: &str = "smpq";
