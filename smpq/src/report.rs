//! Message emission
//!
//! Every outcome of a run is reported as one line. Errors go to standard
//! error, verbose status lines and plain messages to standard output:
//!
//! ```text
//! smpq: art.MPQ: Error: Cannot extract file `a/b.txt': File exists
//! smpq: art.MPQ: Extract `a/c.txt' ...
//! ```
//!
//! Quiet mode hides errors and verbose lines; plain messages (list records,
//! archive info) are always printed. A [`Reporter`] built with
//! [`Reporter::capturing`] keeps the lines in memory instead.

use std::cell::RefCell;
use std::fmt::Display;
use std::io::{self, Write};

use crate::APP_NAME;
use crate::extract::ExtractOptions;

/// Line produced by a [`Reporter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Written to standard output
    Out(String),
    /// Written to standard error
    Err(String),
}

impl Line {
    /// Text of the line without the trailing newline
    pub fn text(&self) -> &str {
        match self {
            Self::Out(text) | Self::Err(text) => text,
        }
    }
}

#[derive(Debug)]
enum Sink {
    Console,
    Capture(RefCell<Vec<Line>>),
}

/// Formats and emits run messages
#[derive(Debug)]
pub struct Reporter {
    app: String,
    verbose: bool,
    quiet: bool,
    sink: Sink,
}

impl Reporter {
    /// Reporter writing to the console
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            app: APP_NAME.to_string(),
            verbose,
            quiet,
            sink: Sink::Console,
        }
    }

    /// Console reporter honouring the verbose and quiet switches of `options`
    pub fn from_options(options: &ExtractOptions) -> Self {
        Self::new(options.verbose, options.quiet)
    }

    /// Reporter keeping every line in memory, see [`Reporter::lines`]
    pub fn capturing(verbose: bool, quiet: bool) -> Self {
        Self {
            sink: Sink::Capture(RefCell::new(Vec::new())),
            ..Self::new(verbose, quiet)
        }
    }

    /// Whether verbose lines are printed
    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// Report a failure concerning `file`
    pub fn error(&self, archive: &str, message: &str, file: &str, cause: &dyn Display) {
        let line = format!(
            "{}: {archive}: Error: {message} `{file}': {cause}",
            self.app
        );
        log::debug!(target: "smpq::report", "{line}");
        if !self.quiet {
            self.emit(Line::Err(line));
        }
    }

    /// Report an action about to happen to `file`
    pub fn verbose(&self, archive: &str, message: &str, file: &str) {
        let line = format!("{}: {archive}: {message} `{file}' ...", self.app);
        log::debug!(target: "smpq::report", "{line}");
        if self.is_verbose() {
            self.emit(Line::Out(line));
        }
    }

    /// Print `text` as is
    pub fn message(&self, text: impl Display) {
        self.emit(Line::Out(text.to_string()));
    }

    /// Lines captured so far; always empty for a console reporter
    pub fn lines(&self) -> Vec<Line> {
        match &self.sink {
            Sink::Console => Vec::new(),
            Sink::Capture(lines) => lines.borrow().clone(),
        }
    }

    #[allow(clippy::print_stdout, clippy::print_stderr)]
    fn emit(&self, line: Line) {
        match &self.sink {
            // A closed pipe must not abort the run
            Sink::Console => match line {
                Line::Out(text) => {
                    let _ = writeln!(io::stdout().lock(), "{text}");
                }
                Line::Err(text) => {
                    let _ = writeln!(io::stderr().lock(), "{text}");
                }
            },
            Sink::Capture(lines) => lines.borrow_mut().push(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_line_formats() {
        let reporter = Reporter::capturing(true, false);
        reporter.error("art.MPQ", "Cannot extract file", "a/b.txt", &"File exists");
        reporter.verbose("art.MPQ", "Extract", "a/c.txt");
        reporter.message(format_args!("{:>12} {}", 42, "a/c.txt"));

        assert_eq!(
            reporter.lines(),
            [
                Line::Err("smpq: art.MPQ: Error: Cannot extract file `a/b.txt': File exists".into()),
                Line::Out("smpq: art.MPQ: Extract `a/c.txt' ...".into()),
                Line::Out("          42 a/c.txt".into()),
            ]
        );
    }

    #[test]
    fn test_quiet_hides_errors_and_verbose_lines() {
        let reporter = Reporter::capturing(true, true);
        reporter.error("a.mpq", "Cannot open archive", "a.mpq", &"No such file");
        reporter.verbose("a.mpq", "Extract", "x");
        reporter.message("kept");

        assert!(!reporter.is_verbose());
        assert_eq!(reporter.lines(), [Line::Out("kept".into())]);
    }

    #[test]
    fn test_verbose_lines_need_verbose() {
        let reporter = Reporter::capturing(false, false);
        reporter.verbose("a.mpq", "Extract", "x");
        assert!(reporter.lines().is_empty());
    }
}
