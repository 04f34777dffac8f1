//! Clar Error Handling
//!
//! Run-level failures only. Assertion failures are not errors in this sense:
//! they are recorded in the [`ErrorLedger`](crate::ledger::ErrorLedger) and the
//! run carries on. Everything in [`ClarError`] stops the run.

use std::{io, path::PathBuf};

use miette::{Diagnostic, Report};
use thiserror::Error;

/// Exit status used when the run is aborted before or outside normal test
/// accounting (bad selector, sandbox failure, fatal failure during cleanup).
pub const ABORT_EXIT_CODE: i32 = 255;

/// Unified error type for everything that ends a run early.
#[derive(Debug, Error, Diagnostic)]
pub enum ClarError {
    #[error("Failed to sandbox the test runner: {message}")]
    #[diagnostic(
        code(clar::sandbox),
        help("check that TMPDIR (or TMP/TEMP) points to a writable directory")
    )]
    Sandbox {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<io::Error>,
    },

    #[error("No suite matching '{selector}' found.")]
    #[diagnostic(code(clar::selector), help("use -l to list the available suites"))]
    UnknownSuite { selector: String },

    #[error("Suite number {index} does not exist.")]
    #[diagnostic(code(clar::selector), help("use -l to list the available suites"))]
    SuiteIndexOutOfRange { index: usize },

    #[error("Fatal error: a cleanup method raised an exception.")]
    #[diagnostic(
        code(clar::cleanup),
        help("fatal assertions are not allowed in {suite}::{test} cleanup or teardown")
    )]
    UnwindOutsideRegion { suite: String, test: String },

    #[error("Failed to load configuration from '{}': {message}", .path.display())]
    #[diagnostic(code(clar::config))]
    Config {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl ClarError {
    /// Builds a sandbox error from an I/O failure on `path`.
    pub fn sandbox_io(message: impl Into<String>, path: impl Into<PathBuf>, source: io::Error) -> Self {
        ClarError::Sandbox {
            message: message.into(),
            path: Some(path.into()),
            source: Some(source),
        }
    }

    /// Builds a sandbox error with no underlying I/O cause.
    pub fn sandbox(message: impl Into<String>) -> Self {
        ClarError::Sandbox {
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// True for errors raised while resolving `-s` selectors.
    pub fn is_selector_error(&self) -> bool {
        matches!(
            self,
            ClarError::UnknownSuite { .. } | ClarError::SuiteIndexOutOfRange { .. }
        )
    }
}

/// Prints a run-level error with miette's report renderer.
pub fn print_error(error: ClarError) {
    let report = Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_errors_render_like_the_classic_runner() {
        let err = ClarError::SuiteIndexOutOfRange { index: 7 };
        assert_eq!(err.to_string(), "Suite number 7 does not exist.");
        assert!(err.is_selector_error());

        let err = ClarError::UnknownSuite {
            selector: "nope".to_string(),
        };
        assert_eq!(err.to_string(), "No suite matching 'nope' found.");
    }

    #[test]
    fn sandbox_errors_keep_their_io_source() {
        let io = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = ClarError::sandbox_io("cannot create directory", "/nowhere", io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_selector_error());
        assert_eq!(
            err.code().map(|c| c.to_string()),
            Some("clar::sandbox".to_string())
        );
    }
}
