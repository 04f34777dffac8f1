//! Handles all user-facing text for a run.
//!
//! [`ClassicPrinter`] is the default [`Reporter`]: a banner, one `.` or `F`
//! per test, then a numbered block per failure. Abort messages go to stderr.
//! [`write_listing`] renders the `-l` output.

use std::io::{self, Write};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::category::CategoryFilter;
use crate::ledger::ErrorRecord;
use crate::report::Reporter;
use crate::suite::SuiteRegistry;

// ============================================================================
// CLASSIC PRINTER
// ============================================================================

/// Dot-per-test text reporter.
pub struct ClassicPrinter<O: WriteColor, E: WriteColor> {
    out: O,
    err: E,
}

impl ClassicPrinter<StandardStream, StandardStream> {
    /// Printer on the process's stdout and stderr.
    pub fn stdio(color: ColorChoice) -> Self {
        Self::new(StandardStream::stdout(color), StandardStream::stderr(color))
    }
}

impl<O: WriteColor, E: WriteColor> ClassicPrinter<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    pub fn out(&self) -> &O {
        &self.out
    }

    pub fn err(&self) -> &E {
        &self.err
    }

    fn colored(&mut self, color: Color, text: &str) -> io::Result<()> {
        self.out
            .set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(self.out, "{text}")?;
        self.out.reset()
    }

    fn write_error(&mut self, index: usize, error: &ErrorRecord) -> io::Result<()> {
        write!(self.out, "  {index}) ")?;
        self.colored(Color::Red, "Failure:")?;
        writeln!(self.out)?;
        writeln!(
            self.out,
            "{}::{} (no description) [{}:{}] [-t{}]",
            error.suite, error.test, error.file, error.line, error.test_number
        )?;
        writeln!(self.out, "  {}", error.message)?;
        if let Some(description) = &error.description {
            writeln!(self.out, "  {description}")?;
        }
        writeln!(self.out)?;
        self.out.flush()
    }
}

// Output errors (closed pipe and the like) must not disturb the run.
impl<O: WriteColor, E: WriteColor> Reporter for ClassicPrinter<O, E> {
    fn on_init(&mut self, _test_count: usize, suite_count: usize, suite_names: &str) {
        let _ = writeln!(self.out, "Loaded {suite_count} suites: {suite_names}");
        let _ = writeln!(self.out, "Started");
    }

    fn on_suite(&mut self, _suite_name: &str, _suite_index: usize) {}

    fn on_test(&mut self, _test_name: &str, _test_number: usize, failed: bool) {
        let _ = if failed {
            self.colored(Color::Red, "F")
        } else {
            write!(self.out, ".")
        };
        let _ = self.out.flush();
    }

    fn on_error(&mut self, index: usize, error: &ErrorRecord) {
        let _ = self.write_error(index, error);
    }

    fn on_shutdown(&mut self, _test_count: usize, _suite_count: usize, _error_count: usize) {
        let _ = write!(self.out, "\n\n");
        let _ = self.out.flush();
    }

    fn on_abort(&mut self, message: &str) {
        let _ = self
            .err
            .set_color(ColorSpec::new().set_fg(Some(Color::Red)));
        let _ = writeln!(self.err, "{message}");
        let _ = self.err.reset();
    }
}

// ============================================================================
// SUITE LISTING
// ============================================================================

/// Writes the `-l` listing: every suite with its index, then every category
/// that `-iall` would enable.
pub fn write_listing(
    w: &mut impl Write,
    registry: &SuiteRegistry,
    categories: &CategoryFilter,
) -> io::Result<()> {
    writeln!(w, "Test suites (use -s<name> to run just one):")?;
    for suite in registry.suites() {
        writeln!(w, " {:>3}: {}", suite.index, suite.name)?;
    }

    writeln!(w)?;
    writeln!(w, "Categories (use -i<category> to include):")?;
    let mut all = categories.clone();
    all.enable_all(registry.suites());
    for line in all.list_enabled(" - ") {
        writeln!(w, "{line}")?;
    }
    Ok(())
}
