//! Run context: the explicit, per-run state threaded through the engine.
//!
//! Every test body, setup and teardown hook receives `&mut RunContext`. It
//! carries the counters, the error ledger, the category filter, the sandbox
//! and the reporter, and provides the assertion primitives.
//!
//! Fatal assertions return `Err(Abort)`; test code propagates it with `?`
//! and the engine's per-test supervisor catches it, so the rest of the test
//! body is skipped while cleanup still runs.

use std::fmt::Display;
use std::panic::Location;
use std::path::PathBuf;

use tracing::debug;

use crate::category::CategoryFilter;
use crate::errors::ClarError;
use crate::ledger::{ErrorLedger, ErrorRecord};
use crate::report::Reporter;
use crate::sandbox::Sandbox;

/// Marker returned by a fatal assertion. It carries nothing: the failure
/// itself is already in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort;

/// Result of a test statement, test body, or hook.
pub type Step = Result<(), Abort>;

/// A test-scoped cleanup registered with [`RunContext::set_cleanup`].
pub type LocalCleanup = Box<dyn FnOnce(&mut RunContext) -> Step>;

/// Behavioural switches for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// `-q`: drain failures right after each test instead of printing progress.
    pub report_errors_only: bool,
    /// `-Q`: stop at the first test that records an error.
    pub exit_on_error: bool,
}

/// Counters and identifiers for the run in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub active_suite: Option<&'static str>,
    pub active_test: Option<&'static str>,
    pub suite_errors: usize,
    pub total_errors: usize,
    pub test_count: usize,
}

pub struct RunContext {
    state: RunState,
    options: RunOptions,
    ledger: ErrorLedger,
    categories: CategoryFilter,
    sandbox: Sandbox,
    reporter: Box<dyn Reporter>,
    local_cleanup: Option<LocalCleanup>,
    armed: bool,
    escaped: bool,
}

impl RunContext {
    pub fn new(reporter: Box<dyn Reporter>) -> Self {
        Self {
            state: RunState::default(),
            options: RunOptions::default(),
            ledger: ErrorLedger::new(),
            categories: CategoryFilter::new(),
            sandbox: Sandbox::default(),
            reporter,
            local_cleanup: None,
            armed: false,
            escaped: false,
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_sandbox(mut self, sandbox: Sandbox) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_categories(mut self, categories: CategoryFilter) -> Self {
        self.categories = categories;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    pub fn ledger(&self) -> &ErrorLedger {
        &self.ledger
    }

    pub fn categories(&self) -> &CategoryFilter {
        &self.categories
    }

    pub fn categories_mut(&mut self) -> &mut CategoryFilter {
        &mut self.categories
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn sandbox_mut(&mut self) -> &mut Sandbox {
        &mut self.sandbox
    }

    pub fn reporter(&mut self) -> &mut dyn Reporter {
        self.reporter.as_mut()
    }

    /// Reports and releases every pending failure.
    pub fn drain_errors(&mut self) -> usize {
        self.ledger.drain(self.reporter.as_mut())
    }

    // =====================
    // Assertion primitives
    // =====================

    /// Records a failure unless `condition` holds. Fatal failures return
    /// `Err(Abort)`; non-fatal ones always return `Ok(())`.
    #[track_caller]
    pub fn assert(
        &mut self,
        condition: bool,
        message: impl Into<String>,
        description: Option<String>,
        fatal: bool,
    ) -> Step {
        if condition {
            return Ok(());
        }
        self.record_failure(Location::caller(), message.into(), description, fatal)
    }

    /// Non-fatal check: records on failure, the test keeps going.
    #[track_caller]
    pub fn check(&mut self, condition: bool, message: impl Into<String>) {
        let _ = self.assert(condition, message, None, false);
    }

    /// Fatal check: records on failure and aborts the test body.
    #[track_caller]
    pub fn require(&mut self, condition: bool, message: impl Into<String>) -> Step {
        self.assert(condition, message, None, true)
    }

    /// Unconditional fatal failure.
    #[track_caller]
    pub fn fail(&mut self, description: impl Into<String>) -> Step {
        self.assert(false, "Test failed.", Some(description.into()), true)
    }

    /// Unconditional non-fatal failure.
    #[track_caller]
    pub fn warning(&mut self, description: impl Into<String>) {
        let _ = self.assert(
            false,
            "Warning during test execution:",
            Some(description.into()),
            false,
        );
    }

    /// String equality; two absent strings are equal, one absent is not.
    #[track_caller]
    pub fn assert_equal_s<'a>(
        &mut self,
        s1: impl Into<Option<&'a str>>,
        s2: impl Into<Option<&'a str>>,
        message: impl Into<String>,
        fatal: bool,
    ) -> Step {
        let (s1, s2) = (s1.into(), s2.into());
        if s1 == s2 {
            return Ok(());
        }
        let description = format!("'{}' != '{}'", or_null(s1), or_null(s2));
        self.record_failure(Location::caller(), message.into(), Some(description), fatal)
    }

    /// Integer equality.
    #[track_caller]
    pub fn assert_equal_i(
        &mut self,
        i1: i64,
        i2: i64,
        message: impl Into<String>,
        fatal: bool,
    ) -> Step {
        if i1 == i2 {
            return Ok(());
        }
        let description = format!("{i1} != {i2}");
        self.record_failure(Location::caller(), message.into(), Some(description), fatal)
    }

    /// Unwraps `result`, turning `Err` into a fatal failure whose description
    /// is the error's text.
    #[track_caller]
    pub fn require_ok<T, E: Display>(
        &mut self,
        result: Result<T, E>,
        message: impl Into<String>,
    ) -> Result<T, Abort> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                let _ =
                    self.record_failure(Location::caller(), message.into(), Some(e.to_string()), true);
                Err(Abort)
            }
        }
    }

    /// Like [`require_ok`](Self::require_ok) but non-fatal.
    #[track_caller]
    pub fn check_ok<T, E: Display>(
        &mut self,
        result: Result<T, E>,
        message: impl Into<String>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                let _ =
                    self.record_failure(Location::caller(), message.into(), Some(e.to_string()), false);
                None
            }
        }
    }

    /// Records a failure when `result` is `Ok`.
    #[track_caller]
    pub fn assert_err<T, E>(
        &mut self,
        result: Result<T, E>,
        message: impl Into<String>,
        fatal: bool,
    ) -> Step {
        self.assert(result.is_err(), message, None, fatal)
    }

    fn record_failure(
        &mut self,
        location: &'static Location<'static>,
        message: String,
        description: Option<String>,
        fatal: bool,
    ) -> Step {
        let record = ErrorRecord::new(
            self.state.active_suite.unwrap_or_default(),
            self.state.active_test.unwrap_or_default(),
            self.state.test_count + 1,
            location,
            message,
            description,
        );
        debug!(
            suite = %record.suite,
            test = %record.test,
            file = record.file,
            line = record.line,
            fatal,
            "assertion failed"
        );
        self.ledger.record(record);
        self.state.suite_errors += 1;
        self.state.total_errors += 1;

        if !fatal {
            return Ok(());
        }
        if !self.armed {
            self.escaped = true;
        }
        Err(Abort)
    }

    // =====================
    // Test-scoped helpers
    // =====================

    /// Registers a cleanup to run after the current test, before the suite
    /// teardown, whether or not the test failed. A later call replaces an
    /// earlier one.
    pub fn set_cleanup(&mut self, cleanup: impl FnOnce(&mut RunContext) -> Step + 'static) {
        self.local_cleanup = Some(Box::new(cleanup));
    }

    /// Path of fixture `name` under the fixture root.
    #[track_caller]
    pub fn fixture(&mut self, name: &str) -> Result<PathBuf, Abort> {
        let path = self.sandbox.fixture_path(name);
        self.require_ok(path, "Failed to locate test fixture")
    }

    /// Copies fixture `name` into the sandbox.
    #[track_caller]
    pub fn fixture_sandbox(&mut self, name: &str) -> Result<PathBuf, Abort> {
        let copied = self.sandbox.copy_fixture(name);
        self.require_ok(copied, "Failed to copy test fixtures to sandbox")
    }

    /// Removes fixture `name` from the sandbox.
    #[track_caller]
    pub fn fixture_cleanup(&mut self, name: &str) -> Step {
        let removed = self.sandbox.remove_fixture(name);
        self.require_ok(removed, "Failed to cleanup the sandbox")
    }

    /// Empties the sandbox directory.
    #[track_caller]
    pub fn fs_cleanup(&mut self) -> Step {
        let reset = self.sandbox.reset();
        self.require_ok(reset, "Failed to cleanup the sandbox")
    }

    // =====================
    // Engine hooks
    // =====================

    pub(crate) fn begin_suite(&mut self, name: &'static str) {
        self.state.active_suite = Some(name);
        self.state.suite_errors = 0;
    }

    pub(crate) fn begin_test(&mut self, name: &'static str) {
        self.state.active_test = Some(name);
    }

    pub(crate) fn arm(&mut self) {
        debug_assert!(!self.armed, "abort region armed twice");
        self.armed = true;
        self.escaped = false;
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }

    pub(crate) fn take_local_cleanup(&mut self) -> Option<LocalCleanup> {
        self.local_cleanup.take()
    }

    /// Turns a fatal failure outside the armed region into a run-level error.
    pub(crate) fn ensure_contained(&mut self, outcome: Step) -> Result<(), ClarError> {
        if outcome.is_ok() && !self.escaped {
            return Ok(());
        }
        self.escaped = false;
        Err(ClarError::UnwindOutsideRegion {
            suite: self.state.active_suite.unwrap_or_default().to_string(),
            test: self.state.active_test.unwrap_or_default().to_string(),
        })
    }

    pub(crate) fn finish_test(&mut self) -> usize {
        self.local_cleanup = None;
        self.state.test_count += 1;
        self.state.test_count
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.options.exit_on_error && self.state.total_errors > 0
    }
}

fn or_null(s: Option<&str>) -> &str {
    s.unwrap_or("(null)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RecordingReporter;

    fn context() -> RunContext {
        let mut ctx = RunContext::new(Box::new(RecordingReporter::new()));
        ctx.begin_suite("suite");
        ctx.begin_test("test");
        ctx.arm();
        ctx
    }

    #[test]
    fn string_mismatch_describes_both_sides() {
        let mut ctx = context();
        let outcome = ctx.assert_equal_s("abc", "abd", "String mismatch: s1 != s2", false);
        assert_eq!(outcome, Ok(()));

        let record = &ctx.ledger().records()[0];
        assert_eq!(record.message, "String mismatch: s1 != s2");
        assert_eq!(record.description.as_deref(), Some("'abc' != 'abd'"));
    }

    #[test]
    fn two_absent_strings_are_equal() {
        let mut ctx = context();
        ctx.assert_equal_s(None::<&str>, None::<&str>, "nulls", true).unwrap();
        assert!(ctx.ledger().is_empty());

        let err = ctx.assert_equal_s("abc", None::<&str>, "one null", true);
        assert_eq!(err, Err(Abort));
        assert_eq!(
            ctx.ledger().records()[0].description.as_deref(),
            Some("'abc' != '(null)'")
        );
    }

    #[test]
    fn integer_mismatch_description() {
        let mut ctx = context();
        assert_eq!(ctx.assert_equal_i(3, 5, "i1 != i2", true), Err(Abort));
        assert_eq!(
            ctx.ledger().records()[0].description.as_deref(),
            Some("3 != 5")
        );
        assert_eq!(ctx.state().total_errors, 1);
        assert_eq!(ctx.state().suite_errors, 1);
    }

    #[test]
    fn non_fatal_failures_accumulate() {
        let mut ctx = context();
        ctx.check(false, "one");
        ctx.check(true, "not recorded");
        ctx.warning("two");
        assert_eq!(ctx.ledger().len(), 2);
        assert_eq!(ctx.state().total_errors, 2);
        assert_eq!(ctx.ensure_contained(Ok(())).ok(), Some(()));
    }

    #[test]
    fn require_ok_records_the_error_text() {
        let mut ctx = context();
        let value = ctx.require_ok(Ok::<_, String>(7), "fine").unwrap();
        assert_eq!(value, 7);

        let err = ctx.require_ok(Err::<u8, _>("boom"), "Function call failed: op()");
        assert_eq!(err, Err(Abort));
        let record = &ctx.ledger().records()[0];
        assert_eq!(record.message, "Function call failed: op()");
        assert_eq!(record.description.as_deref(), Some("boom"));
        assert_eq!(record.file, file!());
    }

    #[test]
    fn fatal_failure_while_disarmed_escapes() {
        let mut ctx = context();
        ctx.disarm();
        let outcome = ctx.require(false, "in cleanup");
        let err = ctx.ensure_contained(outcome).unwrap_err();
        assert!(matches!(
            err,
            ClarError::UnwindOutsideRegion { ref suite, ref test } if suite == "suite" && test == "test"
        ));
    }

    #[test]
    fn swallowed_fatal_failure_while_disarmed_still_escapes() {
        let mut ctx = context();
        ctx.disarm();
        let _ = ctx.fail("ignored by the cleanup code");
        assert!(ctx.ensure_contained(Ok(())).is_err());
    }

    #[test]
    fn records_use_the_current_test_number() {
        let mut ctx = context();
        ctx.finish_test();
        ctx.check(false, "second test");
        assert_eq!(ctx.ledger().records()[0].test_number, 2);
    }
}
