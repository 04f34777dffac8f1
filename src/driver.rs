//! The run driver: one complete run from banner to exit status.
//!
//! Order of business: announce the registry, enable categories, resolve
//! every `-s` selector (nothing runs if one is bad), enter the sandbox, run
//! the selected suites, report, drain the ledger and remove the sandbox.

use tracing::{debug, info, warn};

use crate::category::{CategoryFilter, ALL_CATEGORIES};
use crate::context::RunContext;
use crate::engine::run_suite;
use crate::errors::{ClarError, ABORT_EXIT_CODE};
use crate::suite::{Selector, Suite, SuiteRegistry};

/// Highest exit status a normal run reports; [`ABORT_EXIT_CODE`] is reserved.
pub const MAX_ERROR_EXIT_CODE: i32 = ABORT_EXIT_CODE - 1;

/// What to run: the parsed `-s` selectors and `-i` categories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunPlan {
    pub selectors: Vec<Selector>,
    /// Category names; `all` enables every declared category.
    pub categories: Vec<String>,
}

/// Totals of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub tests: usize,
    pub suites: usize,
    pub errors: usize,
}

impl RunSummary {
    /// The process exit status: the error count, saturated below the abort code.
    pub fn exit_code(&self) -> i32 {
        i32::try_from(self.errors)
            .unwrap_or(i32::MAX)
            .min(MAX_ERROR_EXIT_CODE)
    }
}

/// Exit status for a run that ended with `result`.
pub fn exit_code(result: &Result<RunSummary, ClarError>) -> i32 {
    match result {
        Ok(summary) => summary.exit_code(),
        Err(_) => ABORT_EXIT_CODE,
    }
}

/// Runs `registry` according to `plan`.
///
/// Run-level failures are reported through the context's reporter (as an
/// abort message) before they are returned.
pub fn run(
    registry: &SuiteRegistry,
    plan: &RunPlan,
    ctx: &mut RunContext,
) -> Result<RunSummary, ClarError> {
    ctx.reporter()
        .on_init(registry.test_count(), registry.len(), &registry.names());

    for category in &plan.categories {
        if category.eq_ignore_ascii_case(ALL_CATEGORIES) {
            ctx.categories_mut().enable_all(registry.suites());
        } else {
            ctx.categories_mut().enable(category);
        }
    }

    let selected = match resolve(registry, &plan.selectors, ctx.categories_mut()) {
        Ok(selected) => selected,
        Err(e) => {
            ctx.reporter().on_abort(&e.to_string());
            return Err(e);
        }
    };

    if let Err(e) = ctx.sandbox_mut().enter() {
        ctx.reporter().on_abort("Failed to sandbox the test runner.");
        return Err(e);
    }

    info!(
        suites = selected.len(),
        tests = registry.test_count(),
        "starting run"
    );

    let mut ran = 0usize;
    for suite in selected {
        match run_suite(ctx, suite) {
            Ok(true) => ran += 1,
            Ok(false) => {}
            Err(e) => return Err(abort_run(ctx, e)),
        }
    }
    debug!(suites = ran, "suites executed");

    let state = ctx.state().clone();
    ctx.reporter()
        .on_shutdown(state.test_count, registry.len(), state.total_errors);
    ctx.drain_errors();

    ctx.sandbox_mut().exit()?;

    Ok(RunSummary {
        tests: state.test_count,
        suites: ran,
        errors: state.total_errors,
    })
}

/// Resolves all selectors up front. No selectors means every suite. A
/// selector whose suites are all disabled by category matches nothing.
fn resolve<'r>(
    registry: &'r SuiteRegistry,
    selectors: &[Selector],
    categories: &mut CategoryFilter,
) -> Result<Vec<&'r Suite>, ClarError> {
    if selectors.is_empty() {
        return Ok(registry.suites().iter().collect());
    }
    let mut selected = Vec::new();
    for selector in selectors {
        let suites = registry.select(selector)?;
        if !suites.iter().any(|suite| categories.is_enabled(suite)) {
            return Err(ClarError::UnknownSuite {
                selector: selector.to_string(),
            });
        }
        selected.extend(suites);
    }
    Ok(selected)
}

// Reports a failure that escaped the per-test supervisor, flushes what the
// ledger holds and still tries to remove the sandbox.
fn abort_run(ctx: &mut RunContext, error: ClarError) -> ClarError {
    ctx.reporter().on_abort(&error.to_string());
    ctx.drain_errors();
    if let Err(e) = ctx.sandbox_mut().exit() {
        warn!(error = %e, "sandbox left behind after abort");
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RunOptions, Step};
    use crate::report::{Event, EventLog, RecordingReporter};
    use crate::sandbox::Sandbox;

    fn pass(_: &mut RunContext) -> Step {
        Ok(())
    }

    fn soft_fail(ctx: &mut RunContext) -> Step {
        ctx.check(false, "soft");
        Ok(())
    }

    fn bad_teardown(ctx: &mut RunContext) -> Step {
        ctx.fail("teardown")
    }

    fn registry() -> SuiteRegistry {
        SuiteRegistry::new(vec![
            Suite::new("core::buffer").test("ok", pass).test("bad", soft_fail),
            Suite::new("core::string").test("ok", pass),
            Suite::new("net").category("network").test("bad", soft_fail),
        ])
    }

    fn context(tmp: &tempfile::TempDir) -> (RunContext, EventLog) {
        let reporter = RecordingReporter::new();
        let log = reporter.log();
        let ctx = RunContext::new(Box::new(reporter))
            .with_options(RunOptions::default())
            .with_sandbox(Sandbox::new(None).with_tmp_root(tmp.path()));
        (ctx, log)
    }

    fn leftover_sandboxes(tmp: &tempfile::TempDir) -> usize {
        std::fs::read_dir(tmp.path()).unwrap().count()
    }

    #[test]
    fn exit_code_saturates_below_the_abort_status() {
        let summary = |errors| RunSummary {
            tests: 0,
            suites: 0,
            errors,
        };
        assert_eq!(summary(0).exit_code(), 0);
        assert_eq!(summary(3).exit_code(), 3);
        assert_eq!(summary(10_000).exit_code(), 254);
        assert_eq!(exit_code(&Err(ClarError::SuiteIndexOutOfRange { index: 1 })), 255);
    }

    #[test]
    fn bad_selector_aborts_before_anything_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut ctx, log) = context(&tmp);
        let plan = RunPlan {
            selectors: vec![Selector::Index(0), Selector::Index(99)],
            categories: vec![],
        };

        let err = run(&registry(), &plan, &mut ctx).unwrap_err();
        assert!(err.is_selector_error());
        assert_eq!(ctx.state().test_count, 0);
        assert_eq!(leftover_sandboxes(&tmp), 0);
        assert_eq!(
            log.borrow().last(),
            Some(&Event::Abort {
                message: "Suite number 99 does not exist.".to_string()
            })
        );
    }

    #[test]
    fn prefix_selector_runs_matching_suites_only() {
        // The sandbox changes the working directory; this test never enters
        // it, selection alone is checked through resolve().
        let registry = registry();
        let mut categories = CategoryFilter::new();
        let selected =
            resolve(&registry, &[Selector::parse("core").unwrap()], &mut categories).unwrap();
        let names: Vec<_> = selected.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["core::buffer", "core::string"]);

        let selected = resolve(
            &registry,
            &[Selector::parse("core::string").unwrap()],
            &mut categories,
        )
        .unwrap();
        assert_eq!(selected.len(), 1);

        assert_eq!(resolve(&registry, &[], &mut categories).unwrap().len(), 3);
    }

    #[test]
    fn selector_matching_only_disabled_suites_is_unknown() {
        let registry = registry();
        let mut categories = CategoryFilter::new();
        let err = resolve(&registry, &[Selector::parse("net").unwrap()], &mut categories)
            .unwrap_err();
        assert_eq!(err.to_string(), "No suite matching 'net' found.");

        categories.enable("network");
        let selected =
            resolve(&registry, &[Selector::parse("net").unwrap()], &mut categories).unwrap();
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn disabled_selector_aborts_the_run_before_the_sandbox() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut ctx, log) = context(&tmp);
        let plan = RunPlan {
            selectors: vec![Selector::parse("net").unwrap()],
            categories: vec![],
        };

        let err = run(&registry(), &plan, &mut ctx).unwrap_err();
        assert!(err.is_selector_error());
        assert_eq!(leftover_sandboxes(&tmp), 0);
        assert_eq!(
            log.borrow().last(),
            Some(&Event::Abort {
                message: "No suite matching 'net' found.".to_string()
            })
        );
    }

    #[test]
    fn abort_run_drains_and_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut ctx, log) = context(&tmp);
        ctx.check(false, "pending");

        let err = abort_run(
            &mut ctx,
            ClarError::UnwindOutsideRegion {
                suite: "s".to_string(),
                test: "t".to_string(),
            },
        );
        assert!(matches!(err, ClarError::UnwindOutsideRegion { .. }));
        assert!(ctx.ledger().is_empty());

        let events = log.borrow();
        assert!(matches!(events[0], Event::Abort { .. }));
        assert!(matches!(events[1], Event::Error { index: 1, .. }));
    }

    #[test]
    fn unrecoverable_cleanup_failure_is_surfaced() {
        // Only the pieces of run() that do not touch the working directory.
        let tmp = tempfile::tempdir().unwrap();
        let (mut ctx, _log) = context(&tmp);
        let suite = Suite::new("broken").teardown(bad_teardown).test("ok", pass);
        let err = run_suite(&mut ctx, &suite).unwrap_err();
        let err = abort_run(&mut ctx, err);
        assert_eq!(err.to_string(), "Fatal error: a cleanup method raised an exception.");
    }
}
