//! The execution engine: suite dispatch and the per-test supervisor.

use tracing::debug;

use crate::context::RunContext;
use crate::errors::ClarError;
use crate::suite::{Suite, Test, TestFn};

// ============================================================================
// PER-TEST SUPERVISOR
// ============================================================================

/// Runs one test: setup and body inside the abort region, then the local
/// cleanup and the teardown, then the result event.
///
/// A fatal assertion in setup or body skips the rest of both; cleanup and
/// teardown still run. A fatal assertion in cleanup or teardown cannot be
/// contained and is returned as [`ClarError::UnwindOutsideRegion`].
pub fn run_test(
    ctx: &mut RunContext,
    test: &Test,
    setup: Option<TestFn>,
    teardown: Option<TestFn>,
) -> Result<(), ClarError> {
    let errors_before = ctx.state().suite_errors;

    ctx.arm();
    let body = match setup {
        Some(setup) => setup(ctx),
        None => Ok(()),
    }
    .and_then(|()| (test.func)(ctx));
    ctx.disarm();

    if body.is_err() {
        debug!(test = test.name, "test aborted by a fatal assertion");
    }

    if let Some(cleanup) = ctx.take_local_cleanup() {
        let outcome = cleanup(ctx);
        ctx.ensure_contained(outcome)?;
    }

    if let Some(teardown) = teardown {
        let outcome = teardown(ctx);
        ctx.ensure_contained(outcome)?;
    }

    let number = ctx.finish_test();

    if ctx.options().report_errors_only {
        ctx.drain_errors();
    } else {
        let failed = ctx.state().suite_errors > errors_before;
        ctx.reporter().on_test(test.name, number, failed);
    }
    Ok(())
}

// ============================================================================
// SUITE DISPATCH
// ============================================================================

/// Runs every test of `suite` in order. Returns `Ok(false)` when the suite
/// was skipped (category filter, or an earlier error under `-Q`).
pub fn run_suite(ctx: &mut RunContext, suite: &Suite) -> Result<bool, ClarError> {
    if !ctx.categories_mut().is_enabled(suite) {
        debug!(suite = suite.name, "suite filtered out by category");
        return Ok(false);
    }

    if ctx.should_stop() {
        return Ok(false);
    }

    if !ctx.options().report_errors_only {
        ctx.reporter().on_suite(suite.name, suite.index);
    }
    debug!(suite = suite.name, tests = suite.tests.len(), "running suite");

    ctx.begin_suite(suite.name);

    for test in &suite.tests {
        ctx.begin_test(test.name);
        run_test(ctx, test, suite.setup, suite.teardown)?;

        if ctx.should_stop() {
            debug!(suite = suite.name, "stopping after first error");
            break;
        }
    }
    Ok(true)
}
