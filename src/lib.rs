//! Clar: a small, sandboxed, sequential test runner for statically
//! registered suites.
//!
//! A test binary builds a [`SuiteRegistry`] and hands it to [`cli::main`].
//! Test bodies receive a `&mut` [`RunContext`] and use the `cl_*!` assertion
//! macros; fatal assertions end the test body through `?`.
//!
//! ```no_run
//! use clar::{cl_assert_equal_i, cl_check, RunContext, Step, Suite, SuiteRegistry};
//!
//! fn adds(ctx: &mut RunContext) -> Step {
//!     cl_assert_equal_i!(ctx, 2 + 2, 4);
//!     cl_check!(ctx, 1 < 2);
//!     Ok(())
//! }
//!
//! fn main() {
//!     let registry = SuiteRegistry::new(vec![Suite::new("math").test("adds", adds)]);
//!     clar::cli::main(registry)
//! }
//! ```

pub mod category;
pub mod cli;
pub mod config;
pub mod context;
pub mod driver;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod ledger;
mod macros;
pub mod output;
pub mod report;
pub mod sandbox;
pub mod suite;

pub use crate::category::CategoryFilter;
pub use crate::config::{ColorMode, RunConfig};
pub use crate::context::{Abort, RunContext, RunOptions, Step};
pub use crate::driver::{RunPlan, RunSummary};
pub use crate::errors::{ClarError, ABORT_EXIT_CODE};
pub use crate::ledger::ErrorRecord;
pub use crate::report::Reporter;
pub use crate::sandbox::Sandbox;
pub use crate::suite::{Selector, Suite, SuiteRegistry, Test, TestFn};
