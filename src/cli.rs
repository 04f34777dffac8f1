//! The Clar command-line interface.
//!
//! A test binary hands its registry to [`main`]; everything else (argument
//! parsing, configuration, logging, the reporter and the exit status) is
//! set up here.

use std::{ffi::OsString, io, path::PathBuf, process};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::{
    category::CategoryFilter,
    config::{ColorMode, RunConfig},
    context::RunContext,
    driver::{self, RunPlan},
    errors::{print_error, ClarError, ABORT_EXIT_CODE},
    output::{write_listing, ClassicPrinter},
    sandbox::Sandbox,
    suite::{Selector, SuiteRegistry},
};

/// Filter directive for the diagnostic log on stderr (`CLAR_LOG=debug`).
pub const LOG_ENV: &str = "CLAR_LOG";

// ============================================================================
// CLI ARGUMENTS
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "clar",
    version,
    about = "Runs the statically registered test suites of this binary."
)]
pub struct ClarArgs {
    /// Run only the suite number or name XX (name prefix, or exact with `::`)
    #[arg(short = 's', long = "suite", value_name = "XX")]
    pub suites: Vec<String>,

    /// Include category <name> tests (`all` for every category)
    #[arg(short = 'i', long = "include", value_name = "name")]
    pub categories: Vec<String>,

    /// Only report tests that had an error
    #[arg(short = 'q', long = "quiet")]
    pub report_errors_only: bool,

    /// Quit as soon as a test fails
    #[arg(short = 'Q', long = "quit-on-error")]
    pub exit_on_error: bool,

    /// Print suite names and category names
    #[arg(short = 'l', long = "list")]
    pub list: bool,

    /// YAML run configuration (defaults to $CLAR_CONFIG)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// When to color the output
    #[arg(long, value_enum)]
    pub color: Option<ColorMode>,
}

impl ClarArgs {
    /// Layers the flags over a loaded configuration.
    pub fn apply(&self, mut config: RunConfig) -> RunConfig {
        config.report_errors_only |= self.report_errors_only;
        config.exit_on_error |= self.exit_on_error;
        config.categories.extend(self.categories.iter().cloned());
        if let Some(color) = self.color {
            config.color = color;
        }
        config
    }

    /// Parses the selectors and merges them with the configured categories.
    pub fn plan(&self, config: &RunConfig) -> Result<RunPlan, ClarError> {
        let selectors = self
            .suites
            .iter()
            .map(|raw| Selector::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RunPlan {
            selectors,
            categories: config.categories.clone(),
        })
    }
}

// ============================================================================
// MAIN ENTRY POINT
// ============================================================================

/// Runs `registry` with the process arguments and exits with the run status.
pub fn main(registry: SuiteRegistry) -> ! {
    process::exit(run(registry, std::env::args_os()))
}

/// Runs `registry` with `args` (program name first) and returns the exit
/// status: the error count, 0 for `-l`, or 255 when the run was aborted.
pub fn run<I, T>(registry: SuiteRegistry, args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match ClarArgs::try_parse_from(args) {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ABORT_EXIT_CODE } else { 0 };
        }
    };
    init_tracing();

    if args.list {
        let stdout = io::stdout();
        let _ = write_listing(&mut stdout.lock(), &registry, &CategoryFilter::new());
        return 0;
    }

    let config = match RunConfig::load(args.config.as_deref()) {
        Ok(config) => args.apply(config),
        Err(e) => {
            print_error(e);
            return ABORT_EXIT_CODE;
        }
    };

    let printer = ClassicPrinter::stdio(config.color.choice());
    let mut ctx = RunContext::new(Box::new(printer))
        .with_options(config.options())
        .with_sandbox(Sandbox::new(config.fixture_root.clone()));

    let plan = match args.plan(&config) {
        Ok(plan) => plan,
        Err(e) => {
            ctx.reporter().on_abort(&e.to_string());
            return ABORT_EXIT_CODE;
        }
    };

    let result = driver::run(&registry, &plan, &mut ctx);
    let code = driver::exit_code(&result);
    if let Err(e @ ClarError::Sandbox { .. }) = result {
        print_error(e);
    }
    code
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
