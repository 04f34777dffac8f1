//! A small registry exercising the runner: plain suites, hooks, local
//! cleanup, fixtures, and two opt-in categories (`slow`, `failing`).

use std::{env, fs, path::Path};

use clar::{
    cl_assert, cl_assert_equal_b, cl_assert_equal_i, cl_assert_equal_s, cl_check, cl_check_pass,
    cl_must_fail, cl_must_pass, cl_warning, config::FIXTURE_ENV, RunContext, Step, Suite,
    SuiteRegistry,
};

// ============================================================================
// core::buffer
// ============================================================================

fn buffer_grows(ctx: &mut RunContext) -> Step {
    let mut buf = String::with_capacity(4);
    buf.push_str("clar");
    buf.push_str("-demo");
    cl_assert_equal_i!(ctx, buf.len(), 9);
    cl_assert_equal_b!(ctx, buf.capacity() >= 9, true);
    Ok(())
}

fn buffer_parses(ctx: &mut RunContext) -> Step {
    let n = cl_must_pass!(ctx, "1024".parse::<u32>());
    cl_assert_equal_i!(ctx, n, 1024);
    cl_must_fail!(ctx, "ten".parse::<u32>());
    Ok(())
}

fn buffer_compares(ctx: &mut RunContext) -> Step {
    let joined = ["a", "b", "c"].join("/");
    cl_assert_equal_s!(ctx, joined.as_str(), "a/b/c");
    cl_assert_equal_s!(ctx, None::<&str>, None::<&str>);
    Ok(())
}

// ============================================================================
// core::string
// ============================================================================

fn string_setup(ctx: &mut RunContext) -> Step {
    cl_must_pass!(ctx, fs::write("scratch.txt", "seed"));
    Ok(())
}

fn string_teardown(ctx: &mut RunContext) -> Step {
    // Teardown failures cannot be contained, so only non-fatal checks here.
    let removed = fs::remove_file("scratch.txt");
    cl_check!(ctx, removed.is_ok());
    Ok(())
}

fn string_reads_scratch(ctx: &mut RunContext) -> Step {
    let text = cl_must_pass!(ctx, fs::read_to_string("scratch.txt"));
    cl_assert_equal_s!(ctx, text.as_str(), "seed");
    Ok(())
}

fn string_local_cleanup(ctx: &mut RunContext) -> Step {
    let extra = String::from("extra.txt");
    cl_must_pass!(ctx, fs::write(&extra, "temporary"));
    ctx.set_cleanup(move |ctx| {
        let removed = fs::remove_file(&extra);
        cl_check!(ctx, removed.is_ok());
        Ok(())
    });
    cl_assert!(ctx, Path::new("extra.txt").exists());
    Ok(())
}

// ============================================================================
// fs
// ============================================================================

fn fs_copies_fixture(ctx: &mut RunContext) -> Step {
    let source = ctx.fixture("greeting")?;
    cl_assert!(ctx, source.is_dir(), source.display());

    let copied = ctx.fixture_sandbox("greeting")?;
    let hello = cl_must_pass!(ctx, fs::read_to_string(copied.join("hello.txt")));
    cl_assert_equal_s!(ctx, hello.trim_end(), "hello clar");
    cl_assert!(ctx, Path::new("greeting/nested/deep.txt").is_file());

    ctx.fixture_cleanup("greeting")?;
    cl_assert!(ctx, !Path::new("greeting").exists());
    Ok(())
}

fn fs_starts_clean(ctx: &mut RunContext) -> Step {
    cl_must_pass!(ctx, fs::create_dir_all("work/a/b"));
    cl_must_pass!(ctx, fs::write("work/a/b/file", "x"));
    ctx.fs_cleanup()?;
    let entries = cl_check_pass!(ctx, fs::read_dir("."));
    cl_check!(ctx, entries.map_or(false, |mut e| e.next().is_none()));
    Ok(())
}

// ============================================================================
// slow (opt-in)
// ============================================================================

fn slow_sums(ctx: &mut RunContext) -> Step {
    let total: u64 = (1..=100_000u64).sum();
    cl_assert_equal_i!(ctx, total, 5_000_050_000u64);
    Ok(())
}

// ============================================================================
// failing (opt-in)
// ============================================================================

fn failing_soft(ctx: &mut RunContext) -> Step {
    let answer = 41;
    cl_check!(ctx, answer == 42);
    cl_warning!(ctx, "answer is off by one");
    Ok(())
}

fn failing_fatal(ctx: &mut RunContext) -> Step {
    let greeting = "hello";
    cl_assert_equal_s!(ctx, greeting, "goodbye");
    cl_check!(ctx, false, "not reached");
    Ok(())
}

fn registry() -> SuiteRegistry {
    SuiteRegistry::new(vec![
        Suite::new("core::buffer")
            .test("grows", buffer_grows)
            .test("parses", buffer_parses)
            .test("compares", buffer_compares),
        Suite::new("core::string")
            .setup(string_setup)
            .teardown(string_teardown)
            .test("reads_scratch", string_reads_scratch)
            .test("local_cleanup", string_local_cleanup),
        Suite::new("fs")
            .test("copies_fixture", fs_copies_fixture)
            .test("starts_clean", fs_starts_clean),
        Suite::new("slow").category("slow").test("sums", slow_sums),
        Suite::new("failing")
            .category("failing")
            .test("soft", failing_soft)
            .test("fatal", failing_fatal),
    ])
}

fn main() {
    if env::var_os(FIXTURE_ENV).is_none() {
        env::set_var(
            FIXTURE_ENV,
            concat!(env!("CARGO_MANIFEST_DIR"), "/tests/resources"),
        );
    }
    clar::cli::main(registry())
}
