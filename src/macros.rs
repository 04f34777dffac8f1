//! Assertion macros.
//!
//! Thin wrappers over the [`RunContext`](crate::RunContext) assertion methods
//! that stringify the asserted expression into the failure message. Fatal
//! forms end with `?`, so they can only be used inside functions returning
//! `Result<_, Abort>` (test bodies and hooks). Source locations come from
//! `#[track_caller]` and point at the macro invocation.

/// Fatal: the expression must be true.
#[macro_export]
macro_rules! cl_assert {
    ($ctx:expr, $expr:expr $(,)?) => {
        $ctx.require($expr, concat!("Expression is not true: ", stringify!($expr)))?
    };
    ($ctx:expr, $expr:expr, $desc:expr $(,)?) => {
        $ctx.assert(
            $expr,
            concat!("Expression is not true: ", stringify!($expr)),
            Some(::std::string::ToString::to_string(&$desc)),
            true,
        )?
    };
}

/// Non-fatal: the expression should be true.
#[macro_export]
macro_rules! cl_check {
    ($ctx:expr, $expr:expr $(,)?) => {
        $ctx.check($expr, concat!("Expression is not true: ", stringify!($expr)))
    };
    ($ctx:expr, $expr:expr, $desc:expr $(,)?) => {{
        let _ = $ctx.assert(
            $expr,
            concat!("Expression is not true: ", stringify!($expr)),
            Some(::std::string::ToString::to_string(&$desc)),
            false,
        );
    }};
}

/// Fatal: the `Result` must be `Ok`. Evaluates to the `Ok` value.
#[macro_export]
macro_rules! cl_must_pass {
    ($ctx:expr, $expr:expr $(,)?) => {
        $ctx.require_ok($expr, concat!("Function call failed: ", stringify!($expr)))?
    };
}

/// Non-fatal: the `Result` should be `Ok`. Evaluates to an `Option`.
#[macro_export]
macro_rules! cl_check_pass {
    ($ctx:expr, $expr:expr $(,)?) => {
        $ctx.check_ok($expr, concat!("Function call failed: ", stringify!($expr)))
    };
}

/// Fatal: the `Result` must be `Err`.
#[macro_export]
macro_rules! cl_must_fail {
    ($ctx:expr, $expr:expr $(,)?) => {
        $ctx.assert_err(
            $expr,
            concat!("Expected function call to fail: ", stringify!($expr)),
            true,
        )?
    };
}

/// Non-fatal: the `Result` should be `Err`.
#[macro_export]
macro_rules! cl_check_fail {
    ($ctx:expr, $expr:expr $(,)?) => {{
        let _ = $ctx.assert_err(
            $expr,
            concat!("Expected function call to fail: ", stringify!($expr)),
            false,
        );
    }};
}

/// Fatal, unconditional.
#[macro_export]
macro_rules! cl_fail {
    ($ctx:expr, $desc:expr $(,)?) => {
        $ctx.fail($desc)?
    };
}

/// Non-fatal, unconditional.
#[macro_export]
macro_rules! cl_warning {
    ($ctx:expr, $desc:expr $(,)?) => {
        $ctx.warning($desc)
    };
}

/// Fatal string equality (`Option<&str>` or `&str` on either side).
#[macro_export]
macro_rules! cl_assert_equal_s {
    ($ctx:expr, $s1:expr, $s2:expr $(,)?) => {
        $ctx.assert_equal_s(
            $s1,
            $s2,
            concat!("String mismatch: ", stringify!($s1), " != ", stringify!($s2)),
            true,
        )?
    };
}

/// Fatal integer equality.
#[macro_export]
macro_rules! cl_assert_equal_i {
    ($ctx:expr, $i1:expr, $i2:expr $(,)?) => {
        $ctx.assert_equal_i(
            ($i1) as i64,
            ($i2) as i64,
            concat!(stringify!($i1), " != ", stringify!($i2)),
            true,
        )?
    };
}

/// Fatal boolean equality, reported as integers.
#[macro_export]
macro_rules! cl_assert_equal_b {
    ($ctx:expr, $b1:expr, $b2:expr $(,)?) => {
        $ctx.assert_equal_i(
            ($b1) as i64,
            ($b2) as i64,
            concat!(stringify!($b1), " != ", stringify!($b2)),
            true,
        )?
    };
}
