#![forbid(unsafe_code)]
//! suiterun: run a PHPUnit suite one test group after the other
//!
//! The crate wraps an external test runner. It turns the `tests:run` command line into structured
//! process invocations (one per test group, or a single one for a test file), optionally wiring in
//! the `xdebug` extension for coverage runs and the `xhprof` profiling signal, and executes them
//! sequentially with inherited stdio.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]` and `#![deny(clippy::expect_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod version;

pub use cli::config::RunnerConfig;
pub use cli::test_runner::{InvocationRequest, ResolvedCommand, RunSummary, run_tests};
