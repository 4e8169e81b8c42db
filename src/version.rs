//! suiterun version information.
//!
//! Exposed as a single constant so the CLI `--version` output and log lines agree.
//!
//! ## Notes
//!
//! - The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time.

/// The suiterun version string (for example, `0.1.0`).
pub const SUITERUN_VERSION: &str = env!("CARGO_PKG_VERSION");
