//! CLI module for suiterun
//!
//! ## Commands
//!
//! - `tests:run [group]` - Run the PHPUnit suite one group after the other
//!
//! ## Modules
//!
//! - `config` - Paths and tool names of the suite under test
//! - `options` - Group and forwarded-option parsing
//! - `test_interfaces` - Toolchain, prompt and process-spawning boundaries
//! - `test_runner` - Command resolution and sequential execution
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod config;
pub mod options;
pub mod test_interfaces;
pub mod test_runner;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

use config::RunnerConfig;
use test_interfaces::{ConsolePrompt, DryRunSpawner, InheritedSpawner, ProcessSpawner, SystemToolchain, TestError};
use test_runner::{ConsoleReporter, InvocationRequest, RunContext, RunSummary};

use crate::version::SUITERUN_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<TestError> for CliError {
    fn from(e: TestError) -> Self {
        CliError::failure(format!("Error: {e}"))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run a PHPUnit suite one test group after the other
#[derive(Parser, Debug)]
#[command(name = "suiterun")]
#[command(version = SUITERUN_VERSION)]
#[command(about = "Run a PHPUnit suite one test group after the other", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Where the suite lives and which PHP tools to use.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Root directory of the application under test
    #[arg(
        long,
        global = true,
        env = "SUITERUN_DOCUMENT_ROOT",
        default_value = ".",
        value_name = "DIR"
    )]
    pub document_root: PathBuf,

    /// PHP interpreter used for coverage runs
    #[arg(long, global = true, env = "SUITERUN_PHP", default_value = "php", value_name = "BIN")]
    pub php: String,

    /// php-config helper used to find the extension directory
    #[arg(
        long = "php-config",
        global = true,
        env = "SUITERUN_PHP_CONFIG",
        default_value = "php-config",
        value_name = "BIN"
    )]
    pub php_config: String,
}

impl ConfigArgs {
    /// Build the runner configuration, anchoring the document root to the current directory.
    pub fn to_runner_config(&self) -> CliResult<RunnerConfig> {
        let root = std::path::absolute(&self.document_root).map_err(|e| {
            CliError::failure(format!(
                "Error resolving document root '{}': {}",
                self.document_root.display(),
                e
            ))
        })?;

        Ok(RunnerConfig::new()
            .with_document_root(root)
            .with_php(&self.php)
            .with_php_config(&self.php_config))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run PHPUnit tests one group after the other
    #[command(name = "tests:run")]
    TestsRun(TestsRunArgs),
}

#[derive(Args, Debug)]
pub struct TestsRunArgs {
    /// Run only specific test groups. Separate multiple groups by comma, for instance core,integration
    #[arg(value_name = "GROUP")]
    pub group: Option<String>,

    /// All options will be forwarded to phpunit (`%group%` is replaced with the group being run)
    #[arg(
        short = 'o',
        long,
        value_name = "OPTIONS",
        num_args = 0..=1,
        default_missing_value = "",
        allow_hyphen_values = true
    )]
    pub options: Option<String>,

    /// Profile using xhprof
    #[arg(long)]
    pub xhprof: bool,

    /// Execute tests within this file. Should be a path relative to the tests/PHPUnit directory.
    #[arg(long, value_name = "FILE")]
    pub file: Option<String>,

    /// Stop after the first group that fails
    #[arg(short = 'x', long)]
    pub stop_on_failure: bool,

    /// Exit with the first failing runner's exit code
    #[arg(long)]
    pub fail_on_error: bool,

    /// Print the commands without running them
    #[arg(long)]
    pub dry_run: bool,
}

impl TestsRunArgs {
    pub fn to_request(&self) -> InvocationRequest {
        InvocationRequest::new(self.group.as_deref().unwrap_or(""), self.options.clone().unwrap_or_default())
            .with_profiler(self.xhprof)
            .with_file(self.file.clone())
            .with_stop_on_failure(self.stop_on_failure)
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let config = cli.config.to_runner_config()?;

    match cli.command {
        Command::TestsRun(args) => execute_tests_run(&args, &config),
    }
}

/// Handle the `tests:run` subcommand.
fn execute_tests_run(args: &TestsRunArgs, config: &RunnerConfig) -> CliResult<ExitCode> {
    let request = args.to_request();

    let toolchain = SystemToolchain::new(&config.php, &config.php_config);
    let mut prompt = ConsolePrompt::stdio();
    let mut reporter = ConsoleReporter::stdout();
    let mut inherited = InheritedSpawner;
    let mut dry_run = DryRunSpawner::default();
    let spawner: &mut dyn ProcessSpawner = if args.dry_run { &mut dry_run } else { &mut inherited };

    let summary = test_runner::run_tests(
        &request,
        config,
        RunContext {
            toolchain: &toolchain,
            prompt: &mut prompt,
            spawner,
            reporter: &mut reporter,
        },
    )?;

    Ok(exit_code_for(&summary, args.fail_on_error))
}

/// Process exit code for a finished run.
///
/// Runner failures only affect the exit code when `fail_on_error` is set.
pub fn exit_code_for(summary: &RunSummary, fail_on_error: bool) -> ExitCode {
    if !fail_on_error {
        return ExitCode::SUCCESS;
    }
    summary.first_failure_code().map_or(ExitCode::SUCCESS, ExitCode)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use test_runner::{InvocationOutcome, InvocationStatus, InvocationTarget};

    fn tests_run(cli: Cli) -> TestsRunArgs {
        match cli.command {
            Command::TestsRun(args) => args,
        }
    }

    #[test]
    fn test_cli_parse_defaults() {
        let cli = Cli::try_parse_from(["suiterun", "tests:run"]).unwrap();
        let args = tests_run(cli);
        assert_eq!(args.group, None);
        assert_eq!(args.options, None);
        assert!(!args.xhprof);
        assert!(!args.dry_run);

        let request = args.to_request();
        assert!(request.groups.is_empty());
        assert_eq!(request.options, "");
    }

    #[test]
    fn test_cli_parse_groups_and_options() {
        let cli = Cli::try_parse_from(["suiterun", "tests:run", "core,ui", "-o", "--coverage-html /tmp/cov"]).unwrap();
        let request = tests_run(cli).to_request();
        assert_eq!(request.groups, vec!["Core", "Ui"]);
        assert_eq!(request.options, "--coverage-html /tmp/cov");
        assert!(request.use_coverage());
    }

    #[test]
    fn test_cli_parse_long_options_with_equals() {
        let cli = Cli::try_parse_from(["suiterun", "tests:run", "--options=--filter=testFoo"]).unwrap();
        assert_eq!(tests_run(cli).options.as_deref(), Some("--filter=testFoo"));
    }

    #[test]
    fn test_cli_parse_bare_options_flag() {
        let cli = Cli::try_parse_from(["suiterun", "tests:run", "core", "-o"]).unwrap();
        let args = tests_run(cli);
        assert_eq!(args.options.as_deref(), Some(""));
        assert_eq!(args.to_request().options, "");

        let cli = Cli::try_parse_from(["suiterun", "tests:run", "--options"]).unwrap();
        assert_eq!(tests_run(cli).options.as_deref(), Some(""));
    }

    #[test]
    fn test_cli_parse_flags() {
        let cli = Cli::try_parse_from([
            "suiterun",
            "tests:run",
            "--xhprof",
            "--file",
            "Core/SomeTest.php",
            "-x",
            "--fail-on-error",
            "--dry-run",
        ])
        .unwrap();
        let args = tests_run(cli);
        assert!(args.xhprof);
        assert!(args.stop_on_failure);
        assert!(args.fail_on_error);
        assert!(args.dry_run);

        let request = args.to_request();
        assert!(request.use_profiler);
        assert_eq!(request.target_file(), Some("Core/SomeTest.php"));
    }

    #[test]
    fn test_cli_parse_global_config() {
        let cli = Cli::try_parse_from([
            "suiterun",
            "tests:run",
            "--document-root",
            "/srv/app",
            "--php",
            "php8.3",
            "--php-config",
            "php-config8.3",
        ])
        .unwrap();
        let config = cli.config.to_runner_config().unwrap();
        assert_eq!(config.document_root, PathBuf::from("/srv/app"));
        assert_eq!(config.php, "php8.3");
        assert_eq!(config.php_config, "php-config8.3");
    }

    #[test]
    fn test_relative_document_root_is_made_absolute() {
        let cli = Cli::try_parse_from(["suiterun", "tests:run", "--document-root", "app"]).unwrap();
        let config = cli.config.to_runner_config().unwrap();
        assert!(config.document_root.is_absolute());
        assert!(config.document_root.ends_with("app"));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["suiterun"]).is_err());
    }

    fn summary(statuses: &[InvocationStatus]) -> RunSummary {
        RunSummary {
            outcomes: statuses
                .iter()
                .map(|status| InvocationOutcome {
                    target: InvocationTarget::Group("Core".to_string()),
                    status: status.clone(),
                })
                .collect(),
            halted_early: false,
        }
    }

    #[test]
    fn test_exit_code_ignores_failures_by_default() {
        let summary = summary(&[InvocationStatus::Exited(2)]);
        assert_eq!(exit_code_for(&summary, false), ExitCode::SUCCESS);
    }

    #[test]
    fn test_exit_code_fail_on_error() {
        let summary = summary(&[
            InvocationStatus::Exited(0),
            InvocationStatus::Exited(2),
            InvocationStatus::Exited(3),
        ]);
        assert_eq!(exit_code_for(&summary, true), ExitCode(2));
    }

    #[test]
    fn test_exit_code_fail_on_error_all_passed() {
        let summary = summary(&[InvocationStatus::Exited(0)]);
        assert_eq!(exit_code_for(&summary, true), ExitCode::SUCCESS);
    }

    #[test]
    fn test_test_error_becomes_failure() {
        let err: CliError = TestError::InvalidOptions("unterminated ' quote".to_string()).into();
        assert_eq!(err.exit_code, ExitCode::FAILURE);
        assert!(err.message.contains("unterminated"));
    }
}
