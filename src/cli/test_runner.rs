//! `tests:run` implementation
//!
//! ## Flow
//!
//! 1. Split the forwarded options into discrete arguments.
//! 2. Resolve the base command: the suite's own runner, or `php -d zend_extension=… phpunit` when a
//!    coverage report is requested and the extension is not loaded yet.
//! 3. Plan one [`ResolvedCommand`] per group (or a single one for `--file`).
//! 4. Execute the plan sequentially through a [`ProcessSpawner`], announcing each command through a
//!    [`RunReporter`].
//!
//! Child exit codes are collected into a [`RunSummary`]; turning them into the process exit code
//! is left to the caller.

use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use super::config::RunnerConfig;
use super::options::{parse_groups, split_options, substitute_group, wants_coverage};
use super::test_interfaces::{ProcessSpawner, Prompt, TestError, Toolchain};

// ============================================================================
// Data model
// ============================================================================

/// What the user asked `tests:run` to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationRequest {
    /// Parsed group names; empty means "run the default groups"
    pub groups: Vec<String>,
    /// Raw options forwarded to the runner
    pub options: String,
    /// Signal xhprof profiling to the runner
    pub use_profiler: bool,
    /// Single test file, relative to the test-source directory
    pub file: Option<String>,
    /// Halt after the first failing invocation
    pub stop_on_failure: bool,
}

impl InvocationRequest {
    /// Build a request from the raw group argument and forwarded options.
    pub fn new(group_arg: &str, options: impl Into<String>) -> Self {
        Self {
            groups: parse_groups(group_arg),
            options: options.into(),
            ..Self::default()
        }
    }

    pub fn with_profiler(mut self, use_profiler: bool) -> Self {
        self.use_profiler = use_profiler;
        self
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_stop_on_failure(mut self, stop_on_failure: bool) -> Self {
        self.stop_on_failure = stop_on_failure;
        self
    }

    /// Whether the forwarded options request a coverage report.
    pub fn use_coverage(&self) -> bool {
        wants_coverage(&self.options)
    }

    /// The single test file to run, if one was given. An empty path counts as none.
    pub fn target_file(&self) -> Option<&str> {
        self.file.as_deref().filter(|f| !f.is_empty())
    }
}

/// What a command was built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationTarget {
    Group(String),
    File(String),
}

impl fmt::Display for InvocationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationTarget::Group(group) => write!(f, "group {group}"),
            InvocationTarget::File(file) => write!(f, "file {file}"),
        }
    }
}

/// Runner executable plus the arguments every invocation starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseCommand {
    pub program: PathBuf,
    pub prefix_args: Vec<String>,
}

/// A fully resolved runner invocation, ready to hand to a [`ProcessSpawner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub target: InvocationTarget,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Variables set in the child's environment
    pub env: Vec<(String, String)>,
    /// Variables removed from the child's environment
    pub env_remove: Vec<String>,
}

impl ResolvedCommand {
    /// Value of `key` in the child's environment edits, if it is set.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Renders the command the way a shell user would type it.
impl fmt::Display for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program.display().to_string()))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Quote an argument for display. Arguments are never passed through a shell.
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=./:,+@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// How a single invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationStatus {
    Exited(i32),
    /// Terminated without an exit code (killed by a signal)
    Signaled,
    SpawnFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    pub target: InvocationTarget,
    pub status: InvocationStatus,
}

impl InvocationOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == InvocationStatus::Exited(0)
    }

    /// Exit code to report for this outcome if it failed.
    pub fn failure_code(&self) -> Option<i32> {
        match self.status {
            InvocationStatus::Exited(0) => None,
            InvocationStatus::Exited(code) => Some(code),
            InvocationStatus::Signaled | InvocationStatus::SpawnFailed(_) => Some(1),
        }
    }
}

/// Aggregate result of a `tests:run` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<InvocationOutcome>,
    /// Set when `stop_on_failure` skipped remaining commands
    pub halted_early: bool,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Exit code of the first failing invocation.
    pub fn first_failure_code(&self) -> Option<i32> {
        self.outcomes.iter().find_map(InvocationOutcome::failure_code)
    }

    /// Status of the last invocation that ran.
    pub fn last_status(&self) -> Option<&InvocationStatus> {
        self.outcomes.last().map(|o| &o.status)
    }
}

// ============================================================================
// Reporter
// ============================================================================

/// Console-facing progress of a run.
pub trait RunReporter {
    /// Informational line (coverage setup progress)
    fn on_info(&mut self, message: &str);

    /// Called right before a command is spawned
    fn on_command_start(&mut self, command: &ResolvedCommand);

    /// Called after the command has finished (or failed to start)
    fn on_command_complete(&mut self, command: &ResolvedCommand, outcome: &InvocationOutcome);

    /// Called once all commands have run
    fn on_run_complete(&mut self, _summary: &RunSummary) {}
}

/// Default console reporter
///
/// Announcements go to `out`; runners that could not be started are reported on `err`.
pub struct ConsoleReporter<W, E> {
    out: W,
    err: E,
    color: bool,
}

impl ConsoleReporter<io::Stdout, io::Stderr> {
    /// Reporter on stdout/stderr, colored when stdout is a terminal.
    pub fn stdout() -> Self {
        let color = io::stdout().is_terminal();
        Self::new(io::stdout(), io::stderr(), color)
    }
}

impl<W: Write, E: Write> ConsoleReporter<W, E> {
    pub fn new(out: W, err: E, color: bool) -> Self {
        Self { out, err, color }
    }

    fn green(&self, text: &str) -> String {
        if self.color {
            format!("\x1b[32m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn into_parts(self) -> (W, E) {
        (self.out, self.err)
    }
}

impl<W: Write, E: Write> RunReporter for ConsoleReporter<W, E> {
    fn on_info(&mut self, message: &str) {
        let line = self.green(message);
        let _ = writeln!(self.out, "{line}");
    }

    fn on_command_start(&mut self, command: &ResolvedCommand) {
        let rendered = self.green(&command.to_string());
        let _ = writeln!(self.out, "Executing command: {rendered}");
        // The child writes to the same stream
        let _ = self.out.flush();
    }

    fn on_command_complete(&mut self, _command: &ResolvedCommand, outcome: &InvocationOutcome) {
        if let InvocationStatus::SpawnFailed(message) = &outcome.status {
            let _ = writeln!(self.err, "{message}");
        }
        let _ = writeln!(self.out);
    }
}

// ============================================================================
// Orchestration
// ============================================================================

/// External collaborators of a run.
pub struct RunContext<'a> {
    pub toolchain: &'a dyn Toolchain,
    pub prompt: &'a mut dyn Prompt,
    pub spawner: &'a mut dyn ProcessSpawner,
    pub reporter: &'a mut dyn RunReporter,
}

/// Run `tests:run` for `request`.
///
/// Child failures never turn into an `Err`; they are recorded in the returned summary. Errors are
/// reserved for unusable options and an abandoned extension prompt.
pub fn run_tests(
    request: &InvocationRequest,
    config: &RunnerConfig,
    ctx: RunContext<'_>,
) -> Result<RunSummary, TestError> {
    let RunContext {
        toolchain,
        prompt,
        spawner,
        reporter,
    } = ctx;

    let options = split_options(&request.options)?;
    let base = resolve_base_command(request, config, toolchain, prompt, reporter)?;
    let plan = plan_invocations(request, config, &base, &options);

    tracing::debug!(invocations = plan.len(), "planned test runs");

    let summary = execute_plan(plan, spawner, reporter, request.stop_on_failure);

    tracing::info!(
        total = summary.total(),
        failed = summary.failed(),
        halted_early = summary.halted_early,
        "test runs finished"
    );

    Ok(summary)
}

/// Decide which executable runs the tests.
///
/// Without a coverage request, or with the coverage extension already loaded, this is the suite's
/// bundled runner. Otherwise the extension is located (extension directory first, then the user)
/// and loaded explicitly into a `php` process that runs the `phpunit` found on `PATH`.
pub fn resolve_base_command(
    request: &InvocationRequest,
    config: &RunnerConfig,
    toolchain: &dyn Toolchain,
    prompt: &mut dyn Prompt,
    reporter: &mut dyn RunReporter,
) -> Result<BaseCommand, TestError> {
    let default = BaseCommand {
        program: config.runner_path(),
        prefix_args: Vec::new(),
    };

    if !request.use_coverage() {
        return Ok(default);
    }

    let extension = config.coverage_extension.as_str();
    if toolchain.extension_loaded(extension) {
        tracing::debug!(extension, "coverage extension already loaded");
        return Ok(default);
    }

    reporter.on_info(&format!("{extension} extension required for code coverage."));
    reporter.on_info(&format!("searching for {extension} extension..."));

    let discovered = toolchain
        .extension_dir()
        .map(|dir| config.coverage_extension_path(&dir))
        .filter(|path| path.exists());

    let extension_file = match discovered {
        Some(path) => {
            reporter.on_info(&format!("{extension} extension found in extension path."));
            path
        }
        None => {
            let question = format!(
                "{extension} not found. Please provide path to {}",
                config.coverage_extension_file
            );
            let answer = prompt.ask_and_validate(&question, &|answer| Path::new(answer).exists())?;
            // Validated against our cwd; the runner starts in the tests dir
            std::path::absolute(answer)?
        }
    };

    reporter.on_info(&format!("using {} as {extension} extension.", extension_file.display()));

    let runner = toolchain.find_executable(&config.runner_name).unwrap_or_else(|| {
        let fallback = config.runner_path();
        tracing::warn!(
            runner = %config.runner_name,
            fallback = %fallback.display(),
            "runner not found on PATH, using the bundled runner"
        );
        fallback
    });

    Ok(BaseCommand {
        program: PathBuf::from(&config.php),
        prefix_args: vec![
            "-d".to_string(),
            format!("zend_extension={}", extension_file.display()),
            runner.display().to_string(),
        ],
    })
}

/// Build the commands for a request.
///
/// A target file yields exactly one command with the options forwarded untouched. Otherwise each
/// group (or the configured defaults) yields `--group <name>` followed by the options with
/// `%group%` substituted.
pub fn plan_invocations(
    request: &InvocationRequest,
    config: &RunnerConfig,
    base: &BaseCommand,
    options: &[String],
) -> Vec<ResolvedCommand> {
    let (env, env_remove) = if request.use_profiler {
        (vec![(config.profiler_env_var.clone(), "1".to_string())], Vec::new())
    } else {
        (Vec::new(), vec![config.profiler_env_var.clone()])
    };

    let make = |target: InvocationTarget, tail: Vec<String>| {
        let mut args = base.prefix_args.clone();
        args.extend(tail);
        ResolvedCommand {
            target,
            program: base.program.clone(),
            args,
            cwd: config.working_dir(),
            env: env.clone(),
            env_remove: env_remove.clone(),
        }
    };

    if let Some(file) = request.target_file() {
        let mut tail = vec![file.to_string()];
        tail.extend(options.iter().cloned());
        return vec![make(InvocationTarget::File(file.to_string()), tail)];
    }

    let groups = if request.groups.is_empty() {
        &config.default_groups
    } else {
        &request.groups
    };

    groups
        .iter()
        .map(|group| {
            let mut tail = vec!["--group".to_string(), group.clone()];
            tail.extend(substitute_group(options, group));
            make(InvocationTarget::Group(group.clone()), tail)
        })
        .collect()
}

/// Run the planned commands one after the other.
pub fn execute_plan(
    plan: Vec<ResolvedCommand>,
    spawner: &mut dyn ProcessSpawner,
    reporter: &mut dyn RunReporter,
    stop_on_failure: bool,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let total = plan.len();

    for (index, command) in plan.into_iter().enumerate() {
        reporter.on_command_start(&command);

        let status = match spawner.spawn(&command) {
            Ok(Some(code)) => InvocationStatus::Exited(code),
            Ok(None) => InvocationStatus::Signaled,
            Err(e) => {
                tracing::warn!(invocation = %command.target, error = %e, "runner could not be started");
                InvocationStatus::SpawnFailed(e.to_string())
            }
        };

        let outcome = InvocationOutcome {
            target: command.target.clone(),
            status,
        };
        reporter.on_command_complete(&command, &outcome);

        let failed = !outcome.succeeded();
        summary.outcomes.push(outcome);

        if stop_on_failure && failed && index + 1 < total {
            tracing::info!(invocation = %command.target, "stopping after first failure");
            summary.halted_early = true;
            break;
        }
    }

    reporter.on_run_complete(&summary);
    summary
}
