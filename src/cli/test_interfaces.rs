//! Test runner I/O boundary interfaces
//!
//! This module defines trait-based abstractions for everything `tests:run` does outside its own
//! process:
//! - Toolchain probing (`php -m`, `php-config --extension-dir`, `PATH` lookup)
//! - Interactive prompting (asking for the coverage extension when it cannot be found)
//! - Process spawning (running the test runner with inherited stdio)
//!
//! The orchestration in `test_runner.rs` only talks to these traits, so dry runs and scripted
//! tests swap in different implementations without touching the run logic.

use std::collections::VecDeque;
use std::env;
use std::ffi::OsStr;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;

use super::test_runner::ResolvedCommand;

/// Errors that occur during test operations
#[derive(Debug, Error)]
pub enum TestError {
    #[error("invalid runner options: {0}")]
    InvalidOptions(String),

    #[error("no answer given for prompt: {0}")]
    PromptClosed(String),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Toolchain Interface
// ============================================================================

/// Queries about the local PHP installation.
///
/// Probes never fail hard: a tool that cannot be run reads as "not loaded" or "not found", and
/// the caller falls back to asking the user or to configured defaults.
pub trait Toolchain {
    /// Whether `extension` is loaded by the interpreter.
    fn extension_loaded(&self, extension: &str) -> bool;

    /// The interpreter's extension directory.
    fn extension_dir(&self) -> Option<PathBuf>;

    /// Locate an executable by name, like `which`.
    fn find_executable(&self, name: &str) -> Option<PathBuf>;
}

// ============================================================================
// Prompt Interface
// ============================================================================

/// Asks the user a question until the answer passes validation.
pub trait Prompt {
    /// Ask `question`, re-asking until `validate` accepts the (trimmed) answer.
    ///
    /// There is no retry limit; running out of input is the only way out besides a valid answer.
    fn ask_and_validate(&mut self, question: &str, validate: &dyn Fn(&str) -> bool) -> Result<String, TestError>;
}

// ============================================================================
// Process Spawner Interface
// ============================================================================

/// Runs a resolved command to completion.
pub trait ProcessSpawner {
    /// Run `command` and wait for it.
    ///
    /// Returns the child's exit code, or `None` if it was terminated by a signal.
    fn spawn(&mut self, command: &ResolvedCommand) -> Result<Option<i32>, TestError>;
}

// ============================================================================
// Default Implementations
// ============================================================================

/// Toolchain probes backed by the real `php` and `php-config` binaries.
pub struct SystemToolchain {
    php: String,
    php_config: String,
}

impl SystemToolchain {
    pub fn new(php: impl Into<String>, php_config: impl Into<String>) -> Self {
        Self {
            php: php.into(),
            php_config: php_config.into(),
        }
    }
}

impl Toolchain for SystemToolchain {
    fn extension_loaded(&self, extension: &str) -> bool {
        match capture_stdout(&self.php, &["-m"]) {
            Some(listing) => module_list_contains(&listing, extension),
            None => false,
        }
    }

    fn extension_dir(&self) -> Option<PathBuf> {
        let dir = capture_stdout(&self.php_config, &["--extension-dir"])?;
        let dir = dir.trim();
        if dir.is_empty() { None } else { Some(PathBuf::from(dir)) }
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        let path_var = env::var_os("PATH")?;
        find_in_path(name, &path_var)
    }
}

/// Run a probe command and return its stdout if it exited successfully.
fn capture_stdout(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output();

    match output {
        Ok(output) if output.status.success() => Some(String::from_utf8_lossy(&output.stdout).into_owned()),
        Ok(output) => {
            tracing::debug!(program, ?args, status = %output.status, "toolchain probe exited unsuccessfully");
            None
        }
        Err(e) => {
            tracing::debug!(program, ?args, error = %e, "toolchain probe could not be run");
            None
        }
    }
}

/// Whether a `php -m` listing names `extension`.
///
/// Zend extensions appear with their display name (`Xdebug`), so the match ignores ASCII case.
pub fn module_list_contains(listing: &str, extension: &str) -> bool {
    listing.lines().map(str::trim).any(|line| line.eq_ignore_ascii_case(extension))
}

/// Search the directories of a `PATH`-style value for a file called `name`.
pub fn find_in_path(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    env::split_paths(path_var)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Line-based prompt over a reader/writer pair (stdin/stdout by default).
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompt<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on the process's standard streams.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompt for ConsolePrompt<R, W> {
    fn ask_and_validate(&mut self, question: &str, validate: &dyn Fn(&str) -> bool) -> Result<String, TestError> {
        loop {
            writeln!(self.output, "{question}")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(TestError::PromptClosed(question.to_string()));
            }

            let answer = line.trim();
            if validate(answer) {
                return Ok(answer.to_string());
            }
            tracing::debug!(answer, "prompt answer rejected");
        }
    }
}

/// Non-interactive prompt that replays canned answers.
///
/// Rejected answers are consumed just like the console prompt consumes rejected lines.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    questions: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            questions: Vec::new(),
        }
    }

    /// Every question asked so far, one entry per attempt.
    pub fn questions(&self) -> &[String] {
        &self.questions
    }
}

impl Prompt for ScriptedPrompt {
    fn ask_and_validate(&mut self, question: &str, validate: &dyn Fn(&str) -> bool) -> Result<String, TestError> {
        loop {
            self.questions.push(question.to_string());
            let answer = self
                .answers
                .pop_front()
                .ok_or_else(|| TestError::PromptClosed(question.to_string()))?;
            if validate(answer.as_str()) {
                return Ok(answer);
            }
        }
    }
}

/// Spawns the command with inherited stdio and waits for it.
#[derive(Debug, Default)]
pub struct InheritedSpawner;

impl ProcessSpawner for InheritedSpawner {
    fn spawn(&mut self, command: &ResolvedCommand) -> Result<Option<i32>, TestError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).current_dir(&command.cwd);
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        for key in &command.env_remove {
            cmd.env_remove(key);
        }

        tracing::debug!(program = %command.program.display(), args = ?command.args, cwd = %command.cwd.display(), "spawning");

        let status = cmd.status().map_err(|source| TestError::Spawn {
            program: command.program.display().to_string(),
            source,
        })?;

        Ok(status.code())
    }
}

/// Spawns nothing; every command "exits" successfully.
#[derive(Debug, Default)]
pub struct DryRunSpawner {
    skipped: usize,
}

impl DryRunSpawner {
    /// Number of commands that would have been run.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl ProcessSpawner for DryRunSpawner {
    fn spawn(&mut self, command: &ResolvedCommand) -> Result<Option<i32>, TestError> {
        tracing::debug!(command = %command, "dry run, not spawning");
        self.skipped += 1;
        Ok(Some(0))
    }
}
