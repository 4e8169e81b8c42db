//! Runner configuration for `tests:run`
//!
//! Paths are resolved against the document root of the application under test; the tool names
//! default to what a stock PHP installation puts on `PATH`.

use std::path::{Path, PathBuf};

/// Groups run when the user does not name any.
pub const DEFAULT_GROUPS: [&str; 4] = ["Core", "Plugins", "Integration", "UI"];

/// Environment variable the test bootstrap checks to enable xhprof profiling.
pub const XHPROF_ENV_VAR: &str = "PIWIK_USE_XHPROF";

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Root directory of the application under test
    pub document_root: PathBuf,
    /// Test-source directory, relative to the document root. Every invocation runs here.
    pub tests_dir: PathBuf,
    /// Runner used when no coverage setup is needed, relative to the document root
    pub runner: PathBuf,
    /// Runner name looked up on `PATH` for coverage runs
    pub runner_name: String,
    /// PHP interpreter binary
    pub php: String,
    /// `php-config` helper binary
    pub php_config: String,
    /// Name of the coverage extension as listed by `php -m`
    pub coverage_extension: String,
    /// Shared-library filename of the coverage extension
    pub coverage_extension_file: String,
    /// Environment variable signalling profiling mode to the runner
    pub profiler_env_var: String,
    /// Groups used when the group argument is empty
    pub default_groups: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            document_root: PathBuf::from("."),
            tests_dir: PathBuf::from("tests/PHPUnit"),
            runner: PathBuf::from("vendor/phpunit/phpunit/phpunit"),
            runner_name: "phpunit".to_string(),
            php: "php".to_string(),
            php_config: "php-config".to_string(),
            coverage_extension: "xdebug".to_string(),
            coverage_extension_file: "xdebug.so".to_string(),
            profiler_env_var: XHPROF_ENV_VAR.to_string(),
            default_groups: DEFAULT_GROUPS.iter().map(|g| g.to_string()).collect(),
        }
    }
}

impl RunnerConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the document root
    pub fn with_document_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.document_root = root.into();
        self
    }

    /// Set the PHP interpreter binary
    pub fn with_php(mut self, php: impl Into<String>) -> Self {
        self.php = php.into();
        self
    }

    /// Set the `php-config` helper binary
    pub fn with_php_config(mut self, php_config: impl Into<String>) -> Self {
        self.php_config = php_config.into();
        self
    }

    /// Replace the fallback group list
    pub fn with_default_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Directory every invocation runs in.
    pub fn working_dir(&self) -> PathBuf {
        self.document_root.join(&self.tests_dir)
    }

    /// Default runner executable.
    ///
    /// Joined onto the document root rather than the working directory, so the path does not
    /// depend on how the platform resolves relative programs against a child's `current_dir`.
    pub fn runner_path(&self) -> PathBuf {
        self.document_root.join(&self.runner)
    }

    /// Expected location of the coverage extension inside an extension directory.
    pub fn coverage_extension_path(&self, extension_dir: &Path) -> PathBuf {
        extension_dir.join(&self.coverage_extension_file)
    }
}
