//! End-to-end tests for the `suiterun` binary
//!
//! Runs use `--dry-run` or a stand-in runner script, so no PHP installation is needed.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn suiterun(document_root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_suiterun"))
        .arg("tests:run")
        .args(args)
        .arg("--document-root")
        .arg(document_root)
        .env("RUST_LOG", "off")
        .env_remove("SUITERUN_DOCUMENT_ROOT")
        .output()
        .expect("failed to run suiterun")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn executed_lines(output: &Output) -> Vec<String> {
    stdout(output)
        .lines()
        .filter(|l| l.starts_with("Executing command: "))
        .map(|l| l.to_string())
        .collect()
}

#[test]
fn dry_run_announces_default_groups() {
    let root = tempfile::tempdir().unwrap();
    let output = suiterun(root.path(), &["--dry-run"]);

    assert!(output.status.success());
    let lines = executed_lines(&output);
    assert_eq!(lines.len(), 4);
    for (line, group) in lines.iter().zip(["Core", "Plugins", "Integration", "UI"]) {
        assert!(line.ends_with(&format!("--group {group}")), "unexpected line: {line}");
    }
}

#[test]
fn dry_run_single_file() {
    let root = tempfile::tempdir().unwrap();
    let output = suiterun(
        root.path(),
        &["core,ui", "--dry-run", "--file", "Core/SomeTest.php", "-o", "--filter=testFoo"],
    );

    assert!(output.status.success());
    let lines = executed_lines(&output);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("phpunit Core/SomeTest.php --filter=testFoo"));
}

#[test]
fn bad_quoting_is_a_usage_error() {
    let root = tempfile::tempdir().unwrap();
    let output = suiterun(root.path(), &["core", "--dry-run", "-o", "--filter 'oops"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unterminated"));
    assert!(executed_lines(&output).is_empty());
}

#[test]
fn missing_runner_is_reported_and_exit_stays_zero() {
    let root = tempfile::tempdir().unwrap();
    let output = suiterun(root.path(), &["core,ui"]);

    assert!(output.status.success());
    assert_eq!(executed_lines(&output).len(), 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to run"));
}

#[test]
fn missing_runner_fails_with_fail_on_error() {
    let root = tempfile::tempdir().unwrap();
    let output = suiterun(root.path(), &["core", "--fail-on-error"]);

    assert_eq!(output.status.code(), Some(1));
}

#[cfg(unix)]
fn install_fake_runner(root: &Path, script: &str) {
    use std::os::unix::fs::PermissionsExt;

    let tests_dir = root.join("tests/PHPUnit");
    fs::create_dir_all(&tests_dir).unwrap();

    let runner = root.join("vendor/phpunit/phpunit/phpunit");
    fs::create_dir_all(runner.parent().unwrap()).unwrap();
    fs::write(&runner, script).unwrap();
    fs::set_permissions(&runner, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[test]
fn runner_sees_arguments_environment_and_working_dir() {
    let root = tempfile::tempdir().unwrap();
    install_fake_runner(
        root.path(),
        "#!/bin/sh\necho \"$2 xhprof=${PIWIK_USE_XHPROF:-unset} $(basename \"$(pwd -P)\")\" >> runs.log\n",
    );

    let output = suiterun(root.path(), &["core,ui", "--xhprof"]);
    assert!(output.status.success());

    let log = fs::read_to_string(root.path().join("tests/PHPUnit/runs.log")).unwrap();
    assert_eq!(log, "Core xhprof=1 PHPUnit\nUi xhprof=1 PHPUnit\n");
}

#[cfg(unix)]
#[test]
fn stop_on_failure_and_fail_on_error() {
    let root = tempfile::tempdir().unwrap();
    install_fake_runner(
        root.path(),
        "#!/bin/sh\necho \"$2\" >> runs.log\n[ \"$2\" = Plugins ] && exit 3\nexit 0\n",
    );

    let output = suiterun(root.path(), &["core,plugins,ui", "-x", "--fail-on-error"]);
    assert_eq!(output.status.code(), Some(3));

    let log = fs::read_to_string(root.path().join("tests/PHPUnit/runs.log")).unwrap();
    assert_eq!(log, "Core\nPlugins\n");
}
