//! Tests for error reporting and exit codes.

use crate::support::*;
use predicates::prelude::*;

#[test]
fn test_invalid_settings_file_fails() {
    let t = Test::new();
    std::fs::write(t.data_dir().join("settings.toml"), "[database\npath = 1").unwrap();

    let output = t.migrate();
    assert_failure(&output);
    assert_eq!(output.status.code(), Some(1));
    assert_stderr_contains(&output, "invalid settings file");
    assert_stderr_contains(&output, "fix or remove the settings file");
}

#[test]
fn test_unknown_settings_key_fails() {
    let t = Test::new();
    std::fs::write(t.data_dir().join("settings.toml"), "debug = true\n").unwrap();

    let output = t.token();
    assert_failure(&output);
    assert_stderr_contains(&output, "invalid settings file");
}

#[test]
fn test_data_dir_that_is_a_file_fails() {
    let t = Test::new();
    let blocker = t.data_dir().join("blocker");
    std::fs::write(&blocker, "").unwrap();

    let output = t
        .cmd()
        .arg("token")
        .env("SOLOIST_DATA_DIR", &blocker)
        .output()
        .unwrap();

    assert_failure(&output);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_empty_secret_key_is_reported() {
    let t = Test::with_env_file("SOLOIST_SECRET_KEY=\n");

    let output = t.token();
    assert_failure(&output);
    assert_stderr_contains(&output, "SOLOIST_SECRET_KEY is not set or empty");
}

#[test]
fn test_unknown_command_fails() {
    let t = Test::new();
    t.cmd()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_zero_workers_rejected() {
    let t = Test::new();
    t.cmd()
        .args(["server", "--workers", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--workers"));
    assert!(!t.env_file().exists());
}

#[test]
fn test_version_flag() {
    let t = Test::new();
    t.cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("soloist "));
}
