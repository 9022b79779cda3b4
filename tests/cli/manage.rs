//! Tests for `soloist migrate` and `soloist collectstatic`.

use crate::support::*;

#[test]
fn test_migrate_creates_database() {
    let t = Test::new();
    let output = t.migrate();

    assert_success(&output);
    assert_stdout_contains(&output, "migrations applied");
    assert!(t.data_dir().join("db.sqlite3").exists());
    assert!(t.env_file().exists());
}

#[test]
fn test_migrate_is_idempotent() {
    let t = Test::new();
    assert_success(&t.migrate());
    assert_success(&t.migrate());
}

#[test]
fn test_collectstatic_copies_then_skips() {
    let t = Test::new();

    let first = t.collectstatic();
    assert_success(&first);
    assert_stdout_contains(&first, "0 unchanged");
    assert!(t.data_dir().join("static").join("index.html").exists());

    let second = t.collectstatic();
    assert_success(&second);
    assert_stdout_contains(&second, "0 static files copied");
}

#[test]
fn test_settings_file_relocates_database() {
    let t = Test::new();
    let db = t.data_dir().join("custom").join("app.db");
    let settings = t.data_dir().join("settings.toml");
    std::fs::create_dir_all(db.parent().unwrap()).unwrap();
    std::fs::write(
        &settings,
        format!("[database]\npath = {:?}\n", db.display().to_string()),
    )
    .unwrap();

    let output = t.migrate();
    assert_success(&output);
    assert!(db.exists());
    assert!(!t.data_dir().join("db.sqlite3").exists());
}

#[test]
fn test_completions_generate() {
    let t = Test::new();
    let output = t.cmd().args(["completions", "bash"]).output().unwrap();

    assert_success(&output);
    assert_stdout_contains(&output, "soloist");
}
