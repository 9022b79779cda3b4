//! Tests for `soloist server` supervision, run against the real binary.

#![cfg(unix)]

use crate::support::*;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::net::TcpListener;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;

const STARTUP: Duration = Duration::from_secs(30);
const SHUTDOWN: Duration = Duration::from_secs(30);

#[test]
fn test_child_exit_code_is_propagated() {
    let t = Test::new();
    // Hold the port so the server process fails to bind and exits 1.
    let blocker = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port().to_string();

    let output = t
        .cmd()
        .args(["server", "--port", &port, "--skip-collectstatic"])
        .timeout(SHUTDOWN)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert_stderr_contains(&output, "failed to bind");
    assert_stderr_contains(&output, "server exited with error: 1");
    assert!(!t.pid_file().exists());
}

#[test]
fn test_startup_output_and_steps() {
    let t = Test::new();
    let blocker = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port().to_string();

    let output = t
        .cmd()
        .args(["server", "--port", &port])
        .timeout(SHUTDOWN)
        .output()
        .unwrap();

    let token = t.token_value();
    assert_stdout_contains(&output, &token);
    assert_stdout_contains(&output, "Running migrations... ok");
    assert_stdout_contains(&output, "Collecting static files... ok");
    assert_stdout_contains(&output, &format!("Starting server at http://127.0.0.1:{}", port));
    assert!(t.data_dir().join("db.sqlite3").exists());
    assert!(t.data_dir().join("static").join("index.html").exists());
}

#[test]
fn test_skip_flags_skip_steps() {
    let t = Test::new();
    let blocker = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port().to_string();

    let output = t
        .cmd()
        .args([
            "server",
            "--port",
            &port,
            "--skip-migrations",
            "--skip-collectstatic",
        ])
        .timeout(SHUTDOWN)
        .output()
        .unwrap();

    let out = stdout(&output);
    assert!(!out.contains("Running migrations"));
    assert!(!out.contains("Collecting static files"));
    assert!(!t.data_dir().join("static").exists());
}

#[test]
fn test_interrupt_stops_server_cleanly() {
    let t = Test::new();
    let token = t.token_value();
    let port = free_port();

    let mut supervisor = t
        .std_cmd()
        .args(["server", "--port", &port.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    assert!(
        wait_for_file(&t.pid_file(), STARTUP),
        "server did not start"
    );
    let server_pid = read_pid(&t.pid_file());
    assert_ne!(server_pid, supervisor.id() as i32);

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::blocking::Client::new();

    let health = client.get(format!("{}/health", base)).send().unwrap();
    assert_eq!(health.status(), 200);

    let anonymous = client.get(format!("{}/api/me", base)).send().unwrap();
    assert_eq!(anonymous.status(), 401);

    let wrong = client
        .get(format!("{}/api/me", base))
        .bearer_auth("not-the-token")
        .send()
        .unwrap();
    assert_eq!(wrong.status(), 401);

    let me: serde_json::Value = client
        .get(format!("{}/api/me", base))
        .bearer_auth(&token)
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(me["username"], "admin");

    kill(Pid::from_raw(supervisor.id() as i32), Signal::SIGINT).unwrap();
    let status = wait_with_timeout(&mut supervisor, SHUTDOWN);
    let output = supervisor.wait_with_output().unwrap();

    assert_eq!(status.code(), Some(0));
    assert_stdout_contains(&output, "server stopped");
    assert!(!t.pid_file().exists());
    assert!(!process_exists(server_pid));
}

#[test]
fn test_terminate_stops_server_cleanly() {
    let t = Test::new();
    let port = free_port();

    let mut supervisor = t
        .std_cmd()
        .args([
            "server",
            "--port",
            &port.to_string(),
            "--skip-collectstatic",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    assert!(
        wait_for_file(&t.pid_file(), STARTUP),
        "server did not start"
    );
    let server_pid = read_pid(&t.pid_file());

    kill(Pid::from_raw(supervisor.id() as i32), Signal::SIGTERM).unwrap();
    let status = wait_with_timeout(&mut supervisor, SHUTDOWN);

    assert_eq!(status.code(), Some(0));
    assert!(!process_exists(server_pid));
}

#[test]
fn test_identity_is_created_once_across_restarts() {
    let t = Test::new();
    let token = t.token_value();

    let mut ids = Vec::new();
    for _ in 0..2 {
        let port = free_port();
        let mut supervisor = t
            .std_cmd()
            .args([
                "server",
                "--port",
                &port.to_string(),
                "--workers",
                "2",
                "--skip-collectstatic",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        assert!(wait_for_file(&t.pid_file(), STARTUP), "server did not start");

        let me: serde_json::Value = reqwest::blocking::Client::new()
            .get(format!("http://127.0.0.1:{}/api/me", port))
            .bearer_auth(&token)
            .send()
            .unwrap()
            .json()
            .unwrap();
        ids.push(me["id"].clone());

        kill(Pid::from_raw(supervisor.id() as i32), Signal::SIGINT).unwrap();
        wait_with_timeout(&mut supervisor, SHUTDOWN);
        assert!(!t.pid_file().exists());
    }

    assert_eq!(ids[0], ids[1]);
}

#[test]
fn test_reload_survives_replaced_executable() {
    let t = Test::new();
    let token = t.token_value();
    let port = free_port();

    // Run from a private copy so the test can replace it the way a rebuild does.
    let bin_dir = TempDir::new().unwrap();
    let exe = bin_dir.path().join("soloist");
    std::fs::copy(env!("CARGO_BIN_EXE_soloist"), &exe).unwrap();

    let mut supervisor = t
        .std_cmd_for(&exe)
        .args([
            "server",
            "--port",
            &port.to_string(),
            "--reload",
            "--skip-collectstatic",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    assert!(wait_for_file(&t.pid_file(), STARTUP), "server did not start");
    let server_pid = read_pid(&t.pid_file());

    let client = reqwest::blocking::Client::new();
    let status_url = format!("http://127.0.0.1:{}/api/status", port);
    let started_at = |client: &reqwest::blocking::Client| -> Option<String> {
        let response = client.get(&status_url).bearer_auth(&token).send().ok()?;
        let body: serde_json::Value = response.json().ok()?;
        body["started_at"].as_str().map(str::to_string)
    };
    let first_start = started_at(&client).expect("status endpoint did not answer");

    // Keep the new timestamp clear of the old one on coarse filesystems.
    std::thread::sleep(Duration::from_millis(1100));
    std::fs::remove_file(&exe).unwrap();
    std::fs::copy(env!("CARGO_BIN_EXE_soloist"), &exe).unwrap();

    let restarted = wait_until(STARTUP, || {
        started_at(&client).filter(|started| *started != first_start)
    });
    assert!(restarted.is_some(), "server did not come back after reload");

    let health = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .unwrap();
    assert_eq!(health.status(), 200);
    assert!(wait_for_file(&t.pid_file(), STARTUP));
    assert_eq!(read_pid(&t.pid_file()), server_pid);
    assert!(supervisor.try_wait().unwrap().is_none());

    kill(Pid::from_raw(supervisor.id() as i32), Signal::SIGINT).unwrap();
    let status = wait_with_timeout(&mut supervisor, SHUTDOWN);
    assert_eq!(status.code(), Some(0));
    assert!(!process_exists(server_pid));
}
