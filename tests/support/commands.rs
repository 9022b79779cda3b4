//! Command helper methods for Test.

use super::Test;
use assert_cmd::Command;
use std::path::Path;
use std::process::Output;

/// Variables from the developer's shell that would leak into tests.
const SCRUBBED: &[&str] = &[
    "SOLOIST_API_TOKEN",
    "SOLOIST_SECRET_KEY",
    "SOLOIST_SETTINGS",
    "SOLOIST_HOST",
    "SOLOIST_PORT",
    "SOLOIST_WORKERS",
    "SOLOIST_LOG",
    "SOLOIST_LOG_FORMAT",
];

impl Test {
    /// Create a soloist command bound to this test's directories.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("soloist").expect("failed to find soloist binary");
        for name in SCRUBBED {
            cmd.env_remove(name);
        }
        cmd.env("SOLOIST_DATA_DIR", self.data.path());
        cmd.env("HOME", self.home.path());
        cmd.env("USERPROFILE", self.home.path());
        cmd.env("NO_COLOR", "1");
        cmd
    }

    /// Same environment as [`cmd`](Self::cmd) for a `std` command.
    pub fn std_cmd(&self) -> std::process::Command {
        self.std_cmd_for(Path::new(env!("CARGO_BIN_EXE_soloist")))
    }

    /// Like [`std_cmd`](Self::std_cmd) but running a copy of the binary.
    pub fn std_cmd_for(&self, program: &Path) -> std::process::Command {
        let mut cmd = std::process::Command::new(program);
        for name in SCRUBBED {
            cmd.env_remove(name);
        }
        cmd.env("SOLOIST_DATA_DIR", self.data.path());
        cmd.env("HOME", self.home.path());
        cmd.env("NO_COLOR", "1");
        cmd
    }

    /// Shortcut for `soloist token`.
    pub fn token(&self) -> Output {
        self.cmd()
            .arg("token")
            .output()
            .expect("failed to run soloist token")
    }

    /// The API token as a plain string.
    pub fn token_value(&self) -> String {
        let output = self.token();
        super::assert_success(&output);
        super::stdout(&output).trim().to_string()
    }

    /// Shortcut for `soloist migrate`.
    pub fn migrate(&self) -> Output {
        self.cmd()
            .arg("migrate")
            .output()
            .expect("failed to run soloist migrate")
    }

    /// Shortcut for `soloist collectstatic`.
    pub fn collectstatic(&self) -> Output {
        self.cmd()
            .arg("collectstatic")
            .output()
            .expect("failed to run soloist collectstatic")
    }
}
