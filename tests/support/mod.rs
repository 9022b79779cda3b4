//! Test support utilities for soloist integration tests.
//!
//! Provides an isolated data directory per test and helper commands.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod server;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use server::*;

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test environment with isolated temp directories.
///
/// No process-global state is mutated; every child command gets its data
/// directory and HOME through its own environment so tests run in parallel.
pub struct Test {
    /// Data directory handed to soloist via SOLOIST_DATA_DIR
    pub data: TempDir,
    /// Temporary home directory
    pub home: TempDir,
}

impl Test {
    pub fn new() -> Self {
        let data = TempDir::new().expect("failed to create temp data dir");
        let home = TempDir::new().expect("failed to create temp home");

        Self { data, home }
    }

    /// Create a test environment whose secrets file already holds `contents`.
    pub fn with_env_file(contents: &str) -> Self {
        let t = Self::new();
        std::fs::write(t.env_file(), contents).expect("failed to write .env");
        t
    }

    pub fn data_dir(&self) -> &Path {
        self.data.path()
    }

    pub fn env_file(&self) -> PathBuf {
        self.data.path().join(".env")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.data.path().join("server.pid")
    }

    pub fn read_env_file(&self) -> String {
        std::fs::read_to_string(self.env_file()).expect("failed to read .env")
    }
}
