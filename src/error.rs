//! Error types.
//!
//! Errors are grouped by the concern that raised them. Each group except
//! [`AuthError`] converts into the top-level [`Error`] so command handlers
//! can use `?` freely. `AuthError` never leaves a request: it becomes an
//! HTTP response instead.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for every soloist operation.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration problems: missing secrets, bad settings files.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine home directory (set SOLOIST_DATA_DIR)")]
    NoHomeDir,

    #[error("{0} is not set or empty")]
    MissingSecret(&'static str),

    #[error("failed to read settings file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Persistence failures. None of these fall back to a default.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("operator identity could not be resolved")]
    IdentityMissing,
}

/// Failures launching, waiting on, or signalling the server process.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for server process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("failed to install signal handler: {0}")]
    SignalHandler(#[source] std::io::Error),

    #[error("failed to forward signal to pid {pid}: {reason}")]
    Forward { pid: u32, reason: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not locate the soloist executable: {0}")]
    CurrentExe(#[source] std::io::Error),
}

/// Request authentication failures.
///
/// `MalformedHeader` and `InvalidToken` are caller errors; `NotConfigured`
/// and `Store` are deployment faults and must stay distinguishable from them.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid authorization header")]
    MalformedHeader,

    #[error("SOLOIST_API_TOKEN is not configured")]
    NotConfigured,

    #[error("invalid token")]
    InvalidToken,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Whether the failure is the caller's fault (as opposed to the server's).
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Self::MalformedHeader | Self::InvalidToken)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(StoreError::Database(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
