//! Constants used throughout soloist.
//!
//! Centralizes environment variable names, file names, and defaults.

/// Environment variable overriding the data directory.
pub const DATA_DIR_VAR: &str = "SOLOIST_DATA_DIR";

/// Data directory relative to HOME (~/.soloist).
pub const DEFAULT_DATA_DIR: &str = ".soloist";

/// Signing key secret name.
pub const SECRET_KEY_VAR: &str = "SOLOIST_SECRET_KEY";

/// API bearer token secret name.
pub const API_TOKEN_VAR: &str = "SOLOIST_API_TOKEN";

/// Environment variable pointing at the settings file.
pub const SETTINGS_VAR: &str = "SOLOIST_SETTINGS";

/// Log filter environment variable (EnvFilter syntax).
pub const LOG_VAR: &str = "SOLOIST_LOG";

/// Set to `json` to emit JSON log lines.
pub const LOG_FORMAT_VAR: &str = "SOLOIST_LOG_FORMAT";

/// Secrets file name inside the data directory.
pub const ENV_FILE: &str = ".env";

/// Settings file name inside the data directory.
pub const SETTINGS_FILE: &str = "settings.toml";

/// sqlite database file name inside the data directory.
pub const DATABASE_FILE: &str = "db.sqlite3";

/// Collected static assets directory inside the data directory.
pub const STATIC_DIR: &str = "static";

/// Pid file written by the running server.
pub const PID_FILE: &str = "server.pid";

/// Header written at the top of the secrets file.
pub const ENV_FILE_HEADER: &[&str] = &[
    "# Auto-generated environment file for soloist",
    "# Do not commit this file to version control",
];

/// Random bytes behind the signing key (67 base64url characters).
pub const SECRET_KEY_BYTES: usize = 50;

/// Random bytes behind the API token (43 base64url characters).
pub const API_TOKEN_BYTES: usize = 32;

/// Secrets every data directory must hold, with their entropy in bytes.
pub const REQUIRED_SECRETS: &[(&str, usize)] = &[
    (SECRET_KEY_VAR, SECRET_KEY_BYTES),
    (API_TOKEN_VAR, API_TOKEN_BYTES),
];

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8000;

/// Fixed attributes of the lazily created operator identity.
pub const OPERATOR_USERNAME: &str = "admin";
pub const OPERATOR_EMAIL: &str = "admin@localhost";

/// Authorization scheme accepted by the authenticator.
pub const BEARER_SCHEME: &str = "Bearer";
