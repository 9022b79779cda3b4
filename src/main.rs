//! Soloist - a single-user application server.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use soloist::cli::output;
use soloist::cli::{execute, Cli};
use soloist::core::constants::{LOG_FORMAT_VAR, LOG_VAR};
use soloist::core::settings::RuntimeEnvironment;
use soloist::error::{ConfigError, Error, ProcessError, StoreError};

fn main() {
    let cli = Cli::parse();
    let env = RuntimeEnvironment::capture();

    // The server child logs requests and lifecycle at info by default.
    let filter = EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("soloist=debug,tower_http=debug")
        } else if cli.command.is_serve() {
            EnvFilter::new("soloist=info,tower_http=info")
        } else {
            EnvFilter::new("soloist=warn")
        }
    });
    let json = env.get(LOG_FORMAT_VAR) == Some("json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| {
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
        }))
        .init();

    match execute(cli.command, env) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::error(&e.to_string());
            if let Some(hint) = suggestion(&e) {
                output::hint(hint);
            }
            std::process::exit(1);
        }
    }
}

fn suggestion(error: &Error) -> Option<&'static str> {
    match error {
        Error::Config(ConfigError::NoHomeDir) => Some("set SOLOIST_DATA_DIR to a writable directory"),
        Error::Config(ConfigError::MissingSecret(_)) => {
            Some("remove the empty entry from the secrets file and restart to regenerate it")
        }
        Error::Config(ConfigError::Parse { .. }) => Some("fix or remove the settings file"),
        Error::Store(StoreError::Write { .. } | StoreError::CreateDir { .. }) => {
            Some("check permissions on the data directory")
        }
        Error::Store(StoreError::Migrate(_)) => Some("the database schema is unknown; restore it or move it aside"),
        Error::Process(ProcessError::Bind { .. }) => {
            Some("is another server already running? try --port")
        }
        _ => None,
    }
}
