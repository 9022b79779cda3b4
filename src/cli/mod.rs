//! Command-line interface.

pub mod completions;
pub mod manage;
pub mod output;
pub mod server;

use clap::{Args, Parser, Subcommand};

use crate::core::constants::{DEFAULT_HOST, DEFAULT_PORT};
use crate::core::settings::RuntimeEnvironment;
use crate::error::Result;
use crate::server::{self as http, ServeOptions};

/// Soloist - a single-user application server.
#[derive(Parser)]
#[command(
    name = "soloist",
    about = "Single-user application server with bearer-token auth",
    version
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Start the server
    Server(ServerArgs),

    /// Run the HTTP server in the foreground (launched by `server`)
    #[command(hide = true)]
    Serve(ServeArgs),

    /// Apply database migrations
    Migrate,

    /// Copy bundled static files into the static root
    Collectstatic,

    /// Print the API token
    Token,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options for `soloist server`.
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Host to bind to
    #[arg(long, default_value = DEFAULT_HOST, env = "SOLOIST_HOST")]
    pub host: String,

    /// Port to bind to
    #[arg(long, default_value_t = DEFAULT_PORT, env = "SOLOIST_PORT")]
    pub port: u16,

    /// Number of worker threads
    #[arg(
        long,
        default_value_t = 1,
        env = "SOLOIST_WORKERS",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub workers: u16,

    /// Restart the server when its executable changes (development only)
    #[arg(long)]
    pub reload: bool,

    /// Skip running migrations on startup
    #[arg(long)]
    pub skip_migrations: bool,

    /// Skip collecting static files on startup
    #[arg(long)]
    pub skip_collectstatic: bool,
}

/// Options for the hidden `serve` command.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    #[arg(long)]
    pub reload: bool,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

impl Command {
    /// Whether this command is the long-running HTTP server.
    pub fn is_serve(&self) -> bool {
        matches!(self, Self::Serve(_))
    }
}

/// Execute a command against the given environment.
///
/// Returns the process exit code.
pub fn execute(command: Command, env: RuntimeEnvironment) -> Result<i32> {
    match command {
        Command::Server(args) => server::execute(args, env),
        Command::Serve(args) => {
            http::serve(
                env,
                ServeOptions {
                    host: args.host,
                    port: args.port,
                    workers: usize::from(args.workers),
                    reload: args.reload,
                },
            )?;
            Ok(0)
        }
        Command::Migrate => manage::migrate(env).map(|()| 0),
        Command::Collectstatic => manage::collectstatic(env).map(|()| 0),
        Command::Token => manage::token(env).map(|()| 0),
        Command::Completions { shell } => completions::execute(shell).map(|()| 0),
    }
}
