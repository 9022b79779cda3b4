//! The HTTP service.
//!
//! Runs inside the child process launched by the supervisor. It reads its
//! configuration from the environment the supervisor prepared, serves until
//! it receives SIGINT/SIGTERM, then shuts down gracefully.

pub mod auth;
pub mod reload;
pub mod routes;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::core::constants::PID_FILE;
use crate::core::settings::{RuntimeEnvironment, Settings};
use crate::core::store::{self, SqliteIdentityStore};
use crate::core::supervisor::{OsSignals, SignalSource};
use crate::error::{ProcessError, Result};

pub use auth::SingleUserAuthenticator;
pub use routes::create_router;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<SingleUserAuthenticator>,
    pub workers: usize,
    pub started_at: DateTime<Utc>,
}

/// Bind and runtime options for the server process.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub reload: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ShutdownReason {
    Signal,
    /// The executable at this path, resolved at startup, was replaced.
    Reload(PathBuf),
}

/// Run the server to completion on a runtime with `options.workers`
/// worker threads.
///
/// # Errors
///
/// Returns configuration, persistence, or bind failures. The process exit
/// code the supervisor sees is derived from these.
pub fn serve(env: RuntimeEnvironment, options: ServeOptions) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(options.workers.max(1))
        .enable_all()
        .build()?;

    let reason = runtime.block_on(run(&env, &options))?;
    drop(runtime);

    if let ShutdownReason::Reload(exe) = reason {
        #[cfg(unix)]
        {
            return Err(reload::reexec(&exe));
        }
        #[cfg(not(unix))]
        {
            let _ = exe;
        }
    }

    Ok(())
}

async fn run(env: &RuntimeEnvironment, options: &ServeOptions) -> Result<ShutdownReason> {
    let settings = Arc::new(Settings::from_env(env)?);
    debug!(?settings, "settings resolved");

    if settings.api_token().is_none() {
        warn!("API token is not configured; every authenticated request will fail");
    }

    let pool = store::connect(&settings.database_path, connection_limit(options.workers)).await?;
    let identities = Arc::new(SqliteIdentityStore::new(pool.clone()));

    let state = AppState {
        authenticator: Arc::new(SingleUserAuthenticator::new(settings.clone(), identities)),
        workers: options.workers,
        started_at: Utc::now(),
    };
    let app = create_router(state, &settings.static_root);

    let mut signals = OsSignals::install()?;
    let watched = if options.reload { watched_executable() } else { None };

    let addr = format!("{}:{}", options.host, options.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ProcessError::Bind { addr: addr.clone(), source })?;
    let local = listener.local_addr()?;
    info!(
        addr = %local,
        workers = options.workers,
        reload = options.reload,
        "listening"
    );

    let _pid_file = PidFile::create(&settings.data_dir.join(PID_FILE))?;

    let (reason_tx, reason_rx) = oneshot::channel();
    let shutdown = async move {
        let reason = tokio::select! {
            signal = signals.recv() => {
                info!(?signal, "shutting down");
                ShutdownReason::Signal
            }
            exe = wait_for_change(watched) => ShutdownReason::Reload(exe),
        };
        let _ = reason_tx.send(reason);
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    pool.close().await;

    let reason = reason_rx.await.unwrap_or(ShutdownReason::Signal);
    info!(?reason, "server stopped");
    Ok(reason)
}

/// Pool size: one connection per worker plus one spare.
fn connection_limit(workers: usize) -> u32 {
    u32::try_from(workers).unwrap_or(u32::MAX).saturating_add(1)
}

fn watched_executable() -> Option<PathBuf> {
    if cfg!(not(unix)) {
        warn!("--reload is only supported on unix; ignoring");
        return None;
    }

    match reload::current_exe() {
        Ok(exe) => Some(exe),
        Err(e) => {
            warn!(error = %e, "cannot watch executable; reload disabled");
            None
        }
    }
}

/// Resolve with `path` once it changes; never resolves without one.
async fn wait_for_change(path: Option<PathBuf>) -> PathBuf {
    let Some(path) = path else {
        return std::future::pending().await;
    };

    match reload::watch(&path, reload::POLL_INTERVAL).await {
        Ok(()) => path,
        Err(e) => {
            warn!(error = %e, "reload watcher stopped");
            std::future::pending().await
        }
    }
}

/// Pid file removed when dropped.
struct PidFile {
    path: PathBuf,
}

impl PidFile {
    fn create(path: &Path) -> Result<Self> {
        std::fs::write(path, format!("{}\n", std::process::id())).map_err(|source| {
            crate::error::StoreError::Write {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(error = %e, path = %self.path.display(), "could not remove pid file");
        }
    }
}
