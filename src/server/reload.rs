//! Development auto-reload.
//!
//! Watches the running executable and asks the server to restart when it
//! is rebuilt.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use crate::error::{Error, ProcessError};

/// How often the executable is checked.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Resolve once the modification time of `path` differs from its value
/// when watching started and has held still for one more tick.
///
/// A missing file is tolerated while a build is replacing it. Waiting for
/// the new timestamp to settle keeps a half-written file from being
/// executed.
///
/// # Errors
///
/// Returns an error if `path` cannot be inspected when watching starts.
pub async fn watch(path: &Path, interval: Duration) -> std::io::Result<()> {
    let initial = modified(path)?;
    let mut candidate: Option<SystemTime> = None;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match modified(path) {
            Ok(current) if current == initial => candidate = None,
            Ok(current) if candidate == Some(current) => {
                info!(path = %path.display(), "change detected, reloading");
                return Ok(());
            }
            Ok(current) => {
                debug!(path = %path.display(), "executable changed, waiting for it to settle");
                candidate = Some(current);
            }
            Err(e) => {
                debug!(error = %e, "watched file unavailable");
                candidate = None;
            }
        }
    }
}

fn modified(path: &Path) -> std::io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
}

/// Path of the running executable.
pub fn current_exe() -> Result<PathBuf, Error> {
    std::env::current_exe().map_err(|e| ProcessError::CurrentExe(e).into())
}

/// Replace the current process with the executable at `exe`, keeping the
/// same arguments, environment, and pid.
///
/// `exe` must be the path resolved when the server started. Once a rebuild
/// has unlinked the running file, the kernel reports the running image as
/// `<path> (deleted)`, so it cannot be looked up again here.
///
/// Only returns on failure.
#[cfg(unix)]
pub fn reexec(exe: &Path) -> Error {
    use std::os::unix::process::CommandExt;

    let err = std::process::Command::new(exe)
        .args(std::env::args_os().skip(1))
        .exec();
    ProcessError::Spawn {
        program: exe.display().to_string(),
        source: err,
    }
    .into()
}
