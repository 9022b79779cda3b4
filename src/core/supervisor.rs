//! Server process supervision.
//!
//! The supervisor launches the HTTP server as a child process, waits for it,
//! and forwards interrupt/terminate signals to it. It is the only owner of
//! the child: nothing else signals or reaps it. The child runs in its own
//! process group so a terminal Ctrl-C reaches it only through the
//! supervisor.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::core::settings::RuntimeEnvironment;
use crate::error::ProcessError;

/// What to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// `host:port` the server binds, if this is a server launch.
    pub bind: Option<String>,
    pub workers: usize,
}

impl LaunchSpec {
    /// Launch `program serve` with the given bind address and worker count.
    ///
    /// `reload` makes the server restart itself when its executable changes.
    pub fn server(
        program: impl Into<PathBuf>,
        host: &str,
        port: u16,
        workers: usize,
        reload: bool,
    ) -> Self {
        let mut args = vec![
            "serve".to_string(),
            "--host".to_string(),
            host.to_string(),
            "--port".to_string(),
            port.to_string(),
            "--workers".to_string(),
            workers.to_string(),
        ];
        if reload {
            args.push("--reload".to_string());
        }

        Self {
            program: program.into(),
            args,
            bind: Some(format!("{}:{}", host, port)),
            workers,
        }
    }

    /// Launch an arbitrary command.
    pub fn command<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            bind: None,
            workers: 1,
        }
    }
}

/// How a child process ended, if it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Running,
    Exited(i32),
    Killed(i32),
}

impl From<ExitStatus> for ExitState {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Killed(signal);
            }
        }

        Self::Exited(1)
    }
}

/// A running child process.
#[derive(Debug)]
pub struct ServerProcessHandle {
    bind: Option<String>,
    workers: usize,
    pid: u32,
    state: ExitState,
    child: Child,
}

impl ServerProcessHandle {
    pub fn bind(&self) -> Option<&str> {
        self.bind.as_deref()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> ExitState {
        self.state
    }

    async fn wait(&mut self) -> Result<ExitState, ProcessError> {
        let status = self.child.wait().await.map_err(ProcessError::Wait)?;
        self.state = status.into();
        Ok(self.state)
    }

    fn kill(&mut self) -> Result<(), ProcessError> {
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(ProcessError::Forward {
                pid: self.pid,
                reason: e.to_string(),
            }),
        }
    }
}

/// Signals the supervisor passes on to its child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardSignal {
    Interrupt,
    Terminate,
}

/// Delivers a forwarded signal to a launched child.
pub trait SignalForwarder: Send + Sync {
    fn forward(&self, pid: u32, signal: ForwardSignal) -> Result<(), ProcessError>;
}

/// Signals the child's whole process group.
///
/// Elsewhere the child shares the console and receives Ctrl-C directly,
/// so forwarding is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessGroupForwarder;

impl SignalForwarder for ProcessGroupForwarder {
    fn forward(&self, pid: u32, signal: ForwardSignal) -> Result<(), ProcessError> {
        debug!(pid, ?signal, "forwarding signal");

        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            let sig = match signal {
                ForwardSignal::Interrupt => Signal::SIGINT,
                ForwardSignal::Terminate => Signal::SIGTERM,
            };
            let raw = i32::try_from(pid).map_err(|e| ProcessError::Forward {
                pid,
                reason: e.to_string(),
            })?;
            match killpg(Pid::from_raw(raw), sig) {
                // Already gone; the pending wait will observe the exit.
                Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
                Err(e) => Err(ProcessError::Forward {
                    pid,
                    reason: e.to_string(),
                }),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = signal;
            Ok(())
        }
    }
}

/// Source of shutdown requests directed at the supervisor.
#[async_trait]
pub trait SignalSource: Send {
    async fn recv(&mut self) -> ForwardSignal;
}

/// The process's own SIGINT/SIGTERM (Ctrl-C elsewhere).
pub struct OsSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl OsSignals {
    /// Install handlers. Must happen before the child is spawned so no
    /// signal is lost in between.
    pub fn install() -> Result<Self, ProcessError> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            Ok(Self {
                interrupt: signal(SignalKind::interrupt()).map_err(ProcessError::SignalHandler)?,
                terminate: signal(SignalKind::terminate()).map_err(ProcessError::SignalHandler)?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }
}

#[async_trait]
impl SignalSource for OsSignals {
    async fn recv(&mut self) -> ForwardSignal {
        #[cfg(unix)]
        {
            tokio::select! {
                Some(()) = self.interrupt.recv() => ForwardSignal::Interrupt,
                Some(()) = self.terminate.recv() => ForwardSignal::Terminate,
                else => std::future::pending().await,
            }
        }

        #[cfg(not(unix))]
        {
            match tokio::signal::ctrl_c().await {
                Ok(()) => ForwardSignal::Interrupt,
                Err(_) => std::future::pending().await,
            }
        }
    }
}

#[async_trait]
impl SignalSource for tokio::sync::mpsc::Receiver<ForwardSignal> {
    async fn recv(&mut self) -> ForwardSignal {
        match tokio::sync::mpsc::Receiver::recv(self).await {
            Some(signal) => signal,
            None => std::future::pending().await,
        }
    }
}

/// Supervisor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    NotStarted,
    Launching,
    Running { pid: u32 },
    Exited(i32),
    Interrupted,
}

/// Terminal result of a supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The child exited on its own with this code.
    Exited(i32),
    /// A signal was forwarded and the child has since exited.
    Interrupted,
}

impl Outcome {
    /// Exit code the supervisor itself should report.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::Interrupted => 0,
        }
    }
}

/// Launches and waits on exactly one child.
pub struct Supervisor {
    state: SupervisorState,
    forwarder: Box<dyn SignalForwarder>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

enum Event {
    Exited(Result<ExitState, ProcessError>),
    Signal(ForwardSignal),
}

impl Supervisor {
    pub fn new() -> Self {
        Self::with_forwarder(ProcessGroupForwarder)
    }

    /// Use `forwarder` to pass shutdown signals on to the child.
    pub fn with_forwarder(forwarder: impl SignalForwarder + 'static) -> Self {
        Self {
            state: SupervisorState::NotStarted,
            forwarder: Box::new(forwarder),
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Run `spec` under the process's own signals.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError` if the child cannot be launched or waited on.
    /// A nonzero child exit is an `Outcome`, not an error.
    pub async fn run(
        &mut self,
        spec: &LaunchSpec,
        env: &RuntimeEnvironment,
    ) -> Result<Outcome, ProcessError> {
        let mut signals = OsSignals::install()?;
        self.run_with(spec, env, &mut signals).await
    }

    /// Run `spec`, treating anything from `signals` as a shutdown request.
    ///
    /// The child gets exactly `env` as its environment. Returns only once
    /// the child has exited, including when forwarding a signal fails: the
    /// child is then killed, waited on, and the forwarding error returned.
    /// A second signal while waiting for a graceful exit kills the child.
    pub async fn run_with(
        &mut self,
        spec: &LaunchSpec,
        env: &RuntimeEnvironment,
        signals: &mut dyn SignalSource,
    ) -> Result<Outcome, ProcessError> {
        self.state = SupervisorState::Launching;
        let mut handle = match launch(spec, env) {
            Ok(handle) => handle,
            Err(e) => {
                self.state = SupervisorState::NotStarted;
                return Err(e);
            }
        };
        self.state = SupervisorState::Running { pid: handle.pid() };
        info!(pid = handle.pid(), bind = ?handle.bind(), workers = handle.workers(), "server process started");

        let event = tokio::select! {
            result = handle.wait() => Event::Exited(result),
            signal = signals.recv() => Event::Signal(signal),
        };

        let outcome = match event {
            Event::Exited(result) => {
                let code = match result? {
                    ExitState::Exited(code) => code,
                    ExitState::Killed(signal) => 128 + signal,
                    ExitState::Running => 1,
                };
                self.state = SupervisorState::Exited(code);
                Outcome::Exited(code)
            }
            Event::Signal(signal) => {
                info!(?signal, "shutdown requested, waiting for server to exit");
                let forwarded = self.forwarder.forward(handle.pid(), signal);
                if let Err(e) = &forwarded {
                    warn!(pid = handle.pid(), error = %e, "could not forward signal, killing server process");
                    if let Err(e) = handle.kill() {
                        warn!(pid = handle.pid(), error = %e, "kill failed, still waiting");
                    }
                }

                let state = drain(&mut handle, signals).await?;
                debug!(?state, "server process exited after signal");
                self.state = SupervisorState::Interrupted;
                forwarded?;
                Outcome::Interrupted
            }
        };

        Ok(outcome)
    }
}

fn launch(spec: &LaunchSpec, env: &RuntimeEnvironment) -> Result<ServerProcessHandle, ProcessError> {
    debug!(program = %spec.program.display(), args = ?spec.args, "launching");

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .env_clear()
        .envs(env.iter())
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(false);

    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: spec.program.display().to_string(),
        source,
    })?;
    let pid = child.id().ok_or_else(|| ProcessError::Spawn {
        program: spec.program.display().to_string(),
        source: std::io::Error::other("process exited before its pid was read"),
    })?;

    Ok(ServerProcessHandle {
        bind: spec.bind.clone(),
        workers: spec.workers,
        pid,
        state: ExitState::Running,
        child,
    })
}

/// Wait for the child after a forwarded signal, escalating to a kill on
/// any further signal. Errors only if the wait itself fails.
async fn drain(
    handle: &mut ServerProcessHandle,
    signals: &mut dyn SignalSource,
) -> Result<ExitState, ProcessError> {
    loop {
        let event = tokio::select! {
            result = handle.wait() => Event::Exited(result),
            signal = signals.recv() => Event::Signal(signal),
        };

        match event {
            Event::Exited(result) => return result,
            Event::Signal(_) => {
                warn!(pid = handle.pid(), "second signal received, killing server process");
                if let Err(e) = handle.kill() {
                    warn!(pid = handle.pid(), error = %e, "kill failed, still waiting");
                }
            }
        }
    }
}
