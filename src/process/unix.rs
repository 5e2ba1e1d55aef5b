//! Unix-style termination protocol: graceful signal, bounded wait, forceful
//! escalation.
//!
//! The state machine is platform-independent and generic over a
//! [`SignalBackend`]; the real `nix`-based backend is only compiled on Unix
//! targets.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::error::KillError;

/// Default bound on the graceful-termination wait.
pub const GRACEFUL_TIMEOUT: Duration = Duration::from_millis(3000);

/// Bound on the post-escalation wait.
pub const FORCEFUL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Interval between existence probes while waiting.
pub const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Failure of a single signal send or existence probe.
#[derive(Debug, Clone, Error)]
pub enum SignalError {
    /// No process with the given PID.
    #[error("no such process")]
    NotFound,

    /// The caller may not signal the process.
    #[error("operation not permitted")]
    PermissionDenied,

    /// Any other errno.
    #[error("{0}")]
    Other(String),
}

/// Raw signal operations against one PID.
///
/// `exists` is a zero-effect probe (signal 0): it must distinguish "not
/// found" from other errors so the escalation machine can tell a completed
/// termination from a broken one.
pub trait SignalBackend: Send + Sync {
    /// Send the graceful termination signal (SIGTERM).
    fn terminate(&self, pid: u32) -> Result<(), SignalError>;

    /// Send the forceful termination signal (SIGKILL).
    fn kill(&self, pid: u32) -> Result<(), SignalError>;

    /// Probe whether the process still exists, without affecting it.
    fn exists(&self, pid: u32) -> Result<bool, SignalError>;
}

/// States of the escalation machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KillState {
    Running,
    WaitingGraceful,
    Escalate,
}

/// Escalating process killer for Unix-family platforms.
pub struct UnixKiller<B: SignalBackend> {
    backend: B,
    graceful_timeout: Duration,
}

#[cfg(unix)]
impl UnixKiller<NixSignals> {
    /// Create a killer backed by real signal delivery.
    pub fn new() -> Self {
        Self::with_backend(NixSignals)
    }
}

#[cfg(unix)]
impl Default for UnixKiller<NixSignals> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: SignalBackend> UnixKiller<B> {
    /// Create a killer with an injected signal backend.
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            graceful_timeout: GRACEFUL_TIMEOUT,
        }
    }

    /// Override the graceful-wait bound. Escalation timing is otherwise
    /// fixed.
    pub fn graceful_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_timeout = timeout;
        self
    }

    /// Terminate a process: SIGTERM, wait up to the graceful bound, then
    /// SIGKILL.
    ///
    /// Once the forceful signal has been attempted the operation reports
    /// success even if the process lingers (e.g. a zombie): the listener has
    /// been removed to the extent the OS permits.
    pub async fn kill(&self, pid: u32) -> Result<(), KillError> {
        let mut state = KillState::Running;
        loop {
            state = match state {
                KillState::Running => {
                    debug!(pid = pid, "Sending graceful termination signal");
                    match self.backend.terminate(pid) {
                        Ok(()) => KillState::WaitingGraceful,
                        Err(SignalError::NotFound) => return Err(KillError::NotFound(pid)),
                        Err(SignalError::PermissionDenied) => {
                            return Err(KillError::PermissionDenied(pid))
                        }
                        Err(SignalError::Other(message)) => {
                            return Err(KillError::Unknown(message))
                        }
                    }
                }
                KillState::WaitingGraceful => {
                    if self.wait_for_exit(pid, self.graceful_timeout).await? {
                        debug!(pid = pid, "Process exited after graceful signal");
                        return Ok(());
                    }
                    KillState::Escalate
                }
                KillState::Escalate => {
                    debug!(pid = pid, "Graceful wait elapsed; sending forceful signal");
                    // The process may exit in the interstitial window; a send
                    // error here is expected, not a failure.
                    let _ = self.backend.kill(pid);
                    let _ = self.wait_for_exit(pid, FORCEFUL_TIMEOUT).await;
                    return Ok(());
                }
            };
        }
    }

    /// Poll the existence probe until the process is gone or the bound
    /// elapses. `Ok(true)` means the process no longer exists.
    async fn wait_for_exit(&self, pid: u32, timeout: Duration) -> Result<bool, KillError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.backend.exists(pid) {
                Ok(false) | Err(SignalError::NotFound) => return Ok(true),
                Ok(true) | Err(SignalError::PermissionDenied) => {}
                Err(SignalError::Other(message)) => return Err(KillError::Unknown(message)),
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }
}

/// [`SignalBackend`] backed by `nix` signal delivery.
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct NixSignals;

#[cfg(unix)]
impl SignalBackend for NixSignals {
    fn terminate(&self, pid: u32) -> Result<(), SignalError> {
        send_signal(pid, nix::sys::signal::Signal::SIGTERM)
    }

    fn kill(&self, pid: u32) -> Result<(), SignalError> {
        send_signal(pid, nix::sys::signal::Signal::SIGKILL)
    }

    fn exists(&self, pid: u32) -> Result<bool, SignalError> {
        use nix::errno::Errno;

        match nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            // Exists, but owned by someone else
            Err(Errno::EPERM) => Ok(true),
            Err(errno) => Err(SignalError::Other(errno.to_string())),
        }
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> Result<(), SignalError> {
    use nix::errno::Errno;

    match nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => Err(SignalError::NotFound),
        Err(Errno::EPERM) => Err(SignalError::PermissionDenied),
        Err(errno) => Err(SignalError::Other(errno.to_string())),
    }
}
