//! Windows termination protocol: a single forceful `taskkill`.
//!
//! No polling and no escalation: `taskkill /F` is already the
//! non-interceptable termination, so the protocol is one bounded invocation
//! with its textual failure output mapped onto the kill taxonomy.

use tracing::debug;

use crate::error::KillError;
use crate::exec::{CommandRunner, ExecError, SystemRunner};

/// Windows process killer using taskkill.
pub struct WindowsKiller<R = SystemRunner> {
    runner: R,
}

impl WindowsKiller {
    /// Create a killer backed by real command execution.
    pub fn new() -> Self {
        Self {
            runner: SystemRunner::new(),
        }
    }
}

impl Default for WindowsKiller {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> WindowsKiller<R> {
    /// Create a killer with an injected command runner.
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    /// Terminate a process with `taskkill /PID <pid> /F`.
    pub async fn kill(&self, pid: u32) -> Result<(), KillError> {
        debug!(pid = pid, "Forcefully terminating via taskkill");

        match self
            .runner
            .run("taskkill", &["/PID", &pid.to_string(), "/F"])
            .await
        {
            Ok(_) => Ok(()),
            Err(error @ ExecError::TimedOut { .. }) => Err(KillError::Unknown(error.to_string())),
            Err(ExecError::Failed { message, .. }) => Err(classify_failure(pid, &message)),
        }
    }
}

/// Map taskkill's textual failure output onto the kill taxonomy.
///
/// taskkill reports errors as localized text with no structured code. The
/// English substrings are the contract; the Japanese ones are matched as
/// well so the common non-English locale the tool ships with is covered.
pub(crate) fn classify_failure(pid: u32, message: &str) -> KillError {
    if message.contains("not found")
        || message.contains("could not be found")
        || message.contains("見つかりません")
    {
        KillError::NotFound(pid)
    } else if message.contains("Access is denied")
        || message.contains("denied")
        || message.contains("拒否されました")
    {
        KillError::PermissionDenied(pid)
    } else {
        KillError::Unknown(message.to_string())
    }
}
