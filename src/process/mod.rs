//! Process termination with platform-specific protocols.
//!
//! Unix-family platforms use an escalating SIGTERM-then-SIGKILL state
//! machine with bounded existence polling; Windows issues a single forceful
//! `taskkill`. Both surface the same [`KillError`] taxonomy.
//!
//! This module terminates real operating-system processes: nothing here is
//! invoked speculatively or retried silently.

pub mod unix;
pub mod windows;

use crate::error::KillError;
use crate::scanner::{PortScanner, Scanner};

pub use unix::{SignalBackend, SignalError, UnixKiller};
pub use windows::WindowsKiller;

/// Process terminator for the current platform.
pub struct ProcessManager {
    #[cfg(unix)]
    inner: unix::UnixKiller<unix::NixSignals>,

    #[cfg(windows)]
    inner: windows::WindowsKiller,
}

impl ProcessManager {
    /// Create a new process manager for the current platform.
    pub fn new() -> Self {
        Self {
            #[cfg(unix)]
            inner: unix::UnixKiller::new(),

            #[cfg(windows)]
            inner: windows::WindowsKiller::new(),
        }
    }

    /// Terminate a process by PID.
    ///
    /// On Unix this escalates from SIGTERM to SIGKILL after a bounded wait;
    /// on Windows it runs a single forceful `taskkill`.
    pub async fn kill_process(&self, pid: u32) -> Result<(), KillError> {
        self.inner.kill(pid).await
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan once and terminate the process listening on `port`.
///
/// Returns `Ok(false)` when no listener owns the port. A listener that
/// disappears between the scan and the kill counts as terminated.
pub async fn kill_by_port(port: u16) -> Result<bool, KillError> {
    let scanner = PortScanner::new();
    let entries = scanner
        .scan()
        .await
        .map_err(|e| KillError::Unknown(e.to_string()))?;

    let entry = match entries.iter().find(|e| e.port == port) {
        Some(entry) => entry,
        None => return Ok(false),
    };

    match ProcessManager::new().kill_process(entry.pid).await {
        Ok(()) | Err(KillError::NotFound(_)) => Ok(true),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_process_missing_pid_is_not_found() {
        let manager = ProcessManager::new();

        // PID near the default pid_max upper bound; vanishingly unlikely to exist
        let err = manager.kill_process(3_999_999).await.unwrap_err();
        assert!(matches!(err, KillError::NotFound(3_999_999)));
    }
}
