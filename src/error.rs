//! Error types for the portscope library.
//!
//! Two disjoint taxonomies: [`ScanError`] for port enumeration and
//! [`KillError`] for process termination. Enrichment failures inside a scan
//! are recovered locally and never surface through either.

use thiserror::Error;

use crate::exec::ExecError;

/// Errors that can occur while enumerating listening ports.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The socket-listing command could not be executed or exited non-zero.
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// Tool output was structurally broken beyond per-line recovery.
    ///
    /// Per-line malformed input is skipped silently and never raised as this
    /// variant; it exists for stricter validation layered on later.
    #[error("Failed to parse output: {0}")]
    ParseError(String),

    /// The socket-listing command exceeded the shared execution timeout.
    #[error("Command timed out: {0}")]
    Timeout(String),
}

impl From<ExecError> for ScanError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Failed { .. } => ScanError::CommandFailed(err.to_string()),
            ExecError::TimedOut { .. } => ScanError::Timeout(err.to_string()),
        }
    }
}

/// Errors that can occur while terminating a process.
#[derive(Error, Debug)]
pub enum KillError {
    /// The specified process was not found.
    #[error("Process with PID {0} not found")]
    NotFound(u32),

    /// Permission denied to signal the process.
    #[error("Permission denied to kill process {0}")]
    PermissionDenied(u32),

    /// Any other failure during the termination sequence.
    #[error("Failed to kill process: {0}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_error_display() {
        let err = KillError::NotFound(1234);
        assert!(err.to_string().contains("1234"));

        let err = KillError::PermissionDenied(5678);
        assert!(err.to_string().contains("5678"));

        let err = KillError::Unknown("test error".to_string());
        assert!(err.to_string().contains("test error"));
    }

    #[test]
    fn test_exec_error_mapping() {
        let failed = ExecError::Failed {
            command: "lsof -iTCP".to_string(),
            message: "exited with status 1".to_string(),
        };
        assert!(matches!(ScanError::from(failed), ScanError::CommandFailed(_)));

        let timed_out = ExecError::TimedOut {
            command: "lsof -iTCP".to_string(),
            timeout_ms: 5000,
        };
        assert!(matches!(ScanError::from(timed_out), ScanError::Timeout(_)));
    }
}
