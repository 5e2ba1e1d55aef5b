//! Timed command executor.
//!
//! Every external tool invocation in the crate goes through a
//! [`CommandRunner`] so that scanners can be exercised against scripted
//! output in tests. The default [`SystemRunner`] wraps
//! [`tokio::process::Command`] and enforces one shared timeout on every
//! invocation; a timeout is surfaced as its own error kind, never as empty
//! output.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Shared execution timeout applied to every external command.
pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(5000);

/// Failure of a single external command invocation.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The command could not be spawned or exited non-zero.
    #[error("{command}: {message}")]
    Failed { command: String, message: String },

    /// The command did not complete within the timeout.
    #[error("{command}: timed out after {timeout_ms}ms")]
    TimedOut { command: String, timeout_ms: u64 },
}

/// Runs a command line, enforcing the shared timeout, and returns its
/// captured standard output as text.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[&str],
    ) -> impl std::future::Future<Output = Result<String, ExecError>> + Send;
}

/// [`CommandRunner`] backed by real process execution.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, ExecError> {
        let command = render_command(program, args);
        debug!(command = %command, "Running external command");

        let result = tokio::time::timeout(
            COMMAND_TIMEOUT,
            Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output(),
        )
        .await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ExecError::Failed {
                    command,
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ExecError::TimedOut {
                    command,
                    timeout_ms: COMMAND_TIMEOUT.as_millis() as u64,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if stdout.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stdout
                }
            } else {
                stderr
            };
            return Err(ExecError::Failed { command, message });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn render_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}
