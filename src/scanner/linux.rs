//! Linux port scanner pipeline using ss (fallback netstat), /proc and ps.

use std::collections::HashMap;

use tracing::debug;

use crate::enrich::merge_records;
use crate::error::ScanError;
use crate::exec::{CommandRunner, ExecError, SystemRunner};
use crate::models::{PortEntry, ProcessDescriptor, RawPortRecord};
use crate::parse;

use super::{distinct_parent_pids, distinct_pids, join_pids, Scanner};

/// Linux-specific port scanner.
///
/// Pipeline:
/// 1. `ss -tlnp`, falling back to `netstat -tlnp` when ss fails (fatal when
///    both fail; a timeout on ss propagates without trying the fallback)
/// 2. `/proc/<pid>/cwd` symlink read per distinct PID (each failure
///    independently ignored)
/// 3. `ps -p <PIDs> -o pid=,ppid=,args=` (best-effort)
/// 4. `ps -p <parent PIDs> -o pid=,args=` (best-effort, skipped when there
///    are no parent PIDs)
pub struct LinuxScanner<R = SystemRunner> {
    runner: R,
}

impl LinuxScanner {
    /// Create a new Linux scanner backed by real command execution.
    pub fn new() -> Self {
        Self {
            runner: SystemRunner::new(),
        }
    }
}

impl Default for LinuxScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> LinuxScanner<R> {
    /// Create a scanner with an injected command runner.
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    async fn list_sockets(&self) -> Result<Vec<RawPortRecord>, ScanError> {
        match self.runner.run("ss", &["-tlnp"]).await {
            Ok(output) => Ok(parse::linux::parse_ss_output(&output)),
            Err(error @ ExecError::TimedOut { .. }) => Err(ScanError::from(error)),
            Err(error) => {
                debug!(error = %error, "ss failed; falling back to netstat");
                let output = self.runner.run("netstat", &["-tlnp"]).await?;
                Ok(parse::linux::parse_netstat_output(&output))
            }
        }
    }

    /// Resolve working directories by reading `/proc/<pid>/cwd`.
    ///
    /// This is the one enrichment step that is not a single batched command,
    /// but it stays bounded by the same distinct-PID set.
    async fn resolve_directories(&self, pids: &[u32]) -> HashMap<u32, String> {
        let mut directories = HashMap::new();
        for &pid in pids {
            match tokio::fs::read_link(format!("/proc/{}/cwd", pid)).await {
                Ok(path) => {
                    directories.insert(pid, path.to_string_lossy().into_owned());
                }
                Err(error) => {
                    debug!(pid = pid, error = %error, "Could not read process cwd");
                }
            }
        }
        directories
    }

    async fn resolve_processes(&self, pid_list: &str) -> HashMap<u32, ProcessDescriptor> {
        match self
            .runner
            .run("ps", &["-p", pid_list, "-o", "pid=,ppid=,args="])
            .await
        {
            Ok(output) => parse::ps::parse_process_table(&output),
            Err(error) => {
                debug!(error = %error, "Process-info lookup failed; raw commands kept");
                HashMap::new()
            }
        }
    }

    async fn resolve_parent_commands(&self, pid_list: &str) -> HashMap<u32, String> {
        match self
            .runner
            .run("ps", &["-p", pid_list, "-o", "pid=,args="])
            .await
        {
            Ok(output) => parse::ps::parse_command_table(&output),
            Err(error) => {
                debug!(error = %error, "Parent-command lookup failed; parent commands stay empty");
                HashMap::new()
            }
        }
    }
}

impl<R: CommandRunner> Scanner for LinuxScanner<R> {
    async fn scan(&self) -> Result<Vec<PortEntry>, ScanError> {
        let records = self.list_sockets().await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let pids = distinct_pids(&records);
        let directories = self.resolve_directories(&pids).await;

        let pid_list = join_pids(&pids);
        let processes = self.resolve_processes(&pid_list).await;

        let parent_pids = distinct_parent_pids(&processes);
        let parent_commands = if parent_pids.is_empty() {
            HashMap::new()
        } else {
            self.resolve_parent_commands(&join_pids(&parent_pids)).await
        };

        Ok(merge_records(
            records,
            &directories,
            &processes,
            &parent_commands,
        ))
    }
}
