//! macOS port scanner pipeline using lsof and ps.

use std::collections::HashMap;

use tracing::debug;

use crate::enrich::merge_records;
use crate::error::ScanError;
use crate::exec::{CommandRunner, SystemRunner};
use crate::models::{PortEntry, ProcessDescriptor};
use crate::parse;

use super::{distinct_parent_pids, distinct_pids, join_pids, Scanner};

/// macOS-specific port scanner.
///
/// Pipeline:
/// 1. `lsof -iTCP -sTCP:LISTEN -n -P +c 0` (fatal on failure)
/// 2. `lsof -d cwd -a -p <PIDs>` (best-effort)
/// 3. `ps -p <PIDs> -o pid=,ppid=,command=` (best-effort)
/// 4. `ps -p <parent PIDs> -o pid=,command=` (best-effort, skipped when
///    there are no parent PIDs)
pub struct DarwinScanner<R = SystemRunner> {
    runner: R,
}

impl DarwinScanner {
    /// Create a new macOS scanner backed by real command execution.
    pub fn new() -> Self {
        Self {
            runner: SystemRunner::new(),
        }
    }
}

impl Default for DarwinScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> DarwinScanner<R> {
    /// Create a scanner with an injected command runner.
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    async fn resolve_directories(&self, pid_list: &str) -> HashMap<u32, String> {
        match self
            .runner
            .run("lsof", &["-d", "cwd", "-a", "-p", pid_list])
            .await
        {
            Ok(output) => parse::darwin::parse_cwd_output(&output),
            Err(error) => {
                debug!(error = %error, "Working-directory lookup failed; directories stay unknown");
                HashMap::new()
            }
        }
    }

    async fn resolve_processes(&self, pid_list: &str) -> HashMap<u32, ProcessDescriptor> {
        match self
            .runner
            .run("ps", &["-p", pid_list, "-o", "pid=,ppid=,command="])
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
            .run("ps", &["-p", pid_list, "-o", "pid=,command="])
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

impl<R: CommandRunner> Scanner for DarwinScanner<R> {
    async fn scan(&self) -> Result<Vec<PortEntry>, ScanError> {
        let output = self
            .runner
            .run("lsof", &["-iTCP", "-sTCP:LISTEN", "-n", "-P", "+c", "0"])
            .await?;

        let records = parse::darwin::parse_listen_output(&output);
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let pid_list = join_pids(&distinct_pids(&records));
        let directories = self.resolve_directories(&pid_list).await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Protocol;
    use crate::scanner::testing::ScriptedRunner;

    const LIST_CMD: &str = "lsof -iTCP -sTCP:LISTEN -n -P +c 0";

    const LSOF_OUTPUT: &str = "\
COMMAND    PID  USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
node     12345  user   23u  IPv4 0x3d8015e195af1f3f      0t0  TCP *:3000 (LISTEN)
node     12345  user   24u  IPv6 0x3d8015e195af2f3f      0t0  TCP [::1]:3000 (LISTEN)
nginx      501  root    6u  IPv4 0x1234567890abcdef      0t0  TCP *:80 (LISTEN)
";

    #[tokio::test]
    async fn test_scan_full_pipeline() {
        let runner = ScriptedRunner::new()
            .output(LIST_CMD, LSOF_OUTPUT)
            .output(
                "lsof -d cwd -a -p 501,12345",
                "\
COMMAND   PID USER   FD   TYPE DEVICE SIZE/OFF     NODE NAME
node    12345 user  cwd    DIR   1,18      640 11111111 /srv/app
nginx     501 root  cwd    DIR   1,18      640 22222222 /
",
            )
            .output(
                "ps -p 501,12345 -o pid=,ppid=,command=",
                "  501     1 /usr/sbin/nginx -g daemon off;\n12345     1 node server.js\n",
            )
            .output("ps -p 1 -o pid=,command=", "    1 /sbin/launchd\n");

        let scanner = DarwinScanner::with_runner(runner);
        let entries = scanner.scan().await.unwrap();

        // IPv4 and IPv6 bindings of PID 12345 merge to one entry
        assert_eq!(entries.len(), 2);

        assert_eq!(
            entries[0],
            PortEntry {
                pid: 12345,
                port: 3000,
                command: "node server.js".to_string(),
                directory: "/srv/app".to_string(),
                protocol: Protocol::Tcp,
                parent_pid: 1,
                parent_command: "/sbin/launchd".to_string(),
            }
        );
        assert_eq!(entries[1].pid, 501);
        assert_eq!(entries[1].port, 80);
        assert_eq!(entries[1].command, "/usr/sbin/nginx -g daemon off;");
    }

    #[tokio::test]
    async fn test_scan_zero_sockets_skips_enrichment() {
        let header_only = "COMMAND    PID  USER   FD   TYPE  DEVICE SIZE/OFF NODE NAME\n";
        let runner = ScriptedRunner::new().output(LIST_CMD, header_only);

        let scanner = DarwinScanner::with_runner(runner);
        let entries = scanner.scan().await.unwrap();
        assert!(entries.is_empty());

        // Only the socket listing ran; no enrichment command was invoked
        assert_eq!(scanner.runner.calls(), vec![LIST_CMD]);
    }

    #[tokio::test]
    async fn test_scan_directory_failure_is_not_fatal() {
        let runner = ScriptedRunner::new()
            .output(LIST_CMD, LSOF_OUTPUT)
            .failure("lsof -d cwd -a -p 501,12345", "lsof: permission denied")
            .output(
                "ps -p 501,12345 -o pid=,ppid=,command=",
                "  501     1 /usr/sbin/nginx -g daemon off;\n12345     1 node server.js\n",
            )
            .output("ps -p 1 -o pid=,command=", "    1 /sbin/launchd\n");

        let scanner = DarwinScanner::with_runner(runner);
        let entries = scanner.scan().await.unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.directory == "Unknown"));
        assert_eq!(entries[0].command, "node server.js");
    }

    #[tokio::test]
    async fn test_scan_all_enrichment_failing_keeps_raw_records() {
        let runner = ScriptedRunner::new().output(LIST_CMD, LSOF_OUTPUT);

        let scanner = DarwinScanner::with_runner(runner);
        let entries = scanner.scan().await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].command, "node");
        assert_eq!(entries[0].directory, "Unknown");
        assert_eq!(entries[0].parent_pid, 0);
        assert_eq!(entries[0].parent_command, "");

        // Parent-command step skipped entirely: no parent PIDs were discovered
        let calls = scanner.runner.calls();
        assert!(!calls.iter().any(|c| c == "ps -p  -o pid=,command="));
        assert_eq!(calls.len(), 3);
    }

    #[tokio::test]
    async fn test_scan_list_failure_is_fatal() {
        let runner = ScriptedRunner::new().failure(LIST_CMD, "lsof: command not found");
        let scanner = DarwinScanner::with_runner(runner);

        let err = scanner.scan().await.unwrap_err();
        assert!(matches!(err, ScanError::CommandFailed(_)));
    }

    #[tokio::test]
    async fn test_scan_list_timeout_is_distinct() {
        let runner = ScriptedRunner::new().timeout(LIST_CMD);
        let scanner = DarwinScanner::with_runner(runner);

        let err = scanner.scan().await.unwrap_err();
        assert!(matches!(err, ScanError::Timeout(_)));
    }
}
