//! Windows port scanner pipeline using netstat and CIM process queries.

use std::collections::HashMap;

use tracing::debug;

use crate::enrich::merge_records;
use crate::error::ScanError;
use crate::exec::{CommandRunner, SystemRunner};
use crate::models::{PortEntry, ProcessDescriptor};
use crate::parse;

use super::{distinct_parent_pids, distinct_pids, Scanner};

/// Windows-specific port scanner.
///
/// Pipeline:
/// 1. `netstat -ano`, filtered to LISTENING TCP lines (fatal on failure)
/// 2. Working directories cannot be resolved on Windows; every entry keeps
///    the `"Unknown"` sentinel
/// 3. PowerShell `Get-CimInstance Win32_Process` restricted to the PID set
///    (best-effort), falling back to `wmic process ... /format:list` on
///    hosts where PowerShell is unavailable
/// 4. The same process query restricted to parent PIDs (best-effort,
///    skipped when there are no parent PIDs)
pub struct WindowsScanner<R = SystemRunner> {
    runner: R,
}

impl WindowsScanner {
    /// Create a new Windows scanner backed by real command execution.
    pub fn new() -> Self {
        Self {
            runner: SystemRunner::new(),
        }
    }
}

impl Default for WindowsScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> WindowsScanner<R> {
    /// Create a scanner with an injected command runner.
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    /// Batched process-metadata query for a PID set.
    async fn query_processes(&self, pids: &[u32]) -> HashMap<u32, ProcessDescriptor> {
        let filter = pids
            .iter()
            .map(|p| format!("ProcessId={}", p))
            .collect::<Vec<_>>()
            .join(" OR ");

        let script = format!(
            "Get-CimInstance Win32_Process -Filter \"{}\" | Select-Object ProcessId,ParentProcessId,Name,CommandLine | ConvertTo-Json -Compress",
            filter
        );
        match self
            .runner
            .run("powershell", &["-NoProfile", "-Command", &script])
            .await
        {
            Ok(output) => parse::windows::parse_cim_json(&output),
            Err(error) => {
                debug!(error = %error, "PowerShell CIM query failed; falling back to wmic");
                self.query_processes_wmic(&filter.replace(" OR ", " or ")).await
            }
        }
    }

    async fn query_processes_wmic(&self, clause: &str) -> HashMap<u32, ProcessDescriptor> {
        match self
            .runner
            .run(
                "wmic",
                &[
                    "process",
                    "where",
                    clause,
                    "get",
                    "ProcessId,ParentProcessId,CommandLine",
                    "/format:list",
                ],
            )
            .await
        {
            Ok(output) => parse::windows::parse_wmic_list(&output),
            Err(error) => {
                debug!(error = %error, "wmic query failed; raw commands kept");
                HashMap::new()
            }
        }
    }
}

impl<R: CommandRunner> Scanner for WindowsScanner<R> {
    async fn scan(&self) -> Result<Vec<PortEntry>, ScanError> {
        let output = self.runner.run("netstat", &["-ano"]).await?;

        let records = parse::windows::parse_netstat_output(&output);
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let pids = distinct_pids(&records);
        // Windows has no practical way to expose another process's working
        // directory; every entry keeps the sentinel.
        let directories = HashMap::new();
        let processes = self.query_processes(&pids).await;

        let parent_pids = distinct_parent_pids(&processes);
        let parent_commands: HashMap<u32, String> = if parent_pids.is_empty() {
            HashMap::new()
        } else {
            self.query_processes(&parent_pids)
                .await
                .into_iter()
                .map(|(pid, descriptor)| (pid, descriptor.command))
                .collect()
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
    use crate::scanner::testing::ScriptedRunner;

    const NETSTAT_OUTPUT: &str = "\r
Active Connections\r
\r
  Proto  Local Address          Foreign Address        State           PID\r
  TCP    0.0.0.0:3000           0.0.0.0:0              LISTENING       5432\r
  TCP    [::]:3000              [::]:0                 LISTENING       5432\r
  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1020\r
";

    fn cim_command(filter: &str) -> String {
        format!(
            "powershell -NoProfile -Command Get-CimInstance Win32_Process -Filter \"{}\" | Select-Object ProcessId,ParentProcessId,Name,CommandLine | ConvertTo-Json -Compress",
            filter
        )
    }

    #[tokio::test]
    async fn test_scan_full_pipeline() {
        let runner = ScriptedRunner::new()
            .output("netstat -ano", NETSTAT_OUTPUT)
            .output(
                &cim_command("ProcessId=1020 OR ProcessId=5432"),
                r#"[{"ProcessId":5432,"ParentProcessId":880,"Name":"node.exe","CommandLine":"node server.js"},{"ProcessId":1020,"ParentProcessId":652,"Name":"svchost.exe","CommandLine":null}]"#,
            )
            .output(
                &cim_command("ProcessId=652 OR ProcessId=880"),
                r#"[{"ProcessId":652,"ParentProcessId":512,"Name":"services.exe","CommandLine":null},{"ProcessId":880,"ParentProcessId":652,"Name":"explorer.exe","CommandLine":"C:\\Windows\\explorer.exe"}]"#,
            );

        let scanner = WindowsScanner::with_runner(runner);
        let entries = scanner.scan().await.unwrap();

        // IPv4 and IPv6 bindings of PID 5432 merge to one entry
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].pid, 5432);
        assert_eq!(entries[0].port, 3000);
        assert_eq!(entries[0].command, "node server.js");
        assert_eq!(entries[0].directory, "Unknown");
        assert_eq!(entries[0].parent_pid, 880);
        assert_eq!(entries[0].parent_command, "C:\\Windows\\explorer.exe");

        assert_eq!(entries[1].pid, 1020);
        assert_eq!(entries[1].port, 135);
        // Null CommandLine fell back to the process name
        assert_eq!(entries[1].command, "svchost.exe");
        assert_eq!(entries[1].parent_command, "services.exe");
    }

    #[tokio::test]
    async fn test_scan_falls_back_to_wmic() {
        let runner = ScriptedRunner::new()
            .output("netstat -ano", NETSTAT_OUTPUT)
            .failure(
                &cim_command("ProcessId=1020 OR ProcessId=5432"),
                "powershell: not recognized",
            )
            .output(
                "wmic process where ProcessId=1020 or ProcessId=5432 get ProcessId,ParentProcessId,CommandLine /format:list",
                "CommandLine=node server.js\r\nParentProcessId=0\r\nProcessId=5432\r\n\r\nCommandLine=\r\nParentProcessId=0\r\nProcessId=1020\r\n",
            );

        let scanner = WindowsScanner::with_runner(runner);
        let entries = scanner.scan().await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].command, "node server.js");
        // Empty wmic CommandLine keeps the raw placeholder
        assert_eq!(entries[1].command, "PID 1020");
    }

    #[tokio::test]
    async fn test_scan_process_query_failure_keeps_placeholders() {
        let runner = ScriptedRunner::new().output("netstat -ano", NETSTAT_OUTPUT);

        let scanner = WindowsScanner::with_runner(runner);
        let entries = scanner.scan().await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].command, "PID 5432");
        assert_eq!(entries[0].parent_pid, 0);
        assert_eq!(entries[0].parent_command, "");
    }

    #[tokio::test]
    async fn test_scan_zero_sockets_skips_enrichment() {
        let runner = ScriptedRunner::new().output("netstat -ano", "Active Connections\r\n");

        let scanner = WindowsScanner::with_runner(runner);
        let entries = scanner.scan().await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(scanner.runner.calls(), vec!["netstat -ano"]);
    }

    #[tokio::test]
    async fn test_scan_netstat_failure_is_fatal() {
        let runner = ScriptedRunner::new().failure("netstat -ano", "netstat: not recognized");
        let scanner = WindowsScanner::with_runner(runner);

        let err = scanner.scan().await.unwrap_err();
        assert!(matches!(err, ScanError::CommandFailed(_)));
    }
}
