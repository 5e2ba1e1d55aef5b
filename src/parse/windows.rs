//! Parsers for Windows `netstat`, PowerShell CIM, and `wmic` output.

use std::collections::HashMap;

use serde::Deserialize;

use crate::models::{ProcessDescriptor, Protocol, RawPortRecord};

use super::parse_port;

/// Parse `netstat -ano` output, filtered to LISTENING TCP lines.
///
/// Expected format:
/// ```text
/// Active Connections
///
///   Proto  Local Address          Foreign Address        State           PID
///   TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1020
///   TCP    [::]:445               [::]:0                 LISTENING       4
/// ```
///
/// netstat exposes no command name, so the raw command is the `PID <n>`
/// placeholder; enrichment replaces it when process info resolves.
pub(crate) fn parse_netstat_output(output: &str) -> Vec<RawPortRecord> {
    let mut records = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || !line.starts_with("TCP") {
            continue;
        }

        // Columns: Proto, Local Address, Foreign Address, State, PID
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 5 || tokens[3] != "LISTENING" {
            continue;
        }

        let port = match parse_port(tokens[1]) {
            Some(p) => p,
            None => continue,
        };
        let pid: u32 = match tokens[4].parse() {
            Ok(p) => p,
            Err(_) => continue,
        };

        records.push(RawPortRecord {
            pid,
            port,
            command: format!("PID {}", pid),
            protocol: Protocol::Tcp,
        });
    }

    records
}

#[derive(Debug, Deserialize)]
struct CimProcess {
    #[serde(rename = "ProcessId")]
    process_id: u32,
    #[serde(rename = "ParentProcessId", default)]
    parent_process_id: u32,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "CommandLine", default)]
    command_line: Option<String>,
}

/// Parse the JSON emitted by
/// `Get-CimInstance Win32_Process ... | ConvertTo-Json -Compress`.
///
/// `ConvertTo-Json` emits a bare object for a single result and an array for
/// several; both shapes are accepted. `CommandLine` is null for protected
/// processes, in which case the process name stands in.
pub(crate) fn parse_cim_json(output: &str) -> HashMap<u32, ProcessDescriptor> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return HashMap::new();
    }

    let processes: Vec<CimProcess> = match serde_json::from_str::<Vec<CimProcess>>(trimmed) {
        Ok(list) => list,
        Err(_) => match serde_json::from_str::<CimProcess>(trimmed) {
            Ok(single) => vec![single],
            Err(_) => return HashMap::new(),
        },
    };

    processes
        .into_iter()
        .map(|p| {
            let command = p
                .command_line
                .filter(|c| !c.trim().is_empty())
                .or(p.name)
                .unwrap_or_default();
            (
                p.process_id,
                ProcessDescriptor {
                    command,
                    parent_pid: p.parent_process_id,
                },
            )
        })
        .collect()
}

/// Parse `wmic process where ... get ... /format:list` output (the fallback
/// when PowerShell is unavailable).
///
/// List format is blocks of `Key=Value` lines separated by blank lines:
/// ```text
/// CommandLine=node server.js
/// ParentProcessId=1020
/// ProcessId=5432
/// ```
pub(crate) fn parse_wmic_list(output: &str) -> HashMap<u32, ProcessDescriptor> {
    let mut processes = HashMap::new();
    let mut command = String::new();
    let mut parent_pid: u32 = 0;
    let mut pid: Option<u32> = None;

    let mut flush = |command: &mut String, parent_pid: &mut u32, pid: &mut Option<u32>| {
        if let Some(p) = pid.take() {
            processes.insert(
                p,
                ProcessDescriptor {
                    command: std::mem::take(command),
                    parent_pid: *parent_pid,
                },
            );
        }
        command.clear();
        *parent_pid = 0;
    };

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            flush(&mut command, &mut parent_pid, &mut pid);
            continue;
        }

        let (key, value) = match line.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };

        match key {
            "CommandLine" => command = value.trim().to_string(),
            "ParentProcessId" => parent_pid = value.trim().parse().unwrap_or(0),
            "ProcessId" => pid = value.trim().parse().ok(),
            _ => {}
        }
    }
    flush(&mut command, &mut parent_pid, &mut pid);

    processes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_netstat_output() {
        let output = "\r
Active Connections\r
\r
  Proto  Local Address          Foreign Address        State           PID\r
  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1020\r
  TCP    127.0.0.1:3000         0.0.0.0:0              LISTENING       5432\r
  TCP    [::]:445               [::]:0                 LISTENING       4\r
  TCP    10.0.0.5:50312         93.184.216.34:443      ESTABLISHED     7777\r
  UDP    0.0.0.0:5353           *:*                                    1234\r
";

        let records = parse_netstat_output(output);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].pid, 1020);
        assert_eq!(records[0].port, 135);
        assert_eq!(records[0].command, "PID 1020");
        assert_eq!(records[0].protocol, Protocol::Tcp);

        assert_eq!(records[1].port, 3000);
        assert_eq!(records[2].port, 445);
        assert_eq!(records[2].pid, 4);
    }

    #[test]
    fn test_parse_netstat_output_empty() {
        assert!(parse_netstat_output("").is_empty());
        assert!(parse_netstat_output("Active Connections\r\n").is_empty());
    }

    #[test]
    fn test_parse_cim_json_array() {
        let output = r#"[{"ProcessId":5432,"ParentProcessId":1020,"Name":"node.exe","CommandLine":"node server.js"},{"ProcessId":4,"ParentProcessId":0,"Name":"System","CommandLine":null}]"#;

        let processes = parse_cim_json(output);
        assert_eq!(processes.len(), 2);

        let node = processes.get(&5432).unwrap();
        assert_eq!(node.command, "node server.js");
        assert_eq!(node.parent_pid, 1020);

        // Null CommandLine falls back to the process name
        let system = processes.get(&4).unwrap();
        assert_eq!(system.command, "System");
        assert_eq!(system.parent_pid, 0);
    }

    #[test]
    fn test_parse_cim_json_single_object() {
        let output = r#"{"ProcessId":5432,"ParentProcessId":1,"Name":"node.exe","CommandLine":"node server.js"}"#;

        let processes = parse_cim_json(output);
        assert_eq!(processes.len(), 1);
        assert_eq!(processes.get(&5432).unwrap().parent_pid, 1);
    }

    #[test]
    fn test_parse_cim_json_garbage() {
        assert!(parse_cim_json("").is_empty());
        assert!(parse_cim_json("not json at all").is_empty());
    }

    #[test]
    fn test_parse_wmic_list() {
        let output = "\r
\r
CommandLine=node server.js\r
ParentProcessId=1020\r
ProcessId=5432\r
\r
\r
CommandLine=\r
ParentProcessId=0\r
ProcessId=4\r
\r
";

        let processes = parse_wmic_list(output);
        assert_eq!(processes.len(), 2);

        let node = processes.get(&5432).unwrap();
        assert_eq!(node.command, "node server.js");
        assert_eq!(node.parent_pid, 1020);

        let system = processes.get(&4).unwrap();
        assert_eq!(system.command, "");
    }

    #[test]
    fn test_parse_wmic_list_block_without_pid_is_dropped() {
        let output = "CommandLine=ghost\nParentProcessId=1\n\n";
        assert!(parse_wmic_list(output).is_empty());
    }
}
