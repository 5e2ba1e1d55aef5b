//! Parsers for `ps` batch-query output (macOS and Linux).

use std::collections::HashMap;

use crate::models::ProcessDescriptor;

/// Parse `ps -p <PIDs> -o pid=,ppid=,command=` (or `args=`) output.
///
/// Each line is `PID PPID COMMAND...`; the command is rejoined so arguments
/// with embedded spaces survive. Lines with fewer than three tokens are
/// skipped.
pub(crate) fn parse_process_table(output: &str) -> HashMap<u32, ProcessDescriptor> {
    let mut processes = HashMap::new();

    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 3 {
            continue;
        }

        let pid: u32 = match tokens[0].parse() {
            Ok(p) => p,
            Err(_) => continue,
        };
        let parent_pid: u32 = match tokens[1].parse() {
            Ok(p) => p,
            Err(_) => continue,
        };

        processes.insert(
            pid,
            ProcessDescriptor {
                command: tokens[2..].join(" "),
                parent_pid,
            },
        );
    }

    processes
}

/// Parse `ps -p <PIDs> -o pid=,command=` (or `args=`) output into a
/// PID-to-command map.
pub(crate) fn parse_command_table(output: &str) -> HashMap<u32, String> {
    let mut commands = HashMap::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        // Split into PID and command (only first split)
        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let pid_str = match parts.next() {
            Some(s) => s,
            None => continue,
        };
        let command = match parts.next() {
            Some(s) => s.trim(),
            None => continue,
        };

        let pid: u32 = match pid_str.parse() {
            Ok(p) => p,
            Err(_) => continue,
        };

        commands.insert(pid, command.to_string());
    }

    commands
}
