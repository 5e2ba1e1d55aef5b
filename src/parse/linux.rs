//! Parsers for Linux `ss` and `netstat` output.

use regex::Regex;

use crate::models::{Protocol, RawPortRecord};

use super::parse_port;

/// Parse `ss -tlnp` output.
///
/// Expected format:
/// ```text
/// State      Recv-Q     Send-Q         Local Address:Port          Peer Address:Port    Process
/// LISTEN     0          4096      [::ffff:127.0.0.1]:63342                   *:*        users:(("rustrover",pid=53561,fd=54))
/// ```
///
/// Only LISTEN-state lines yield records; the header and any line whose
/// process column is missing (e.g. sockets owned by another user) are
/// skipped.
pub(crate) fn parse_ss_output(output: &str) -> Vec<RawPortRecord> {
    let process_re = Regex::new(r#"users:\(\("([^"]+)",pid=(\d+)"#).unwrap();
    let mut records = Vec::new();

    for line in output.lines() {
        if line.is_empty() {
            continue;
        }

        // Columns: State Recv-Q Send-Q Local:Port Peer:Port Process
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 4 || tokens[0] != "LISTEN" {
            continue;
        }

        let port = match parse_port(tokens[3]) {
            Some(p) => p,
            None => continue,
        };

        let caps = match process_re.captures(line) {
            Some(c) => c,
            None => continue,
        };
        let command = caps[1].to_string();
        let pid: u32 = match caps[2].parse() {
            Ok(p) => p,
            Err(_) => continue,
        };

        records.push(RawPortRecord {
            pid,
            port,
            command,
            protocol: Protocol::Tcp,
        });
    }

    records
}

/// Parse `netstat -tlnp` output (the fallback when `ss` is unavailable).
///
/// Expected format:
/// ```text
/// Active Internet connections (only servers)
/// Proto Recv-Q Send-Q Local Address           Foreign Address         State       PID/Program name
/// tcp        0      0 0.0.0.0:22              0.0.0.0:*               LISTEN      812/sshd
/// tcp6       0      0 :::80                   :::*                    LISTEN      1024/nginx
/// ```
///
/// Lines whose PID column is `-` (socket owned by another user) are skipped.
pub(crate) fn parse_netstat_output(output: &str) -> Vec<RawPortRecord> {
    let mut records = Vec::new();

    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 7 || !tokens[0].starts_with("tcp") || tokens[5] != "LISTEN" {
            continue;
        }

        let port = match parse_port(tokens[3]) {
            Some(p) => p,
            None => continue,
        };

        // PID/Program column, e.g. "812/sshd"
        let (pid_str, command) = match tokens[6].split_once('/') {
            Some((p, c)) => (p, c),
            None => continue,
        };
        let pid: u32 = match pid_str.parse() {
            Ok(p) => p,
            Err(_) => continue,
        };

        records.push(RawPortRecord {
            pid,
            port,
            command: command.to_string(),
            protocol: Protocol::Tcp,
        });
    }

    records
}
