//! Parsers for macOS `lsof` output.

use std::collections::HashMap;

use crate::models::{Protocol, RawPortRecord};

use super::{first_numeric_token, parse_port};

/// Parse `lsof -iTCP -sTCP:LISTEN -n -P +c 0` output.
///
/// Expected format:
/// ```text
/// COMMAND    PID  USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
/// node     34805  code   19u  IPv6 0x3d8015e195af1f3f      0t0  TCP [::1]:3000 (LISTEN)
/// ```
///
/// The command may contain embedded whitespace, so the PID is located as the
/// first purely-numeric token and everything before it is the command.
/// Lines in any state other than LISTEN are skipped, as are malformed lines.
pub(crate) fn parse_listen_output(output: &str) -> Vec<RawPortRecord> {
    let mut records = Vec::new();

    // Skip header line
    for line in output.lines().skip(1) {
        if line.is_empty() {
            continue;
        }

        if !line.trim_end().ends_with("(LISTEN)") {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let pid_index = match first_numeric_token(&tokens) {
            Some(i) if i > 0 => i,
            _ => continue,
        };

        let pid: u32 = match tokens[pid_index].parse() {
            Ok(p) => p,
            Err(_) => continue,
        };

        let command = decode_escaped(&tokens[..pid_index].join(" "));

        // Find the NAME column (address:port): scan backwards for a token
        // with ":" that isn't a device ID (0x...) or offset (0t...).
        let mut port = None;
        for token in tokens[pid_index + 1..].iter().rev() {
            if token.contains(':') && !token.starts_with("0x") && !token.starts_with("0t") {
                port = parse_port(token);
                break;
            }
        }
        let port = match port {
            Some(p) => p,
            None => continue,
        };

        let protocol = if tokens[pid_index + 1..].contains(&"UDP") {
            Protocol::Udp
        } else {
            Protocol::Tcp
        };

        records.push(RawPortRecord {
            pid,
            port,
            command,
            protocol,
        });
    }

    records
}

/// Parse `lsof -d cwd -a -p <PIDs>` output into a PID-to-directory map.
///
/// Expected format:
/// ```text
/// COMMAND   PID USER   FD   TYPE DEVICE SIZE/OFF     NODE NAME
/// node    34805 code  cwd    DIR   1,18      640 12345678 /srv/my app
/// ```
///
/// The path may itself contain spaces: once the first `/`-initial token
/// after the `cwd` marker is found, the rest of the line is rejoined.
pub(crate) fn parse_cwd_output(output: &str) -> HashMap<u32, String> {
    let mut directories = HashMap::new();

    for line in output.lines().skip(1) {
        let tokens: Vec<&str> = line.split_whitespace().collect();

        let pid_index = match first_numeric_token(&tokens) {
            Some(i) => i,
            None => continue,
        };
        let pid: u32 = match tokens[pid_index].parse() {
            Ok(p) => p,
            Err(_) => continue,
        };

        let marker = match tokens[pid_index..].iter().position(|t| *t == "cwd") {
            Some(i) => pid_index + i,
            None => continue,
        };

        let path_start = match tokens[marker + 1..].iter().position(|t| t.starts_with('/')) {
            Some(i) => marker + 1 + i,
            None => continue,
        };

        directories.insert(pid, tokens[path_start..].join(" "));
    }

    directories
}

/// Decode lsof's hex escapes in command names (`\x20` for space, `\x2f` for
/// slash, and any other `\xNN`).
fn decode_escaped(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' || chars.peek() != Some(&'x') {
            result.push(c);
            continue;
        }
        chars.next(); // consume 'x'

        let mut hex = String::with_capacity(2);
        for _ in 0..2 {
            match chars.peek() {
                Some(&h) if h.is_ascii_hexdigit() => {
                    hex.push(h);
                    chars.next();
                }
                _ => break,
            }
        }

        match u8::from_str_radix(&hex, 16) {
            Ok(byte) if hex.len() == 2 => result.push(byte as char),
            _ => {
                // Unparseable escape is kept as-is
                result.push('\\');
                result.push('x');
                result.push_str(&hex);
            }
        }
    }

    result
}
