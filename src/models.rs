//! Core data models.
//!
//! [`PortEntry`] is the externally visible unit; the raw record and process
//! descriptor are intermediate shapes consumed by the enrichment step.

use serde::{Deserialize, Serialize};

/// Sentinel directory value when the owning process's working directory
/// cannot be determined.
pub const UNKNOWN_DIRECTORY: &str = "Unknown";

/// Transport protocol of a listening socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
}

/// One line of socket-listing tool output, before enrichment.
///
/// Ephemeral: produced by a parser, consumed by the enricher, never exposed
/// outside the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawPortRecord {
    pub pid: u32,
    pub port: u16,
    /// Command token as reported by the socket-listing tool; may be a
    /// truncated name. Overridden by the enriched full command line when
    /// process info resolves.
    pub command: String,
    pub protocol: Protocol,
}

/// Full command line and parent PID for one observed process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct ProcessDescriptor {
    pub command: String,
    /// `0` when the parent is unknown.
    pub parent_pid: u32,
}

/// A listening socket resolved to its owning process.
///
/// Unique by `(pid, port)` within one scan result; a process bound to both
/// IPv4 and IPv6 on the same port yields exactly one entry. Entries are
/// constructed fresh on every scan and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortEntry {
    /// Process ID of the listener.
    pub pid: u32,

    /// The bound local port.
    pub port: u16,

    /// Full command line when enrichment resolved it, otherwise the raw
    /// command token from the socket-listing tool.
    pub command: String,

    /// Working directory of the process, or [`UNKNOWN_DIRECTORY`].
    pub directory: String,

    /// Transport protocol.
    pub protocol: Protocol,

    /// Parent process ID; `0` when unknown.
    pub parent_pid: u32,

    /// Display command of the parent process; empty when the parent PID is
    /// `0` or its command could not be resolved.
    pub parent_command: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_entry_serde_round_trip() {
        let entry = PortEntry {
            pid: 12345,
            port: 3000,
            command: "node server.js".to_string(),
            directory: "/srv/app".to_string(),
            protocol: Protocol::Tcp,
            parent_pid: 1,
            parent_command: String::new(),
        };

        let json = serde_json::to_string(&entry).unwrap();
        let back: PortEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
