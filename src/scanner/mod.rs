//! Port scanning with platform-specific pipeline implementations.
//!
//! Each platform scanner runs the same four-step pipeline: list listening
//! sockets (fatal on failure), then batched best-effort resolution of
//! working directories, full commands with parent PIDs, and parent
//! commands. They differ only in the tools invoked and the formats parsed. The
//! enrichment steps are keyed by the distinct-PID set, so a host with N
//! listening processes costs O(1) external invocations, not O(N).

pub mod darwin;
pub mod linux;
pub mod windows;

use std::collections::HashMap;

use crate::error::ScanError;
use crate::models::{PortEntry, ProcessDescriptor, RawPortRecord};

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
compile_error!("Unsupported platform: only macOS, Linux and Windows are supported");

/// Trait for platform-specific port scanning implementations.
pub trait Scanner: Send + Sync {
    /// Scan all listening sockets and resolve their owning processes.
    fn scan(&self) -> impl std::future::Future<Output = Result<Vec<PortEntry>, ScanError>> + Send;
}

/// The main port scanner that dispatches to the implementation for the
/// running OS.
///
/// No caching and no retry: a caller that wants periodic rescans composes
/// this with [`crate::poller::PollingManager`].
pub struct PortScanner {
    #[cfg(target_os = "macos")]
    inner: darwin::DarwinScanner,

    #[cfg(target_os = "linux")]
    inner: linux::LinuxScanner,

    #[cfg(target_os = "windows")]
    inner: windows::WindowsScanner,
}

impl PortScanner {
    /// Create a new port scanner for the current platform.
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "macos")]
            inner: darwin::DarwinScanner::new(),

            #[cfg(target_os = "linux")]
            inner: linux::LinuxScanner::new(),

            #[cfg(target_os = "windows")]
            inner: windows::WindowsScanner::new(),
        }
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for PortScanner {
    async fn scan(&self) -> Result<Vec<PortEntry>, ScanError> {
        self.inner.scan().await
    }
}

/// Deduplicated, sorted PID set from a batch of raw records.
///
/// Sorting keeps the batched command strings deterministic.
pub(crate) fn distinct_pids(records: &[RawPortRecord]) -> Vec<u32> {
    let mut pids: Vec<u32> = records.iter().map(|r| r.pid).collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

/// Deduplicated, sorted set of non-zero parent PIDs.
pub(crate) fn distinct_parent_pids(processes: &HashMap<u32, ProcessDescriptor>) -> Vec<u32> {
    let mut pids: Vec<u32> = processes
        .values()
        .map(|d| d.parent_pid)
        .filter(|&p| p != 0)
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

/// Comma-separated PID list for `-p`-style batched queries.
pub(crate) fn join_pids(pids: &[u32]) -> String {
    pids.iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Protocol;

    fn record(pid: u32) -> RawPortRecord {
        RawPortRecord {
            pid,
            port: 80,
            command: "x".to_string(),
            protocol: Protocol::Tcp,
        }
    }

    #[test]
    fn test_distinct_pids_sorted_and_deduped() {
        let records = vec![record(30), record(10), record(30), record(20)];
        assert_eq!(distinct_pids(&records), vec![10, 20, 30]);
    }

    #[test]
    fn test_distinct_parent_pids_skips_zero() {
        let mut processes = HashMap::new();
        processes.insert(
            1,
            ProcessDescriptor {
                command: "a".to_string(),
                parent_pid: 0,
            },
        );
        processes.insert(
            2,
            ProcessDescriptor {
                command: "b".to_string(),
                parent_pid: 7,
            },
        );
        processes.insert(
            3,
            ProcessDescriptor {
                command: "c".to_string(),
                parent_pid: 7,
            },
        );
        assert_eq!(distinct_parent_pids(&processes), vec![7]);
    }

    #[test]
    fn test_join_pids() {
        assert_eq!(join_pids(&[1, 22, 333]), "1,22,333");
        assert_eq!(join_pids(&[]), "");
    }
}
