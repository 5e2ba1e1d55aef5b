//! Merge per-process metadata into final entries and deduplicate.

use std::collections::{HashMap, HashSet};

use crate::models::{PortEntry, ProcessDescriptor, RawPortRecord, UNKNOWN_DIRECTORY};

/// Merge raw records with the enrichment maps into final [`PortEntry`] list.
///
/// Records are deduplicated by `(pid, port)` with the first occurrence
/// winning, preserving the original order (upstream tool output is typically
/// already PID/port ordered). A missing map entry is the normal "unknown"
/// case: the directory defaults to [`UNKNOWN_DIRECTORY`], the command stays
/// the raw token, the parent PID defaults to `0` and the parent command to
/// the empty string.
pub(crate) fn merge_records(
    records: Vec<RawPortRecord>,
    directories: &HashMap<u32, String>,
    processes: &HashMap<u32, ProcessDescriptor>,
    parent_commands: &HashMap<u32, String>,
) -> Vec<PortEntry> {
    let mut entries = Vec::with_capacity(records.len());
    let mut seen: HashSet<(u32, u16)> = HashSet::new();

    for record in records {
        if !seen.insert((record.pid, record.port)) {
            continue;
        }

        let directory = directories
            .get(&record.pid)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_DIRECTORY.to_string());

        let mut command = record.command;
        let mut parent_pid = 0;
        if let Some(descriptor) = processes.get(&record.pid) {
            if !descriptor.command.is_empty() {
                command = descriptor.command.clone();
            }
            parent_pid = descriptor.parent_pid;
        }

        let parent_command = if parent_pid == 0 {
            String::new()
        } else {
            parent_commands.get(&parent_pid).cloned().unwrap_or_default()
        };

        entries.push(PortEntry {
            pid: record.pid,
            port: record.port,
            command,
            directory,
            protocol: record.protocol,
            parent_pid,
            parent_command,
        });
    }

    entries
}
