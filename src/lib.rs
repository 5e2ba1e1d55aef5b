//! Portscope Core Library
//!
//! Cross-platform library for inventorying listening TCP ports and
//! terminating their owning processes. Provides functionality to:
//! - Scan listening TCP sockets and resolve each to its owning process,
//!   working directory, full command line and parent process
//! - Kill processes by PID with graceful-then-forceful escalation
//! - Poll the scanner on a timer and fan results out to subscribers
//!
//! # Architecture
//! - `parse`: pure text parsers over raw platform-tool output
//! - `enrich`: merge per-process metadata into final entries, dedupe
//! - `scanner`: per-platform pipelines behind a single `Scanner` trait
//! - `process`: signal/command escalation protocols for termination
//! - `poller`: repeating scan-and-notify with dynamic interval
//!
//! # Platform Support
//! - macOS: `lsof` and `ps` commands
//! - Linux: `ss` (fallback `netstat`), `/proc/<pid>/cwd`, `ps`
//! - Windows: `netstat`, PowerShell CIM (fallback `wmic`), `taskkill`

mod enrich;
mod parse;

pub mod error;
pub mod exec;
pub mod models;
pub mod poller;
pub mod process;
pub mod scanner;

pub use error::{KillError, ScanError};
pub use exec::{CommandRunner, SystemRunner};
pub use models::{PortEntry, Protocol, UNKNOWN_DIRECTORY};
pub use poller::{PollingManager, Subscription};
pub use process::{kill_by_port, ProcessManager};
pub use scanner::{PortScanner, Scanner};
