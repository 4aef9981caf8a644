//! Core data model
//!
//! Read-only observations such as process snapshots.

use serde::{Deserialize, Serialize};

/// Snapshot of one host process taken during an enumeration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    #[serde(default)]
    pub cmdline: Vec<String>,
}

impl ProcessRecord {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
            cmdline: Vec::new(),
        }
    }

    pub fn with_cmdline<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmdline = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Command-line tokens joined with single spaces.
    pub fn command_line(&self) -> String {
        self.cmdline.join(" ")
    }

    /// Heuristic peer test: another process whose command line mentions
    /// `program`. Two unrelated programs sharing the substring will match.
    pub fn is_peer_of(&self, program: &str, self_pid: u32) -> bool {
        self.pid != self_pid && !program.is_empty() && self.command_line().contains(program)
    }
}
