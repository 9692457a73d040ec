//! Run logs.
//!
//! Successful runs are appended to the processed log and failed runs to the
//! error log. Entries are never rewritten; a clear truncates a whole file.

mod entry;
mod logger;
mod tail;

pub use entry::{
    format_entry, parse_entries, upload_header, LogEntry, ENTRY_SEPARATOR_WIDTH,
    HEADER_RULE_WIDTH,
};
pub use logger::{LogMetadata, RunLogger};
pub use tail::tail_file;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the two run logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// Successful runs and upload audit entries.
    Processed,
    /// Failed runs.
    Error,
}

impl LogKind {
    /// Both logs.
    pub const ALL: [Self; 2] = [Self::Processed, Self::Error];

    /// The log name as used on the command line.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a log name is not recognised.
#[derive(Debug, Clone, Error)]
#[error("Unknown log '{0}': expected 'processed' or 'error'")]
pub struct ParseLogKindError(pub String);

impl FromStr for LogKind {
    type Err = ParseLogKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Self::Processed),
            "error" | "errors" => Ok(Self::Error),
            _ => Err(ParseLogKindError(s.to_string())),
        }
    }
}
