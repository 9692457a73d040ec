//! The run log entry format.
//!
//! ```text
//! ====================================================================================================
//! TIMESTAMP: 2024-05-01 10:00:00 UTC
//! SCRIPT: split_vulns.py — OUTPUT: /reports/out.xlsx
//! --------------------------------------------------------------------------------
//! COMMAND: python split_vulns.py report.xlsx --output /reports/out.xlsx
//!
//! 12 rows processed
//!
//!
//! ```
//!
//! The six parts are joined by `\n` and the last part is a `\n\n` trailer,
//! so every entry ends with three newlines after its body.

use crate::utils::{format_log_timestamp, parse_log_timestamp, Timestamp};
use serde::{Deserialize, Serialize};

/// Width of the `=` line opening every entry.
pub const ENTRY_SEPARATOR_WIDTH: usize = 100;
/// Width of the `-` line between header and body.
pub const HEADER_RULE_WIDTH: usize = 80;

const TIMESTAMP_PREFIX: &str = "TIMESTAMP: ";
const COMMAND_PREFIX: &str = "COMMAND: ";
const UPLOAD_PREFIX: &str = "UPLOAD: ";
const TRAILER: &str = "\n\n\n";

/// Renders one log entry.
#[must_use]
pub fn format_entry(timestamp: &Timestamp, header: &str, body: &str) -> String {
    let mut text = String::with_capacity(
        ENTRY_SEPARATOR_WIDTH + HEADER_RULE_WIDTH + header.len() + body.len() + 48,
    );
    text.push_str(&"=".repeat(ENTRY_SEPARATOR_WIDTH));
    text.push('\n');
    text.push_str(TIMESTAMP_PREFIX);
    text.push_str(&format_log_timestamp(timestamp));
    text.push('\n');
    text.push_str(header);
    text.push('\n');
    text.push_str(&"-".repeat(HEADER_RULE_WIDTH));
    text.push('\n');
    text.push_str(body);
    text.push_str(TRAILER);
    text
}

/// Header of an upload audit entry.
#[must_use]
pub fn upload_header(filename: &str) -> String {
    format!("{UPLOAD_PREFIX}{filename}")
}

/// An entry read back from log text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Parsed timestamp, if the line was well formed.
    pub timestamp: Option<Timestamp>,
    /// The header line.
    pub header: String,
    /// The body, without the trailer.
    pub body: String,
}

impl LogEntry {
    /// The rendered command of a run entry.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.body.lines().next()?.strip_prefix(COMMAND_PREFIX)
    }

    /// Returns true for upload audit entries.
    #[must_use]
    pub fn is_upload(&self) -> bool {
        self.header.starts_with(UPLOAD_PREFIX)
    }
}

/// Parses the entries in `text`.
///
/// Anything before the first separator line (such as the tail of an entry
/// cut off by a log view) is skipped, as is any block that does not have
/// the timestamp and rule lines in place. A body that itself contains a
/// separator line cannot be told apart from a new entry.
#[must_use]
pub fn parse_entries(text: &str) -> Vec<LogEntry> {
    let separator = "=".repeat(ENTRY_SEPARATOR_WIDTH);
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for line in text.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == separator {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(String::new());
        } else if let Some(ref mut block) = current {
            block.push_str(line);
        }
    }
    if let Some(block) = current {
        blocks.push(block);
    }

    blocks.iter().filter_map(|block| parse_block(block)).collect()
}

fn parse_block(block: &str) -> Option<LogEntry> {
    let rule = "-".repeat(HEADER_RULE_WIDTH);
    let mut parts = block.splitn(4, '\n');

    let timestamp_line = parts.next()?.strip_prefix(TIMESTAMP_PREFIX)?;
    let header = parts.next()?;
    if parts.next()? != rule {
        return None;
    }
    let rest = parts.next().unwrap_or_default();
    let body = rest
        .strip_suffix(TRAILER)
        .unwrap_or_else(|| rest.trim_end_matches('\n'));

    Some(LogEntry {
        timestamp: parse_log_timestamp(timestamp_line).ok(),
        header: header.to_string(),
        body: body.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn ts() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_format_entry_layout() {
        let text = format_entry(&ts(), "SCRIPT: split_vulns.py", "COMMAND: python x\n\nok");
        let lines: Vec<&str> = text.split('\n').collect();

        assert_eq!(lines[0], "=".repeat(100));
        assert_eq!(lines[1], "TIMESTAMP: 2024-05-01 10:00:00 UTC");
        assert_eq!(lines[2], "SCRIPT: split_vulns.py");
        assert_eq!(lines[3], "-".repeat(80));
        assert_eq!(lines[4], "COMMAND: python x");
        assert!(text.ends_with("ok\n\n\n"));
    }

    #[test]
    fn test_parse_entries() {
        let mut text = format_entry(&ts(), "SCRIPT: a.py", "COMMAND: python a.py\n\nfirst");
        text.push_str(&format_entry(&ts(), &upload_header("r.xlsx"), "Saved to: /up/r.xlsx"));

        let entries = parse_entries(&text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, Some(ts()));
        assert_eq!(entries[0].command(), Some("python a.py"));
        assert_eq!(entries[0].body, "COMMAND: python a.py\n\nfirst");
        assert!(entries[1].is_upload());
        assert_eq!(entries[1].command(), None);
    }

    #[test]
    fn test_parse_skips_leading_fragment() {
        let whole = format_entry(&ts(), "SCRIPT: b.py", "COMMAND: b\n\nout");
        let text = format!("tail of an older entry\n\n\n{whole}");

        let entries = parse_entries(&text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].header, "SCRIPT: b.py");
    }

    #[test]
    fn test_parse_keeps_body_newlines() {
        let text = format_entry(&ts(), "SCRIPT: c.py", "COMMAND: c\n\nline one\n");
        assert_eq!(parse_entries(&text)[0].body, "COMMAND: c\n\nline one\n");
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_entries("").is_empty());
        assert!(parse_entries("no entries here\n").is_empty());
    }
}
