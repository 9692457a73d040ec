//! Run records: the durable description of one stage invocation.

use super::ExitOutcome;
use crate::process::{OutcomeKind, RunOutcome};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The append-only record written to a run log after a stage executes.
///
/// Records are created once from a [`RunOutcome`] and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// When the invocation finished.
    pub timestamp: Timestamp,
    /// The stage that ran.
    pub stage_id: String,
    /// Short tool label shown in the log header (usually the script name).
    pub label: String,
    /// The exact argument vector passed to the process runner.
    pub command: Vec<String>,
    /// Success or failure.
    pub outcome: ExitOutcome,
    /// Finer classification of the outcome.
    pub kind: OutcomeKind,
    /// Captured stdout on success, diagnostic text on failure.
    pub captured_output: String,
    /// The stage's output artifact path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_artifact: Option<PathBuf>,
    /// Whether the output artifact existed once the tool exited.
    #[serde(default)]
    pub artifact_produced: bool,
    /// Wall-clock duration of the process in milliseconds.
    pub duration_ms: f64,
}

impl RunRecord {
    /// Builds a record from a finished process outcome.
    #[must_use]
    pub fn from_outcome(
        stage_id: impl Into<String>,
        label: impl Into<String>,
        command: Vec<String>,
        outcome: &RunOutcome,
        output_artifact: Option<PathBuf>,
    ) -> Self {
        let artifact_produced = output_artifact.as_ref().is_some_and(|p| p.exists());
        Self {
            timestamp: now_utc(),
            stage_id: stage_id.into(),
            label: label.into(),
            command,
            outcome: ExitOutcome::from_ok(outcome.ok),
            kind: outcome.kind,
            captured_output: outcome.text.clone(),
            output_artifact,
            artifact_produced,
            duration_ms: outcome.duration_ms,
        }
    }

    /// Returns true if the record describes a successful run.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// The log header line identifying the stage and its output.
    #[must_use]
    pub fn header(&self) -> String {
        match self.output_artifact {
            Some(ref path) => format!("SCRIPT: {} — OUTPUT: {}", self.label, path.display()),
            None => format!("SCRIPT: {}", self.label),
        }
    }

    /// The log body: the literal command followed by the captured output.
    #[must_use]
    pub fn body(&self) -> String {
        format!(
            "COMMAND: {}\n\n{}",
            render_command(&self.command),
            self.captured_output
        )
    }
}

/// Renders an argument vector for the run log.
///
/// Arguments are space separated; an argument that is empty or contains
/// whitespace or a double quote is wrapped in double quotes (inner quotes
/// escaped) so argument boundaries survive in the log.
#[must_use]
pub fn render_command(command: &[String]) -> String {
    command
        .iter()
        .map(|arg| {
            if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"') {
                format!("\"{}\"", arg.replace('"', "\\\""))
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_render_command_plain() {
        let cmd = argv(&["python", "/tools/split.py", "/up/report.xlsx", "--output", "/out/a.xlsx"]);
        assert_eq!(
            render_command(&cmd),
            "python /tools/split.py /up/report.xlsx --output /out/a.xlsx"
        );
    }

    #[test]
    fn test_render_command_quotes_whitespace() {
        let cmd = argv(&["python", "/my tools/x.py", "", r#"say "hi""#]);
        assert_eq!(
            render_command(&cmd),
            r#"python "/my tools/x.py" "" "say \"hi\"""#
        );
    }

    #[test]
    fn test_record_from_success() {
        let outcome = RunOutcome::success("12 rows processed".to_string(), 5.0);
        let record = RunRecord::from_outcome(
            "vuln-devops",
            "split_vulns.py",
            argv(&["python", "split_vulns.py"]),
            &outcome,
            Some(PathBuf::from("/nonexistent/out.xlsx")),
        );

        assert!(record.is_success());
        assert_eq!(record.kind, OutcomeKind::Success);
        assert!(!record.artifact_produced);
        assert_eq!(
            record.header(),
            "SCRIPT: split_vulns.py — OUTPUT: /nonexistent/out.xlsx"
        );
        assert_eq!(
            record.body(),
            "COMMAND: python split_vulns.py\n\n12 rows processed"
        );
    }

    #[test]
    fn test_record_header_without_output() {
        let outcome = RunOutcome::launch_failure("nope", &std::io::Error::other("boom"), 0.0);
        let record = RunRecord::from_outcome("s", "tool", argv(&["nope"]), &outcome, None);

        assert!(!record.is_success());
        assert_eq!(record.header(), "SCRIPT: tool");
    }
}
