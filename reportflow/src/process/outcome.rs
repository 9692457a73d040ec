//! Process outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Finer classification of how a process run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Exit code 0.
    Success,
    /// The process ran and exited with a non-zero code (or was killed by a signal).
    NonZeroExit,
    /// The process could not be started, or waiting on it failed.
    LaunchFailure,
    /// A configured deadline expired and the process was killed.
    TimedOut,
    /// The invocation's cancellation token fired and the process was killed.
    Cancelled,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::NonZeroExit => write!(f, "non_zero_exit"),
            Self::LaunchFailure => write!(f, "launch_failure"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The result of running one external command.
///
/// `text` is the captured stdout on success and a human-readable diagnostic
/// body otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// True iff the process exited with code 0.
    pub ok: bool,
    /// Stdout on success, diagnostic text on failure.
    pub text: String,
    /// How the run ended.
    pub kind: OutcomeKind,
    /// The exit code, when the process exited normally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl RunOutcome {
    /// A successful run with captured stdout.
    #[must_use]
    pub fn success(stdout: String, duration_ms: f64) -> Self {
        Self {
            ok: true,
            text: stdout,
            kind: OutcomeKind::Success,
            exit_code: Some(0),
            duration_ms,
        }
    }

    /// A run that exited with a non-zero code.
    #[must_use]
    pub fn non_zero_exit(
        exit_code: Option<i32>,
        stdout: &str,
        stderr: &str,
        duration_ms: f64,
    ) -> Self {
        let code = exit_code.map_or_else(
            || "unknown (terminated by signal)".to_string(),
            |c| c.to_string(),
        );
        Self {
            ok: false,
            text: format!("RETURN CODE: {code}\n\nSTDERR:\n{stderr}\n\nSTDOUT:\n{stdout}"),
            kind: OutcomeKind::NonZeroExit,
            exit_code,
            duration_ms,
        }
    }

    /// A process that could not be started or waited on.
    #[must_use]
    pub fn launch_failure(program: &str, error: &std::io::Error, duration_ms: f64) -> Self {
        Self {
            ok: false,
            text: format!("Exception while running command:\n{program}: {error}"),
            kind: OutcomeKind::LaunchFailure,
            exit_code: None,
            duration_ms,
        }
    }

    /// A process killed after exceeding its deadline.
    #[must_use]
    pub fn timed_out(timeout: Duration, duration_ms: f64) -> Self {
        Self {
            ok: false,
            text: format!(
                "TIMED OUT: process exceeded the configured timeout of {:.1}s and was terminated",
                timeout.as_secs_f64()
            ),
            kind: OutcomeKind::TimedOut,
            exit_code: None,
            duration_ms,
        }
    }

    /// A process killed because its invocation was cancelled.
    #[must_use]
    pub fn cancelled(reason: Option<&str>, duration_ms: f64) -> Self {
        Self {
            ok: false,
            text: format!(
                "CANCELLED: process was terminated ({})",
                reason.unwrap_or("no reason given")
            ),
            kind: OutcomeKind::Cancelled,
            exit_code: None,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_success_keeps_stdout_verbatim() {
        let outcome = RunOutcome::success("12 rows processed".to_string(), 1.0);
        assert!(outcome.ok);
        assert_eq!(outcome.text, "12 rows processed");
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[test]
    fn test_non_zero_exit_diagnostic() {
        let outcome = RunOutcome::non_zero_exit(Some(1), "partial", "missing column", 2.0);
        assert!(!outcome.ok);
        assert_eq!(outcome.kind, OutcomeKind::NonZeroExit);
        assert_eq!(
            outcome.text,
            "RETURN CODE: 1\n\nSTDERR:\nmissing column\n\nSTDOUT:\npartial"
        );
    }

    #[test]
    fn test_non_zero_exit_without_code() {
        let outcome = RunOutcome::non_zero_exit(None, "", "", 0.0);
        assert!(outcome.text.starts_with("RETURN CODE: unknown"));
    }

    #[test]
    fn test_launch_failure_mentions_program() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory");
        let outcome = RunOutcome::launch_failure("/opt/missing", &err, 0.0);
        assert!(!outcome.ok);
        assert_eq!(outcome.kind, OutcomeKind::LaunchFailure);
        assert!(outcome.text.contains("/opt/missing"));
        assert!(outcome.text.contains("No such file or directory"));
    }

    #[test]
    fn test_timed_out_and_cancelled() {
        let timed_out = RunOutcome::timed_out(Duration::from_secs(3), 3000.0);
        assert_eq!(timed_out.kind, OutcomeKind::TimedOut);
        assert!(timed_out.text.contains("3.0s"));

        let cancelled = RunOutcome::cancelled(Some("operator"), 10.0);
        assert_eq!(cancelled.kind, OutcomeKind::Cancelled);
        assert!(cancelled.text.contains("operator"));
    }
}
