//! The process runner seam and its system implementation.

use super::RunOutcome;
use crate::cancellation::CancellationToken;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// A request to run one external command.
#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    /// The literal argument vector; element 0 is the program.
    pub argv: Vec<String>,
    /// Working directory for the child, if any.
    pub working_dir: Option<PathBuf>,
    /// Deadline after which the child is killed. `None` means no deadline.
    pub timeout: Option<Duration>,
    /// Token that kills the child when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl ProcessRequest {
    /// Creates a request for the given argument vector.
    #[must_use]
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            ..Default::default()
        }
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    /// Sets the deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// The program (first argument), or an empty string for an empty vector.
    #[must_use]
    pub fn program(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }
}

/// Executes external commands and classifies their outcome.
///
/// Implementations must never panic or return an error: every failure is
/// reported as a failed [`RunOutcome`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs the command described by `request` to completion.
    async fn run(&self, request: &ProcessRequest) -> RunOutcome;
}

/// Runs commands as child processes via `tokio::process`.
///
/// Arguments are passed as a literal vector, never through a shell. Output
/// is decoded lossily, so undecodable bytes become U+FFFD.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    /// Creates a new system runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, request: &ProcessRequest) -> RunOutcome {
        let start = Instant::now();
        let elapsed_ms = || start.elapsed().as_secs_f64() * 1000.0;

        let Some((program, args)) = request.argv.split_first() else {
            let err = std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty command vector",
            );
            return RunOutcome::launch_failure("", &err, 0.0);
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = request.working_dir {
            command.current_dir(dir);
        }

        debug!(program = %program, args = ?args, cwd = ?request.working_dir, "Spawning process");

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %program, error = %e, "Failed to launch process");
                return RunOutcome::launch_failure(program, &e, elapsed_ms());
            }
        };

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            result = child.wait_with_output() => result,
            () = deadline(request.timeout) => {
                let timeout = request.timeout.unwrap_or_default();
                warn!(program = %program, timeout_s = timeout.as_secs_f64(), "Process timed out");
                return RunOutcome::timed_out(timeout, elapsed_ms());
            }
            () = cancellation(request.cancel.as_ref()) => {
                let reason = request.cancel.as_ref().and_then(CancellationToken::reason);
                warn!(program = %program, reason = ?reason, "Process cancelled");
                return RunOutcome::cancelled(reason.as_deref(), elapsed_ms());
            }
        };

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if output.status.success() {
                    RunOutcome::success(stdout.into_owned(), elapsed_ms())
                } else {
                    RunOutcome::non_zero_exit(output.status.code(), &stdout, &stderr, elapsed_ms())
                }
            }
            Err(e) => {
                warn!(program = %program, error = %e, "Failed while waiting for process");
                RunOutcome::launch_failure(program, &e, elapsed_ms())
            }
        }
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

async fn cancellation(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::OutcomeKind;

    fn sh(script: &str) -> ProcessRequest {
        ProcessRequest::new(vec!["sh".to_string(), "-c".to_string(), script.to_string()])
    }

    #[test]
    fn test_request_builder() {
        let request = ProcessRequest::new(vec!["python".to_string(), "x.py".to_string()])
            .with_working_dir(Some(PathBuf::from("/tmp")))
            .with_timeout(Some(Duration::from_secs(5)));

        assert_eq!(request.program(), "python");
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
        assert!(request.cancel.is_none());
    }

    #[tokio::test]
    async fn test_empty_argv_is_launch_failure() {
        let outcome = SystemProcessRunner::new().run(&ProcessRequest::default()).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.kind, OutcomeKind::LaunchFailure);
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_failure() {
        let request = ProcessRequest::new(vec!["/definitely/not/a/program".to_string()]);
        let outcome = SystemProcessRunner::new().run(&request).await;

        assert!(!outcome.ok);
        assert_eq!(outcome.kind, OutcomeKind::LaunchFailure);
        assert!(outcome.text.contains("/definitely/not/a/program"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_captures_stdout() {
        let outcome = SystemProcessRunner::new()
            .run(&sh("printf '12 rows processed'"))
            .await;

        assert!(outcome.ok);
        assert_eq!(outcome.text, "12 rows processed");
        assert_eq!(outcome.kind, OutcomeKind::Success);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_captures_both_streams() {
        let outcome = SystemProcessRunner::new()
            .run(&sh("echo partial; echo 'missing column' >&2; exit 1"))
            .await;

        assert!(!outcome.ok);
        assert_eq!(outcome.exit_code, Some(1));
        assert!(outcome.text.contains("RETURN CODE: 1"));
        assert!(outcome.text.contains("missing column"));
        assert!(outcome.text.contains("partial"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_arguments_are_not_shell_interpreted() {
        let request = ProcessRequest::new(vec![
            "printf".to_string(),
            "%s".to_string(),
            "$(echo injected); rm -rf /".to_string(),
        ]);
        let outcome = SystemProcessRunner::new().run(&request).await;

        assert!(outcome.ok);
        assert_eq!(outcome.text, "$(echo injected); rm -rf /");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let outcome = SystemProcessRunner::new()
            .run(&sh("printf 'ok\\377done'"))
            .await;

        assert!(outcome.ok);
        assert!(outcome.text.contains('\u{FFFD}'));
        assert!(outcome.text.ends_with("done"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_working_directory_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let request = sh("pwd").with_working_dir(Some(dir.path().to_path_buf()));
        let outcome = SystemProcessRunner::new().run(&request).await;

        assert!(outcome.ok);
        let reported = PathBuf::from(outcome.text.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let request = sh("sleep 5").with_timeout(Some(Duration::from_millis(100)));
        let outcome = SystemProcessRunner::new().run(&request).await;

        assert!(!outcome.ok);
        assert_eq!(outcome.kind, OutcomeKind::TimedOut);
        assert!(outcome.duration_ms < 4000.0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_kills_process() {
        let token = CancellationToken::new();
        let request = sh("sleep 5").with_cancellation(Some(token.clone()));

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel("operator abort");
        });

        let outcome = SystemProcessRunner::new().run(&request).await;
        canceller.await.unwrap();

        assert!(!outcome.ok);
        assert_eq!(outcome.kind, OutcomeKind::Cancelled);
        assert!(outcome.text.contains("operator abort"));
    }
}
