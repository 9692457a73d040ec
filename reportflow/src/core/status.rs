//! Status enums for stage invocations and sessions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The session-visible status of the most recent stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The last invocation succeeded.
    Success,
    /// The last invocation failed or was blocked.
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The outcome recorded for an executed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitOutcome {
    /// The external tool exited with code 0.
    Success,
    /// The tool exited non-zero, could not start, timed out or was cancelled.
    Failure,
}

impl ExitOutcome {
    /// Maps a runner's `ok` flag to an outcome.
    #[must_use]
    pub fn from_ok(ok: bool) -> Self {
        if ok {
            Self::Success
        } else {
            Self::Failure
        }
    }

    /// Returns true for [`ExitOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<ExitOutcome> for RunStatus {
    fn from(outcome: ExitOutcome) -> Self {
        match outcome {
            ExitOutcome::Success => Self::Success,
            ExitOutcome::Failure => Self::Error,
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// The lifecycle of a single stage invocation.
///
/// ```text
/// Pending -> DependencyCheck -> Blocked
///                            -> Running -> Succeeded
///                                       -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    /// Requested but not yet examined.
    #[default]
    Pending,
    /// Checking that the required input artifact exists.
    DependencyCheck,
    /// The input dependency is unmet; no process was started.
    Blocked,
    /// The external tool is running.
    Running,
    /// The tool exited successfully.
    Succeeded,
    /// The tool failed.
    Failed,
}

impl InvocationState {
    /// Returns true if the state ends the invocation.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Blocked | Self::Succeeded | Self::Failed)
    }

    /// Returns true if `next` is a legal successor of this state.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::DependencyCheck)
                | (Self::DependencyCheck, Self::Blocked | Self::Running)
                | (Self::Running, Self::Succeeded | Self::Failed)
        )
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::DependencyCheck => write!(f, "dependency_check"),
            Self::Blocked => write!(f, "blocked"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
