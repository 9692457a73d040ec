//! Per-operator session state.
//!
//! A [`Session`] remembers the uploaded report and the result of the most
//! recent stage run. The orchestrator borrows it mutably for the duration of
//! one call and keeps no reference afterwards.

mod store;

pub use store::SessionStore;

use crate::core::RunStatus;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The status shown to an operator after each action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LatestStatus {
    /// The uploaded report, if any.
    pub uploaded_artifact: Option<PathBuf>,
    /// Output of the last stage run, or the reason it was blocked.
    pub last_output: Option<String>,
    /// Status of the last stage run.
    pub last_status: Option<RunStatus>,
}

/// State owned by one operator session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: Uuid,
    uploaded_artifact: Option<PathBuf>,
    last_output: Option<String>,
    last_status: Option<RunStatus>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates an empty session with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    /// Creates an empty session with the given id.
    #[must_use]
    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            uploaded_artifact: None,
            last_output: None,
            last_status: None,
        }
    }

    /// The session id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The uploaded report.
    #[must_use]
    pub fn uploaded_artifact(&self) -> Option<&Path> {
        self.uploaded_artifact.as_deref()
    }

    /// Output of the last stage run.
    #[must_use]
    pub fn last_output(&self) -> Option<&str> {
        self.last_output.as_deref()
    }

    /// Status of the last stage run.
    #[must_use]
    pub fn last_status(&self) -> Option<RunStatus> {
        self.last_status
    }

    /// Records a new upload and resets the run status.
    pub fn record_upload(&mut self, path: PathBuf) {
        self.uploaded_artifact = Some(path);
        self.last_output = None;
        self.last_status = None;
    }

    /// Records the outcome of a stage run, replacing the previous one.
    pub fn record_result(&mut self, status: RunStatus, output: impl Into<String>) {
        self.last_status = Some(status);
        self.last_output = Some(output.into());
    }

    /// Snapshot of the status fields.
    #[must_use]
    pub fn latest_status(&self) -> LatestStatus {
        LatestStatus {
            uploaded_artifact: self.uploaded_artifact.clone(),
            last_output: self.last_output.clone(),
            last_status: self.last_status,
        }
    }
}
