//! Pipeline lifecycle events.
//!
//! The orchestrator reports every state transition of a stage invocation,
//! every upload decision and every log clear to an [`EventSink`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event names.
pub mod types {
    /// A stage's dependency was unmet; no process ran.
    pub const STAGE_BLOCKED: &str = "stage.blocked";
    /// A stage's process is about to start.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage's process exited successfully.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage's process failed.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// An upload was stored.
    pub const UPLOAD_ACCEPTED: &str = "upload.accepted";
    /// An upload was rejected.
    pub const UPLOAD_REJECTED: &str = "upload.rejected";
    /// A run log was cleared.
    pub const LOG_CLEARED: &str = "log.cleared";

    pub(crate) fn is_problem(event_type: &str) -> bool {
        matches!(event_type, STAGE_BLOCKED | STAGE_FAILED | UPLOAD_REJECTED)
    }
}
