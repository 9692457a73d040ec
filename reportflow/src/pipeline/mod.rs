//! Stage execution.
//!
//! This module provides:
//! - [`Orchestrator`], which drives one stage invocation through
//!   dependency check, process run, logging and session update
//! - [`OutputLocks`], which optionally serialize runs sharing an output path

mod locks;
mod orchestrator;

pub use locks::OutputLocks;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, StageRun};
