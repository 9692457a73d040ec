//! Core domain model types for reportflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Run, outcome and invocation state enums
//! - Run records written to the run logs

mod record;
mod status;

pub use record::{render_command, RunRecord};
pub use status::{ExitOutcome, InvocationState, RunStatus};
