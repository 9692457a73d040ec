//! External process execution.
//!
//! This module provides:
//! - [`ProcessRunner`], the seam the orchestrator invokes tools through
//! - [`SystemProcessRunner`], the `tokio::process` implementation
//! - [`RunOutcome`], the classified result of one run

mod outcome;
mod runner;

pub use outcome::{OutcomeKind, RunOutcome};
#[cfg(test)]
pub use runner::MockProcessRunner;
pub use runner::{ProcessRequest, ProcessRunner, SystemProcessRunner};
