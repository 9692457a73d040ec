//! Cooperative cancellation for running stages.
//!
//! A [`CancellationToken`] handed to the orchestrator aborts the external
//! process of the stage it guards.

mod token;

pub use token::CancellationToken;
