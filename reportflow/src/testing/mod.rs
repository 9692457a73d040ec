//! Testing utilities for reportflow pipelines.
//!
//! This module provides:
//! - [`ScriptedRunner`], a process runner returning queued outcomes
//! - [`TestWorkspace`], a workspace with shell tool scripts for every stage

mod fixtures;
mod mocks;

pub use fixtures::{TestWorkspace, FAILURE_SCRIPT, SUCCESS_SCRIPT};
pub use mocks::ScriptedRunner;
