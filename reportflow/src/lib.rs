//! # Reportflow
//!
//! Orchestration core for running report transformation tools as a staged
//! pipeline.
//!
//! An operator uploads a spreadsheet report, then triggers stages one at a
//! time. Each stage runs an external tool that reads either the upload or a
//! predecessor stage's output and writes its own output artifact. Reportflow
//! provides:
//!
//! - **Artifact store**: sanitized uploads and deterministic output paths
//! - **Stage registry**: a validated catalog with dependency checks
//! - **Process runner**: literal argument vectors, timeouts and cancellation
//! - **Run logs**: append-only processed and error logs with bounded tails
//! - **Sessions**: per-operator upload and last-result state
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reportflow::prelude::*;
//!
//! let config = PipelineConfig::from_path(Path::new("reportflow.json"))?;
//! let orchestrator = Orchestrator::from_config(config)?;
//!
//! let mut session = Session::new();
//! orchestrator.upload(&mut session, &bytes, "findings.xlsx")?;
//! let run = orchestrator.run_stage(&mut session, "vuln-devops").await?;
//! println!("{}", run.output());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod logs;
pub mod observability;
pub mod pipeline;
pub mod process;
pub mod session;
pub mod stages;
pub mod store;
pub mod testing;
pub mod utils;

pub use errors::{ConfigError, ReportflowError, Result};
pub use pipeline::Orchestrator;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{PipelineConfig, ToolConfig};
    pub use crate::core::{InvocationState, RunRecord, RunStatus};
    pub use crate::errors::{
        ConfigError, CycleDetectedError, PipelineValidationError, ReportflowError, Result,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::logs::{LogEntry, LogKind, LogMetadata, RunLogger};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{Orchestrator, OrchestratorBuilder, StageRun};
    pub use crate::process::{ProcessRunner, RunOutcome, SystemProcessRunner};
    pub use crate::session::{LatestStatus, Session, SessionStore};
    pub use crate::stages::{StageDefinition, StageRegistry};
    pub use crate::store::ArtifactStore;
    pub use crate::utils::Timestamp;
}
