//! The pipeline orchestrator.

use super::OutputLocks;
use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{InvocationState, RunRecord, RunStatus};
use crate::errors::Result;
use crate::events::{types, EventSink, NoOpEventSink};
use crate::logs::{upload_header, LogEntry, LogKind, LogMetadata, RunLogger};
use crate::observability::SpanTimer;
use crate::process::{ProcessRequest, ProcessRunner, SystemProcessRunner};
use crate::session::{LatestStatus, Session};
use crate::stages::{StageDefinition, StageRegistry};
use crate::store::ArtifactStore;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The result of a stage invocation that reached a process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRun {
    /// The stage that ran.
    pub stage_id: String,
    /// Terminal state: [`InvocationState::Succeeded`] or [`InvocationState::Failed`].
    pub state: InvocationState,
    /// The record written to the run log.
    pub record: RunRecord,
}

impl StageRun {
    /// True iff the tool exited with code 0.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.record.is_success()
    }

    /// Captured stdout on success, diagnostic text on failure.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.record.captured_output
    }

    /// The log the record was written to.
    #[must_use]
    pub fn log(&self) -> LogKind {
        if self.ok() {
            LogKind::Processed
        } else {
            LogKind::Error
        }
    }
}

/// Builds an [`Orchestrator`] with injectable collaborators.
pub struct OrchestratorBuilder {
    config: PipelineConfig,
    runner: Arc<dyn ProcessRunner>,
    events: Arc<dyn EventSink>,
    check_paths: bool,
}

impl OrchestratorBuilder {
    /// Starts from a configuration with the system runner and no events.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            runner: Arc::new(SystemProcessRunner::new()),
            events: Arc::new(NoOpEventSink),
            check_paths: true,
        }
    }

    /// Replaces the process runner.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Skips the existence checks of programs, scripts and resources.
    ///
    /// For runners that never launch the configured tools.
    #[must_use]
    pub fn skip_path_checks(mut self) -> Self {
        self.check_paths = false;
        self
    }

    /// Validates the configuration and prepares the workspace.
    ///
    /// # Errors
    ///
    /// Returns configuration and catalog errors, or an I/O error if the
    /// upload or output directories cannot be created.
    pub fn build(self) -> Result<Orchestrator> {
        let config = self.config;
        if self.check_paths {
            config.validate()?;
        }

        let registry = StageRegistry::from_config(&config)?;
        let store = ArtifactStore::new(
            config.workspace.upload_dir.clone(),
            config.workspace.output_root.clone(),
        );
        store.initialize()?;
        let logger = RunLogger::from_config(&config);
        let timeouts: HashMap<String, Duration> = registry
            .stages()
            .filter_map(|stage| {
                config
                    .timeout_for(&stage.id)
                    .map(|timeout| (stage.id.clone(), timeout))
            })
            .collect();

        let output_locks = config
            .process
            .serialize_output_writes
            .then(OutputLocks::new);

        info!(
            stages = registry.len(),
            serialize_output_writes = output_locks.is_some(),
            "Orchestrator ready"
        );

        Ok(Orchestrator {
            registry,
            store,
            logger,
            runner: self.runner,
            events: self.events,
            output_locks,
            timeouts,
            tail_max_chars: config.logging.tail_max_chars,
            record_uploads: config.logging.record_uploads,
        })
    }
}

/// Runs stages on behalf of operator sessions.
///
/// The orchestrator holds no session state. Every operation that reads or
/// changes a session takes it as an argument.
pub struct Orchestrator {
    registry: StageRegistry,
    store: ArtifactStore,
    logger: RunLogger,
    runner: Arc<dyn ProcessRunner>,
    events: Arc<dyn EventSink>,
    output_locks: Option<OutputLocks>,
    timeouts: HashMap<String, Duration>,
    tail_max_chars: usize,
    record_uploads: bool,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("store", &self.store)
            .field("logger", &self.logger)
            .field("timeouts", &self.timeouts)
            .field("tail_max_chars", &self.tail_max_chars)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Builds an orchestrator with the system runner.
    ///
    /// # Errors
    ///
    /// See [`OrchestratorBuilder::build`].
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        OrchestratorBuilder::new(config).build()
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder(config: PipelineConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// The stage registry.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// The artifact store.
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// The run logger.
    #[must_use]
    pub fn logger(&self) -> &RunLogger {
        &self.logger
    }

    /// Runnable stages in catalog order.
    pub fn stages(&self) -> impl Iterator<Item = &StageDefinition> {
        self.registry.stages()
    }

    /// Stores an uploaded report and makes it the session's input.
    ///
    /// On success the session's last output and status are reset. A rejected
    /// upload, or one whose audit entry cannot be written, leaves the session
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReportflowError::InvalidExtension`] or
    /// [`crate::ReportflowError::EmptyFilename`] for rejected uploads, and I/O
    /// errors from storing the file or writing the audit entry.
    pub fn upload(&self, session: &mut Session, bytes: &[u8], filename: &str) -> Result<PathBuf> {
        let path = match self.store.store_upload(bytes, filename) {
            Ok(path) => path,
            Err(e) => {
                warn!(session = %session.id(), filename, error = %e, "Upload rejected");
                self.events.try_emit(
                    types::UPLOAD_REJECTED,
                    Some(json!({
                        "session_id": session.id().to_string(),
                        "filename": filename,
                        "code": e.code(),
                        "error": e.to_string(),
                    })),
                );
                return Err(e);
            }
        };

        let stored_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.record_uploads {
            self.logger.append_entry(
                LogKind::Processed,
                &upload_header(&stored_name),
                &format!(
                    "Saved to: {}\nUploaded by session {}",
                    path.display(),
                    session.id()
                ),
            )?;
        }

        session.record_upload(path.clone());
        info!(session = %session.id(), path = %path.display(), "Upload accepted");
        self.events.try_emit(
            types::UPLOAD_ACCEPTED,
            Some(json!({
                "session_id": session.id().to_string(),
                "filename": stored_name,
                "path": path.display().to_string(),
                "bytes": bytes.len(),
            })),
        );
        Ok(path)
    }

    /// Runs one stage for the session.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::run_stage_with_cancel`].
    pub async fn run_stage(&self, session: &mut Session, stage_id: &str) -> Result<StageRun> {
        self.run_stage_with_cancel(session, stage_id, None).await
    }

    /// Runs one stage, killing its process if `cancel` fires.
    ///
    /// A stage whose dependency is unmet is blocked: the session records an
    /// error naming the missing prerequisite, no process starts and nothing
    /// is logged. A stage that ran returns `Ok` whether the tool succeeded or
    /// failed; the record goes to the processed or error log accordingly.
    ///
    /// # Errors
    ///
    /// - [`crate::ReportflowError::UnknownStage`] for an unknown or unconfigured stage
    /// - [`crate::ReportflowError::MissingUpload`] and
    ///   [`crate::ReportflowError::MissingPredecessorOutput`] when blocked
    /// - I/O errors creating the output directory or writing the log
    pub async fn run_stage_with_cancel(
        &self,
        session: &mut Session,
        stage_id: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<StageRun> {
        let mut state = InvocationState::Pending;
        advance(&mut state, InvocationState::DependencyCheck);

        let prepared = match self
            .registry
            .prepare(stage_id, session.uploaded_artifact(), &self.store)
        {
            Ok(prepared) => prepared,
            Err(e) if e.is_dependency_unmet() => {
                advance(&mut state, InvocationState::Blocked);
                let reason = e.to_string();
                warn!(stage = %stage_id, session = %session.id(), reason = %reason, "Stage blocked");
                session.record_result(RunStatus::Error, reason.clone());
                self.events
                    .emit(
                        types::STAGE_BLOCKED,
                        Some(json!({
                            "stage": stage_id,
                            "session_id": session.id().to_string(),
                            "code": e.code(),
                            "reason": reason,
                        })),
                    )
                    .await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let stage = prepared.stage;
        self.store.ensure_parent(&stage.output_path)?;

        let _output_guard = match self.output_locks {
            Some(ref locks) => Some(locks.acquire(&stage.output_path).await),
            None => None,
        };

        advance(&mut state, InvocationState::Running);
        let tool = prepared.tool();
        let request = ProcessRequest::new(prepared.argv.clone())
            .with_working_dir(tool.and_then(|t| t.working_dir.clone()))
            .with_timeout(self.timeouts.get(stage_id).copied())
            .with_cancellation(cancel);

        info!(stage = %stage_id, session = %session.id(), "Stage started");
        self.events
            .emit(
                types::STAGE_STARTED,
                Some(json!({
                    "stage": stage_id,
                    "session_id": session.id().to_string(),
                    "command": prepared.argv,
                })),
            )
            .await;

        let timer = SpanTimer::start(format!("stage.{stage_id}"));
        let outcome = self.runner.run(&request).await;
        let elapsed_ms = timer.finish();

        let record = RunRecord::from_outcome(
            stage_id,
            stage.label.clone(),
            prepared.argv,
            &outcome,
            Some(stage.output_path.clone()),
        );

        session.record_result(RunStatus::from(record.outcome), outcome.text.clone());
        self.logger.append_record(&record)?;

        let (next, event) = if record.is_success() {
            (InvocationState::Succeeded, types::STAGE_COMPLETED)
        } else {
            (InvocationState::Failed, types::STAGE_FAILED)
        };
        advance(&mut state, next);

        if record.is_success() {
            if !record.artifact_produced {
                warn!(
                    stage = %stage_id,
                    output = %stage.output_path.display(),
                    "Tool succeeded but did not produce its output artifact"
                );
            }
            info!(stage = %stage_id, duration_ms = elapsed_ms, "Stage succeeded");
        } else {
            warn!(
                stage = %stage_id,
                kind = %record.kind,
                exit_code = ?outcome.exit_code,
                duration_ms = elapsed_ms,
                "Stage failed"
            );
        }

        self.events
            .emit(
                event,
                Some(json!({
                    "stage": stage_id,
                    "session_id": session.id().to_string(),
                    "ok": record.is_success(),
                    "kind": record.kind,
                    "exit_code": outcome.exit_code,
                    "duration_ms": record.duration_ms,
                    "output_artifact": stage.output_path.display().to_string(),
                    "artifact_produced": record.artifact_produced,
                })),
            )
            .await;

        Ok(StageRun {
            stage_id: stage_id.to_string(),
            state,
            record,
        })
    }

    /// The session's upload and last run result.
    #[must_use]
    pub fn latest_status(&self, session: &Session) -> LatestStatus {
        session.latest_status()
    }

    /// The tail of a log, bounded by `logging.tail_max_chars`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log exists but cannot be read.
    pub fn view_log(&self, which: LogKind) -> Result<String> {
        self.logger.tail(which, self.tail_max_chars)
    }

    /// Truncates a log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be truncated.
    pub fn clear_log(&self, which: LogKind) -> Result<()> {
        self.logger.clear(which)?;
        self.events
            .try_emit(types::LOG_CLEARED, Some(json!({ "log": which })));
        Ok(())
    }

    /// The full content of a log.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReportflowError::LogNotFound`] if the log has never been written.
    pub fn download_log(&self, which: LogKind) -> Result<Vec<u8>> {
        self.logger.read_all(which)
    }

    /// Existence, size and modification time of a log.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    pub fn log_metadata(&self, which: LogKind) -> Result<LogMetadata> {
        self.logger.metadata(which)
    }

    /// Every entry of a log, parsed.
    ///
    /// # Errors
    ///
    /// Returns an error if the log exists but cannot be read.
    pub fn log_entries(&self, which: LogKind) -> Result<Vec<LogEntry>> {
        self.logger.entries(which)
    }
}

fn advance(state: &mut InvocationState, next: InvocationState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal transition {state} -> {next}"
    );
    debug!(from = %state, to = %next, "Invocation state");
    *state = next;
}
