//! Error types for the reportflow orchestration core.
//!
//! Operator sequencing mistakes (missing upload, missing predecessor output)
//! and rejected uploads are errors. External tool failures are not: the
//! process runner turns them into failed [`RunOutcome`](crate::process::RunOutcome)s
//! so that they can be logged and reported like any other stage result.

use crate::logs::LogKind;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = ReportflowError> = std::result::Result<T, E>;

/// The main error type for reportflow operations.
#[derive(Debug, Error)]
pub enum ReportflowError {
    /// An upload was rejected because of its extension.
    #[error("File type not allowed: '{filename}' (allowed: {})", allowed.join(", "))]
    InvalidExtension {
        /// The filename as supplied by the caller.
        filename: String,
        /// The accepted extensions.
        allowed: Vec<String>,
    },

    /// An upload had no usable filename.
    #[error("No file selected: the uploaded filename is empty")]
    EmptyFilename,

    /// A stage needs the uploaded report but the session has none.
    #[error("Stage '{stage}' requires an uploaded report. Upload a report first.")]
    MissingUpload {
        /// The requested stage.
        stage: String,
    },

    /// A stage needs the output of a predecessor that has not been produced.
    #[error(
        "Required input not found:\n{}\n\nRun '{predecessor_name}' first.",
        path.display()
    )]
    MissingPredecessorOutput {
        /// The requested stage.
        stage: String,
        /// Id of the stage that must run first.
        predecessor: String,
        /// Display name of the stage that must run first.
        predecessor_name: String,
        /// The artifact path that was checked.
        path: PathBuf,
    },

    /// The requested stage is not registered.
    #[error("Unknown stage: '{stage}'")]
    UnknownStage {
        /// The requested stage id.
        stage: String,
    },

    /// The configuration is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The stage catalog failed validation.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A log was requested for download but has never been written.
    #[error("Log file not found: {which} log")]
    LogNotFound {
        /// Which log was requested.
        which: LogKind,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportflowError {
    /// Creates an invalid extension error.
    #[must_use]
    pub fn invalid_extension(filename: impl Into<String>, allowed: &[&str]) -> Self {
        Self::InvalidExtension {
            filename: filename.into(),
            allowed: allowed.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Creates a missing upload error.
    #[must_use]
    pub fn missing_upload(stage: impl Into<String>) -> Self {
        Self::MissingUpload {
            stage: stage.into(),
        }
    }

    /// Creates an unknown stage error.
    #[must_use]
    pub fn unknown_stage(stage: impl Into<String>) -> Self {
        Self::UnknownStage {
            stage: stage.into(),
        }
    }

    /// Returns true if this error means a stage's precondition was not met.
    #[must_use]
    pub fn is_dependency_unmet(&self) -> bool {
        matches!(
            self,
            Self::MissingUpload { .. } | Self::MissingPredecessorOutput { .. }
        )
    }

    /// Returns a stable machine-readable code for the error kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidExtension { .. } => "invalid_extension",
            Self::EmptyFilename => "empty_filename",
            Self::MissingUpload { .. } => "missing_upload",
            Self::MissingPredecessorOutput { .. } => "missing_predecessor_output",
            Self::UnknownStage { .. } => "unknown_stage",
            Self::Config(_) => "config",
            Self::Validation(_) => "validation",
            Self::LogNotFound { .. } => "log_not_found",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::MissingUpload { stage } | Self::UnknownStage { stage } => {
                map.insert("stage".to_string(), serde_json::json!(stage));
            }
            Self::MissingPredecessorOutput {
                stage,
                predecessor,
                path,
                ..
            } => {
                map.insert("stage".to_string(), serde_json::json!(stage));
                map.insert("predecessor".to_string(), serde_json::json!(predecessor));
                map.insert(
                    "path".to_string(),
                    serde_json::json!(path.display().to_string()),
                );
            }
            Self::InvalidExtension { filename, .. } => {
                map.insert("filename".to_string(), serde_json::json!(filename));
            }
            _ => {}
        }

        map
    }
}

/// Error raised when the configuration is unusable.
#[derive(Debug, Clone, Error)]
#[error("Configuration error: {message}")]
pub struct ConfigError {
    /// The error message.
    pub message: String,
    /// The configuration key involved, if known (e.g. `tools.vuln-devops.script`).
    pub key: Option<String>,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            key: None,
        }
    }

    /// Sets the offending key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Error raised when the stage catalog fails validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            fix_hint: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }
}

/// Error raised when a cycle is detected among stage dependencies.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in stage dependencies: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle.
    pub cycle_path: Vec<String>,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        Self { cycle_path }
    }
}

impl From<CycleDetectedError> for PipelineValidationError {
    fn from(err: CycleDetectedError) -> Self {
        Self {
            message: err.to_string(),
            stages: err.cycle_path,
            fix_hint: Some(
                "Remove one of the input dependencies in the cycle to break it.".to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_extension_message() {
        let err = ReportflowError::invalid_extension("data.txt", &["xlsx", "xls", "csv"]);
        assert_eq!(
            err.to_string(),
            "File type not allowed: 'data.txt' (allowed: xlsx, xls, csv)"
        );
        assert_eq!(err.code(), "invalid_extension");
        assert!(!err.is_dependency_unmet());
    }

    #[test]
    fn test_missing_predecessor_names_stage() {
        let err = ReportflowError::MissingPredecessorOutput {
            stage: "misconfig-final".to_string(),
            predecessor: "misconfig-aha".to_string(),
            predecessor_name: "Misconfiguration AHA / PMP / AZURE / PP Report".to_string(),
            path: PathBuf::from("/out/aha.xlsx"),
        };

        let message = err.to_string();
        assert!(message.starts_with("Required input not found:\n/out/aha.xlsx"));
        assert!(message.contains("Run 'Misconfiguration AHA / PMP / AZURE / PP Report' first."));
        assert!(err.is_dependency_unmet());

        let dict = err.to_dict();
        assert_eq!(dict.get("predecessor").unwrap(), "misconfig-aha");
        assert_eq!(dict.get("code").unwrap(), "missing_predecessor_output");
    }

    #[test]
    fn test_cycle_detected_error() {
        let err = CycleDetectedError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert!(err.to_string().contains("a -> b -> a"));

        let validation: PipelineValidationError = err.into();
        assert_eq!(validation.stages.len(), 3);
        assert!(validation.fix_hint.is_some());
    }

    #[test]
    fn test_config_error_with_key() {
        let err = ConfigError::new("script not found").with_key("tools.vuln-devops.script");
        assert_eq!(err.key.as_deref(), Some("tools.vuln-devops.script"));
        assert_eq!(err.to_string(), "Configuration error: script not found");
    }
}
