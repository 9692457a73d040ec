//! Pipeline configuration.
//!
//! Configuration is a JSON document. Every field is optional:
//!
//! ```json
//! {
//!   "workspace": { "upload_dir": "uploads", "output_root": "reports", "logs_dir": "logs" },
//!   "logging": { "tail_max_chars": 20000, "record_uploads": true },
//!   "process": { "timeout_seconds": null, "serialize_output_writes": false },
//!   "resources": { "rules_folder": "rules" },
//!   "tools": { "vuln-devops": { "program": "python", "script": "tools/split_vulns.py" } }
//! }
//! ```
//!
//! Relative paths are resolved against the directory of the configuration
//! file when loaded with [`PipelineConfig::from_path`].

mod tool;

pub use tool::{find_on_path, ToolConfig};

use crate::errors::{ConfigError, ReportflowError, Result};
use crate::stages::{builtin_stages, StageBlueprint};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Filesystem locations used by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Where uploaded reports are stored.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Root that relative stage outputs are resolved against.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Directory holding the run logs.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("reports")
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_root: default_output_root(),
            logs_dir: default_logs_dir(),
        }
    }
}

/// Run log settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Size of the tail returned by log views, in bytes.
    #[serde(default = "default_tail_max_chars")]
    pub tail_max_chars: usize,
    /// Whether uploads write an audit entry to the processed log.
    #[serde(default = "default_record_uploads")]
    pub record_uploads: bool,
    /// File name of the processed log inside `logs_dir`.
    #[serde(default = "default_processed_file")]
    pub processed_file: String,
    /// File name of the error log inside `logs_dir`.
    #[serde(default = "default_error_file")]
    pub error_file: String,
}

fn default_tail_max_chars() -> usize {
    20_000
}

fn default_record_uploads() -> bool {
    true
}

fn default_processed_file() -> String {
    "processed.log".to_string()
}

fn default_error_file() -> String {
    "error.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            tail_max_chars: default_tail_max_chars(),
            record_uploads: default_record_uploads(),
            processed_file: default_processed_file(),
            error_file: default_error_file(),
        }
    }
}

/// External process settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Global deadline in seconds. `None` means processes may run forever.
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    /// Serialize runs that write the same output artifact.
    #[serde(default)]
    pub serialize_output_writes: bool,
}

/// The complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Filesystem locations.
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    /// Run log settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Process settings.
    #[serde(default)]
    pub process: ProcessConfig,
    /// Named resource paths usable as `{resource:NAME}`.
    #[serde(default)]
    pub resources: BTreeMap<String, PathBuf>,
    /// Tool per stage id.
    #[serde(default)]
    pub tools: BTreeMap<String, ToolConfig>,
    /// The stage catalog.
    #[serde(default = "builtin_stages")]
    pub stages: Vec<StageBlueprint>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace: WorkspaceConfig::default(),
            logging: LoggingConfig::default(),
            process: ProcessConfig::default(),
            resources: BTreeMap::new(),
            tools: BTreeMap::new(),
            stages: builtin_stages(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with the builtin catalog and no tools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration file and resolves its relative paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::new(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_json_str(&text)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_relative_paths(base);
        info!(path = %path.display(), tools = config.tools.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parses a configuration from JSON text. Paths are left as written.
    ///
    /// # Errors
    ///
    /// Returns [`ReportflowError::Serialization`] on malformed JSON.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ReportflowError::Serialization(e.to_string()))
    }

    /// Places the upload, output and log directories under `root`.
    #[must_use]
    pub fn with_workspace_root(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        self.workspace = WorkspaceConfig {
            upload_dir: root.join(default_upload_dir()),
            output_root: root.join(default_output_root()),
            logs_dir: root.join(default_logs_dir()),
        };
        self
    }

    /// Binds a tool to a stage.
    #[must_use]
    pub fn with_tool(mut self, stage_id: impl Into<String>, tool: ToolConfig) -> Self {
        self.tools.insert(stage_id.into(), tool);
        self
    }

    /// Adds a named resource.
    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.resources.insert(name.into(), path.into());
        self
    }

    /// Replaces the stage catalog.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<StageBlueprint>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the global process deadline.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.process.timeout_seconds = Some(seconds);
        self
    }

    /// Path of the processed log.
    #[must_use]
    pub fn processed_log_path(&self) -> PathBuf {
        self.workspace.logs_dir.join(&self.logging.processed_file)
    }

    /// Path of the error log.
    #[must_use]
    pub fn error_log_path(&self) -> PathBuf {
        self.workspace.logs_dir.join(&self.logging.error_file)
    }

    /// Deadline for a stage: the tool's own, else the global one.
    #[must_use]
    pub fn timeout_for(&self, stage_id: &str) -> Option<Duration> {
        self.tools
            .get(stage_id)
            .and_then(ToolConfig::timeout)
            .or_else(|| self.process.timeout_seconds.map(Duration::from_secs_f64))
    }

    /// Resolves every relative path against `base`.
    ///
    /// Programs are only resolved when written as a path; bare names are
    /// left for the `PATH` lookup. Stage outputs stay relative to the
    /// output root.
    pub fn resolve_relative_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        resolve(&mut self.workspace.upload_dir);
        resolve(&mut self.workspace.output_root);
        resolve(&mut self.workspace.logs_dir);

        for path in self.resources.values_mut() {
            resolve(path);
        }

        for tool in self.tools.values_mut() {
            if let Some(script) = tool.script.as_mut() {
                resolve(script);
            }
            if let Some(dir) = tool.working_dir.as_mut() {
                resolve(dir);
            }
            if tool.program_is_path() && Path::new(&tool.program).is_relative() {
                tool.program = base.join(&tool.program).to_string_lossy().into_owned();
            }
        }
    }

    /// Checks limits and the existence of every configured path.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, keyed by its configuration path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.tail_max_chars == 0 {
            return Err(ConfigError::new("tail_max_chars must be positive")
                .with_key("logging.tail_max_chars"));
        }
        if self.logging.processed_file == self.logging.error_file {
            return Err(
                ConfigError::new("processed and error logs must be different files")
                    .with_key("logging.error_file"),
            );
        }
        check_timeout(self.process.timeout_seconds, "process.timeout_seconds")?;

        for (name, path) in &self.resources {
            if !path.exists() {
                return Err(ConfigError::new(format!(
                    "resource '{name}' not found: {}",
                    path.display()
                ))
                .with_key(format!("resources.{name}")));
            }
        }

        let stage_ids: HashSet<&str> = self.stages.iter().map(|s| s.id.as_str()).collect();
        for (stage_id, tool) in &self.tools {
            let key = |field: &str| format!("tools.{stage_id}.{field}");
            if !stage_ids.contains(stage_id.as_str()) {
                return Err(ConfigError::new(format!(
                    "tool configured for unknown stage '{stage_id}'"
                ))
                .with_key(format!("tools.{stage_id}")));
            }
            check_timeout(tool.timeout_seconds, &key("timeout_seconds"))?;

            if tool.program.trim().is_empty() {
                return Err(ConfigError::new("program is empty").with_key(key("program")));
            }
            if tool.program_is_path() {
                if !Path::new(&tool.program).is_file() {
                    return Err(ConfigError::new(format!(
                        "program not found: {}",
                        tool.program
                    ))
                    .with_key(key("program")));
                }
            } else if find_on_path(&tool.program).is_none() {
                return Err(ConfigError::new(format!(
                    "program '{}' not found on PATH",
                    tool.program
                ))
                .with_key(key("program")));
            }

            if let Some(ref script) = tool.script {
                if !script.is_file() {
                    return Err(ConfigError::new(format!(
                        "script not found: {}",
                        script.display()
                    ))
                    .with_key(key("script")));
                }
            }
            if let Some(ref dir) = tool.working_dir {
                if !dir.is_dir() {
                    return Err(ConfigError::new(format!(
                        "working directory not found: {}",
                        dir.display()
                    ))
                    .with_key(key("working_dir")));
                }
            }
        }

        debug!(
            stages = self.stages.len(),
            tools = self.tools.len(),
            resources = self.resources.len(),
            "Configuration validated"
        );
        Ok(())
    }
}

fn check_timeout(seconds: Option<f64>, key: &str) -> Result<(), ConfigError> {
    match seconds {
        Some(s) if !(s.is_finite() && s > 0.0) => {
            Err(ConfigError::new(format!("timeout must be a positive number of seconds, got {s}"))
                .with_key(key))
        }
        _ => Ok(()),
    }
}
