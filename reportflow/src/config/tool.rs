//! External tool configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How to launch the tool behind one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Program to execute. A bare name is looked up on `PATH`.
    #[serde(default = "default_program")]
    pub program: String,
    /// Script passed to the program, substituted for `{script}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
    /// Working directory of the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Deadline for this tool, overriding `process.timeout_seconds`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
}

fn default_program() -> String {
    "python".to_string()
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            script: None,
            working_dir: None,
            timeout_seconds: None,
        }
    }
}

impl ToolConfig {
    /// Creates a tool running `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Sets the script.
    #[must_use]
    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the per-tool deadline in seconds.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// The per-tool deadline, if configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs_f64)
    }

    /// Label for log headers: the script's file name, else the program.
    #[must_use]
    pub fn default_label(&self) -> String {
        self.script
            .as_deref()
            .and_then(Path::file_name)
            .map_or_else(
                || self.program.clone(),
                |name| name.to_string_lossy().into_owned(),
            )
    }

    /// Returns true if the program is given as a path rather than a bare name.
    #[must_use]
    pub fn program_is_path(&self) -> bool {
        self.program.contains(['/', '\\'])
    }
}

/// Searches `PATH` for an executable named `program`.
#[must_use]
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{program}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}
