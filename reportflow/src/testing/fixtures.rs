//! Workspace fixtures for pipeline tests.

use crate::config::{PipelineConfig, ToolConfig};
use crate::stages::{builtin_stages, JUSTIFICATION_FILE, RULES_FOLDER};
use std::io;
use std::path::{Path, PathBuf};

/// Shell script body that writes its last argument and prints a summary.
pub const SUCCESS_SCRIPT: &str = "for out; do :; done\nprintf 'artifact' > \"$out\"\nprintf '12 rows processed'\n";

/// Shell script body that fails the way a tool rejecting its input does.
pub const FAILURE_SCRIPT: &str = "echo 'reading report'\necho 'missing column' >&2\nexit 1\n";

/// A directory laid out like a deployment: tool scripts, resources and
/// the workspace directories the orchestrator writes to.
///
/// Every builtin stage gets a `sh` script under `tools/` that succeeds. Use
/// [`TestWorkspace::write_tool`] to replace one.
#[derive(Debug, Clone)]
pub struct TestWorkspace {
    root: PathBuf,
}

impl TestWorkspace {
    /// Lays out a workspace under `root`, which should be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be written.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let workspace = Self { root: root.into() };
        std::fs::create_dir_all(workspace.tools_dir())?;
        std::fs::create_dir_all(workspace.root.join("rules"))?;
        std::fs::write(workspace.root.join("justifications.xlsx"), b"justifications")?;

        for stage in builtin_stages() {
            workspace.write_tool(&stage.id, SUCCESS_SCRIPT)?;
        }
        Ok(workspace)
    }

    /// The workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the tool scripts.
    #[must_use]
    pub fn tools_dir(&self) -> PathBuf {
        self.root.join("tools")
    }

    /// Script path of a stage's tool.
    #[must_use]
    pub fn tool_path(&self, stage_id: &str) -> PathBuf {
        self.tools_dir().join(format!("{stage_id}.sh"))
    }

    /// Replaces the script body of a stage's tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the script cannot be written.
    pub fn write_tool(&self, stage_id: &str, body: &str) -> io::Result<()> {
        std::fs::write(self.tool_path(stage_id), body)
    }

    /// Configuration running every builtin stage through `sh`.
    #[must_use]
    pub fn config(&self) -> PipelineConfig {
        let config = PipelineConfig::new()
            .with_workspace_root(&self.root)
            .with_resource(RULES_FOLDER, self.root.join("rules"))
            .with_resource(JUSTIFICATION_FILE, self.root.join("justifications.xlsx"));

        let ids: Vec<String> = config.stages.iter().map(|s| s.id.clone()).collect();
        ids.into_iter().fold(config, |config, id| {
            let tool = ToolConfig::new("sh").with_script(self.tool_path(&id));
            config.with_tool(id, tool)
        })
    }
}
