//! Stage blueprints and resolved stage definitions.

use super::CommandTemplate;
use crate::config::ToolConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What a stage consumes as its input artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputDependency {
    /// The stage needs no input artifact.
    #[default]
    None,
    /// The report uploaded in the current session.
    Upload,
    /// The output artifact of the named stage.
    Stage(String),
}

impl InputDependency {
    /// Returns the predecessor stage id, if the stage consumes one.
    #[must_use]
    pub fn predecessor(&self) -> Option<&str> {
        match self {
            Self::Stage(id) => Some(id),
            Self::None | Self::Upload => None,
        }
    }
}

impl fmt::Display for InputDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Upload => write!(f, "uploaded report"),
            Self::Stage(id) => write!(f, "output of '{id}'"),
        }
    }
}

/// The configurable description of a stage, before tools are bound.
///
/// Blueprints come from the builtin catalog or from the `stages` section of
/// the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageBlueprint {
    /// Unique stage id (e.g. `vuln-devops`).
    pub id: String,
    /// Human-readable name shown to operators.
    pub display_name: String,
    /// Label for the log header. Defaults to the tool's script file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// The command template.
    pub command: CommandTemplate,
    /// The input dependency.
    #[serde(default)]
    pub input: InputDependency,
    /// Output artifact path, relative to the output root unless absolute.
    pub output: PathBuf,
}

impl StageBlueprint {
    /// Creates a blueprint.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        command: CommandTemplate,
        input: InputDependency,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            label: None,
            command,
            input,
            output: output.into(),
        }
    }

    /// Sets the log label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A stage with its output path resolved and (optionally) its tool bound.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDefinition {
    /// Unique stage id.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Label used in log headers.
    pub label: String,
    /// The command template.
    pub command: CommandTemplate,
    /// The input dependency.
    pub input: InputDependency,
    /// Absolute output artifact path.
    pub output_path: PathBuf,
    /// The bound tool; stages without one are listed but not runnable.
    pub tool: Option<ToolConfig>,
}

impl StageDefinition {
    /// Returns true if a tool is configured for this stage.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        self.tool.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_dependency_serde() {
        let upload: InputDependency = serde_json::from_str(r#""upload""#).unwrap();
        assert_eq!(upload, InputDependency::Upload);

        let stage: InputDependency = serde_json::from_str(r#"{"stage": "misconfig-aha"}"#).unwrap();
        assert_eq!(stage.predecessor(), Some("misconfig-aha"));

        let none: InputDependency = serde_json::from_str(r#""none""#).unwrap();
        assert_eq!(none, InputDependency::None);
    }

    #[test]
    fn test_blueprint_deserialize_defaults() {
        let blueprint: StageBlueprint = serde_json::from_str(
            r#"{
                "id": "extra",
                "display_name": "Extra Report",
                "command": ["{program}", "{script}", "{output}"],
                "output": "extra/out.xlsx"
            }"#,
        )
        .unwrap();

        assert_eq!(blueprint.input, InputDependency::None);
        assert!(blueprint.label.is_none());
        assert_eq!(blueprint.output, PathBuf::from("extra/out.xlsx"));
    }

    #[test]
    fn test_input_dependency_display() {
        assert_eq!(InputDependency::Upload.to_string(), "uploaded report");
        assert_eq!(
            InputDependency::Stage("a".to_string()).to_string(),
            "output of 'a'"
        );
    }
}
