//! Command templates with path placeholders.
//!
//! A template is an ordered list of arguments. Each argument may contain
//! placeholders which are substituted in place; arguments are never split or
//! joined, so a path containing spaces stays a single argument.
//!
//! | placeholder        | value                                   |
//! |--------------------|-----------------------------------------|
//! | `{program}`        | the tool's configured program           |
//! | `{script}`         | the tool's configured script            |
//! | `{input}`          | the resolved input artifact             |
//! | `{output}`         | the stage's fixed output artifact       |
//! | `{resource:NAME}`  | the configured resource path `NAME`     |

use crate::errors::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([a-z_]+)(?::([A-Za-z0-9_.\-]+))?\}").expect("placeholder pattern is valid")
});

/// A placeholder recognised in a command template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// `{program}`
    Program,
    /// `{script}`
    Script,
    /// `{input}`
    Input,
    /// `{output}`
    Output,
    /// `{resource:NAME}`
    Resource(String),
}

impl Placeholder {
    fn parse(name: &str, arg: Option<&str>) -> Option<Self> {
        match (name, arg) {
            ("program", None) => Some(Self::Program),
            ("script", None) => Some(Self::Script),
            ("input", None) => Some(Self::Input),
            ("output", None) => Some(Self::Output),
            ("resource", Some(resource)) => Some(Self::Resource(resource.to_string())),
            _ => None,
        }
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateBindings<'a> {
    /// The tool's program.
    pub program: &'a str,
    /// The tool's script, if configured.
    pub script: Option<&'a Path>,
    /// The resolved input artifact, if the stage has one.
    pub input: Option<&'a Path>,
    /// The stage's output artifact.
    pub output: &'a Path,
    /// Named resource paths.
    pub resources: &'a BTreeMap<String, PathBuf>,
}

/// An ordered argument list with placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate {
    args: Vec<String>,
}

impl CommandTemplate {
    /// Creates a template from raw arguments.
    #[must_use]
    pub fn new(args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the raw template arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Parses every placeholder used by the template.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first unrecognised placeholder.
    pub fn placeholders(&self) -> Result<Vec<Placeholder>, ConfigError> {
        let mut found = Vec::new();
        for arg in &self.args {
            for caps in PLACEHOLDER.captures_iter(arg) {
                let name = &caps[1];
                let param = caps.get(2).map(|m| m.as_str());
                let placeholder = Placeholder::parse(name, param).ok_or_else(|| {
                    ConfigError::new(format!(
                        "unknown placeholder '{}' in command argument '{arg}'",
                        &caps[0]
                    ))
                })?;
                if !found.contains(&placeholder) {
                    found.push(placeholder);
                }
            }
        }
        Ok(found)
    }

    /// Substitutes the bindings into every argument.
    ///
    /// # Errors
    ///
    /// Returns an error if a placeholder has no value in `bindings`.
    pub fn render(&self, bindings: &TemplateBindings<'_>) -> Result<Vec<String>, ConfigError> {
        self.args
            .iter()
            .map(|arg| render_arg(arg, bindings))
            .collect()
    }
}

fn render_arg(arg: &str, bindings: &TemplateBindings<'_>) -> Result<String, ConfigError> {
    let mut rendered = String::with_capacity(arg.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(arg) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let placeholder = Placeholder::parse(&caps[1], caps.get(2).map(|m| m.as_str()))
            .ok_or_else(|| ConfigError::new(format!("unknown placeholder '{}'", whole.as_str())))?;

        rendered.push_str(&arg[last..whole.start()]);
        rendered.push_str(&value_for(&placeholder, bindings)?);
        last = whole.end();
    }

    rendered.push_str(&arg[last..]);
    Ok(rendered)
}

fn value_for(
    placeholder: &Placeholder,
    bindings: &TemplateBindings<'_>,
) -> Result<String, ConfigError> {
    let missing = |what: &str| ConfigError::new(format!("no value bound for {what}"));
    match placeholder {
        Placeholder::Program => Ok(bindings.program.to_string()),
        Placeholder::Script => bindings
            .script
            .map(path_arg)
            .ok_or_else(|| missing("{script}")),
        Placeholder::Input => bindings
            .input
            .map(path_arg)
            .ok_or_else(|| missing("{input}")),
        Placeholder::Output => Ok(path_arg(bindings.output)),
        Placeholder::Resource(name) => bindings
            .resources
            .get(name)
            .map(|p| path_arg(p))
            .ok_or_else(|| {
                missing(&format!("{{resource:{name}}}")).with_key(format!("resources.{name}"))
            }),
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bindings<'a>(
        resources: &'a BTreeMap<String, PathBuf>,
        input: Option<&'a Path>,
    ) -> TemplateBindings<'a> {
        TemplateBindings {
            program: "python",
            script: Some(Path::new("/tools/classify.py")),
            input,
            output: Path::new("/out/final.xlsx"),
            resources,
        }
    }

    #[test]
    fn test_placeholders_parsed() {
        let template = CommandTemplate::new([
            "{program}",
            "{script}",
            "--report",
            "{input}",
            "--rules-folder",
            "{resource:rules_folder}",
            "--output={output}",
        ]);

        let found = template.placeholders().unwrap();
        assert_eq!(
            found,
            vec![
                Placeholder::Program,
                Placeholder::Script,
                Placeholder::Input,
                Placeholder::Resource("rules_folder".to_string()),
                Placeholder::Output,
            ]
        );
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let template = CommandTemplate::new(["{program}", "{inptu}"]);
        let err = template.placeholders().unwrap_err();
        assert!(err.message.contains("{inptu}"));
    }

    #[test]
    fn test_render_substitutes_in_place() {
        let mut resources = BTreeMap::new();
        resources.insert("rules_folder".to_string(), PathBuf::from("/rules dir"));
        let template = CommandTemplate::new([
            "{program}",
            "{script}",
            "--report",
            "{input}",
            "--rules-folder",
            "{resource:rules_folder}",
            "--output={output}",
        ]);

        let argv = template
            .render(&bindings(&resources, Some(Path::new("/out/aha.xlsx"))))
            .unwrap();
        assert_eq!(
            argv,
            vec![
                "python",
                "/tools/classify.py",
                "--report",
                "/out/aha.xlsx",
                "--rules-folder",
                "/rules dir",
                "--output=/out/final.xlsx",
            ]
        );
    }

    #[test]
    fn test_render_missing_resource() {
        let resources = BTreeMap::new();
        let template = CommandTemplate::new(["{resource:justification_file}"]);
        let err = template.render(&bindings(&resources, None)).unwrap_err();
        assert_eq!(err.key.as_deref(), Some("resources.justification_file"));
    }

    #[test]
    fn test_render_missing_input() {
        let resources = BTreeMap::new();
        let template = CommandTemplate::new(["{input}"]);
        assert!(template.render(&bindings(&resources, None)).is_err());
    }

    #[test]
    fn test_literal_braces_untouched() {
        let resources = BTreeMap::new();
        let template = CommandTemplate::new(["{}", "{Upper}", "plain"]);
        assert!(template.placeholders().unwrap().is_empty());
        let argv = template.render(&bindings(&resources, None)).unwrap();
        assert_eq!(argv, vec!["{}", "{Upper}", "plain"]);
    }

    #[test]
    fn test_template_deserializes_from_array() {
        let template: CommandTemplate =
            serde_json::from_str(r#"["{program}", "{script}", "{input}"]"#).unwrap();
        assert_eq!(template.args().len(), 3);
    }
}
