//! The stage registry and dependency resolution.

use super::{
    InputDependency, Placeholder, StageBlueprint, StageDefinition, TemplateBindings,
};
use crate::config::{PipelineConfig, ToolConfig};
use crate::errors::{
    ConfigError, CycleDetectedError, PipelineValidationError, ReportflowError, Result,
};
use crate::store::ArtifactStore;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A stage whose dependency is satisfied and whose command is built.
#[derive(Debug, Clone)]
pub struct PreparedStage<'a> {
    /// The stage being run.
    pub stage: &'a StageDefinition,
    /// The resolved input artifact.
    pub input: Option<PathBuf>,
    /// The literal argument vector.
    pub argv: Vec<String>,
}

impl<'a> PreparedStage<'a> {
    /// The tool bound to the stage.
    #[must_use]
    pub fn tool(&self) -> Option<&'a ToolConfig> {
        self.stage.tool.as_ref()
    }
}

/// The validated catalog of stages.
///
/// Every blueprint is validated, including those without a tool. Only
/// stages with a tool are runnable; the others are kept so that a runnable
/// stage can still name them as a missing predecessor.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    definitions: HashMap<String, StageDefinition>,
    catalog_order: Vec<String>,
    execution_order: Vec<String>,
    resources: BTreeMap<String, PathBuf>,
}

impl StageRegistry {
    /// Builds the registry from a configuration.
    ///
    /// # Errors
    ///
    /// See [`StageRegistry::build`].
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::build(
            config.stages.clone(),
            &config.tools,
            config.resources.clone(),
            &config.workspace.output_root,
        )
    }

    /// Validates the blueprints and binds tools to them.
    ///
    /// # Errors
    ///
    /// Returns [`ReportflowError::Validation`] for duplicate ids, unknown or
    /// cyclic dependencies and shared output paths, and
    /// [`ReportflowError::Config`] for template problems.
    pub fn build(
        blueprints: Vec<StageBlueprint>,
        tools: &BTreeMap<String, ToolConfig>,
        resources: BTreeMap<String, PathBuf>,
        output_root: &Path,
    ) -> Result<Self> {
        if blueprints.is_empty() {
            return Err(PipelineValidationError::new("Stage catalog is empty")
                .with_fix_hint("Remove the empty 'stages' list to use the builtin catalog.")
                .into());
        }

        let mut definitions: HashMap<String, StageDefinition> = HashMap::new();
        let mut catalog_order = Vec::with_capacity(blueprints.len());
        let mut outputs: HashMap<PathBuf, String> = HashMap::new();

        for blueprint in blueprints {
            if definitions.contains_key(&blueprint.id) {
                return Err(PipelineValidationError::new(format!(
                    "Duplicate stage id '{}'",
                    blueprint.id
                ))
                .with_stages(vec![blueprint.id.clone()])
                .into());
            }

            let output_path = if blueprint.output.is_absolute() {
                blueprint.output.clone()
            } else {
                output_root.join(&blueprint.output)
            };
            if let Some(other) = outputs.insert(output_path.clone(), blueprint.id.clone()) {
                return Err(PipelineValidationError::new(format!(
                    "Stages '{other}' and '{}' write the same output {}",
                    blueprint.id,
                    output_path.display()
                ))
                .with_stages(vec![other, blueprint.id.clone()])
                .with_fix_hint("Give every stage its own output path.")
                .into());
            }

            let tool = tools.get(&blueprint.id).cloned();
            check_template(&blueprint, tool.as_ref(), &resources)?;

            let label = blueprint
                .label
                .clone()
                .or_else(|| tool.as_ref().map(ToolConfig::default_label))
                .unwrap_or_else(|| blueprint.id.clone());

            catalog_order.push(blueprint.id.clone());
            definitions.insert(
                blueprint.id.clone(),
                StageDefinition {
                    id: blueprint.id,
                    display_name: blueprint.display_name,
                    label,
                    command: blueprint.command,
                    input: blueprint.input,
                    output_path,
                    tool,
                },
            );
        }

        for id in &catalog_order {
            if let Some(dep) = definitions[id].input.predecessor() {
                if dep == id.as_str() {
                    return Err(PipelineValidationError::new(format!(
                        "Stage '{id}' depends on its own output"
                    ))
                    .with_stages(vec![id.clone()])
                    .into());
                }
                if !definitions.contains_key(dep) {
                    return Err(PipelineValidationError::new(format!(
                        "Stage '{id}' depends on unknown stage '{dep}'"
                    ))
                    .with_stages(vec![id.clone(), dep.to_string()])
                    .with_fix_hint("Add the predecessor to the catalog or change the input.")
                    .into());
                }
            }
        }

        if let Some(cycle) = detect_cycle(&definitions, &catalog_order) {
            return Err(PipelineValidationError::from(CycleDetectedError::new(cycle)).into());
        }
        let execution_order = topological_sort(&definitions, &catalog_order);

        for id in &catalog_order {
            if !definitions[id].is_runnable() {
                warn!(stage = %id, "No tool configured; stage is not runnable");
            }
        }
        debug!(
            stages = catalog_order.len(),
            runnable = definitions.values().filter(|d| d.is_runnable()).count(),
            "Stage registry built"
        );

        Ok(Self {
            definitions,
            catalog_order,
            execution_order,
            resources,
        })
    }

    /// Returns the runnable stage with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`ReportflowError::UnknownStage`] if no runnable stage has that id.
    pub fn get(&self, stage_id: &str) -> Result<&StageDefinition> {
        self.definitions
            .get(stage_id)
            .filter(|d| d.is_runnable())
            .ok_or_else(|| ReportflowError::unknown_stage(stage_id))
    }

    /// Returns any catalogued stage, runnable or not.
    #[must_use]
    pub fn definition(&self, stage_id: &str) -> Option<&StageDefinition> {
        self.definitions.get(stage_id)
    }

    /// Runnable stages in catalog order.
    pub fn stages(&self) -> impl Iterator<Item = &StageDefinition> {
        self.catalog_order
            .iter()
            .filter_map(|id| self.definitions.get(id))
            .filter(|d| d.is_runnable())
    }

    /// Number of runnable stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages().count()
    }

    /// Returns true if no stage is runnable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stage ids, predecessors before dependents.
    #[must_use]
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Display name of a stage, falling back to its id.
    #[must_use]
    pub fn display_name<'a>(&'a self, stage_id: &'a str) -> &'a str {
        self.definitions
            .get(stage_id)
            .map_or(stage_id, |d| d.display_name.as_str())
    }

    /// Resolves the stage's input and builds its argument vector.
    ///
    /// # Errors
    ///
    /// - [`ReportflowError::UnknownStage`] if the stage is not runnable
    /// - [`ReportflowError::MissingUpload`] if the stage needs an upload and there is none
    /// - [`ReportflowError::MissingPredecessorOutput`] if the predecessor's output is absent
    pub fn prepare(
        &self,
        stage_id: &str,
        uploaded: Option<&Path>,
        store: &ArtifactStore,
    ) -> Result<PreparedStage<'_>> {
        let stage = self.get(stage_id)?;

        let input = match stage.input {
            InputDependency::None => None,
            InputDependency::Upload => Some(
                uploaded
                    .map(Path::to_path_buf)
                    .ok_or_else(|| ReportflowError::missing_upload(stage_id))?,
            ),
            InputDependency::Stage(ref predecessor) => {
                let Some(pred) = self.definitions.get(predecessor) else {
                    return Err(ReportflowError::unknown_stage(predecessor.clone()));
                };
                if !store.exists(&pred.output_path) {
                    return Err(ReportflowError::MissingPredecessorOutput {
                        stage: stage_id.to_string(),
                        predecessor: pred.id.clone(),
                        predecessor_name: pred.display_name.clone(),
                        path: pred.output_path.clone(),
                    });
                }
                Some(pred.output_path.clone())
            }
        };

        let Some(ref tool) = stage.tool else {
            return Err(ReportflowError::unknown_stage(stage_id));
        };
        let argv = stage.command.render(&TemplateBindings {
            program: &tool.program,
            script: tool.script.as_deref(),
            input: input.as_deref(),
            output: &stage.output_path,
            resources: &self.resources,
        })?;

        debug!(stage = %stage_id, argv = ?argv, "Prepared stage command");
        Ok(PreparedStage { stage, input, argv })
    }
}

fn check_template(
    blueprint: &StageBlueprint,
    tool: Option<&ToolConfig>,
    resources: &BTreeMap<String, PathBuf>,
) -> Result<(), ConfigError> {
    let key = format!("stages.{}.command", blueprint.id);
    if blueprint.command.args().is_empty() {
        return Err(ConfigError::new(format!("stage '{}' has an empty command", blueprint.id))
            .with_key(key));
    }

    for placeholder in blueprint.command.placeholders().map_err(|e| e.with_key(&key))? {
        match placeholder {
            Placeholder::Resource(name) if tool.is_some() && !resources.contains_key(&name) => {
                return Err(ConfigError::new(format!(
                    "stage '{}' uses resource '{name}' which is not configured",
                    blueprint.id
                ))
                .with_key(format!("resources.{name}")));
            }
            Placeholder::Input if blueprint.input == InputDependency::None => {
                return Err(ConfigError::new(format!(
                    "stage '{}' uses {{input}} but declares no input",
                    blueprint.id
                ))
                .with_key(key));
            }
            Placeholder::Script if tool.is_some_and(|t| t.script.is_none()) => {
                return Err(ConfigError::new(format!(
                    "stage '{}' uses {{script}} but its tool has no script",
                    blueprint.id
                ))
                .with_key(format!("tools.{}.script", blueprint.id)));
            }
            _ => {}
        }
    }
    Ok(())
}

fn detect_cycle(
    definitions: &HashMap<String, StageDefinition>,
    order: &[String],
) -> Option<Vec<String>> {
    fn dfs(
        node: &str,
        definitions: &HashMap<String, StageDefinition>,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(dep) = definitions.get(node).and_then(|d| d.input.predecessor()) {
            if !visited.contains(dep) {
                if let Some(cycle) = dfs(dep, definitions, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(dep) {
                let start = path.iter().position(|n| n == dep).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(dep.to_string());
                return Some(cycle);
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    order.iter().find_map(|id| {
        if visited.contains(id) {
            None
        } else {
            dfs(id, definitions, &mut visited, &mut rec_stack, &mut path)
        }
    })
}

fn topological_sort(
    definitions: &HashMap<String, StageDefinition>,
    order: &[String],
) -> Vec<String> {
    fn visit(
        node: &str,
        definitions: &HashMap<String, StageDefinition>,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if !visited.insert(node.to_string()) {
            return;
        }
        if let Some(dep) = definitions.get(node).and_then(|d| d.input.predecessor()) {
            visit(dep, definitions, visited, result);
        }
        result.push(node.to_string());
    }

    let mut result = Vec::with_capacity(order.len());
    let mut visited = HashSet::new();
    for id in order {
        visit(id, definitions, &mut visited, &mut result);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{builtin_stages, ids, CommandTemplate};
    use pretty_assertions::assert_eq;

    fn io_template() -> CommandTemplate {
        CommandTemplate::new(["{program}", "{script}", "{input}", "{output}"])
    }

    fn blueprint(id: &str, input: InputDependency) -> StageBlueprint {
        let command = if input == InputDependency::None {
            CommandTemplate::new(["{program}", "{output}"])
        } else {
            io_template()
        };
        StageBlueprint::new(id, format!("Stage {id}"), command, input, format!("{id}/out.xlsx"))
    }

    fn tools_for(ids: &[&str]) -> BTreeMap<String, ToolConfig> {
        ids.iter()
            .map(|id| {
                (
                    (*id).to_string(),
                    ToolConfig::new("python").with_script(format!("/tools/{id}.py")),
                )
            })
            .collect()
    }

    fn builtin_registry() -> StageRegistry {
        let stages = builtin_stages();
        let all: Vec<&str> = stages.iter().map(|s| s.id.as_str()).collect();
        let mut resources = BTreeMap::new();
        resources.insert("rules_folder".to_string(), PathBuf::from("/rules"));
        resources.insert("justification_file".to_string(), PathBuf::from("/just.xlsx"));
        StageRegistry::build(stages.clone(), &tools_for(&all), resources, Path::new("/out"))
            .unwrap()
    }

    #[test]
    fn test_builtin_catalog_registers() {
        let registry = builtin_registry();
        assert_eq!(registry.len(), 9);

        let ids: Vec<_> = registry.stages().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.first(), Some(&ids::VULN_DEVOPS));

        let order = registry.execution_order();
        let pos = |id: &str| order.iter().position(|s| s == id).unwrap();
        assert!(pos(ids::MISCONFIG_AHA) < pos(ids::MISCONFIG_FINAL));
        assert!(pos(ids::MISCONFIG_FINAL) < pos(ids::MISCONFIG_JUSTIFICATION));
        assert!(pos(ids::MISCONFIG_FINAL) < pos(ids::MISCONFIG_MASTER));
    }

    #[test]
    fn test_label_defaults() {
        let registry = builtin_registry();
        assert_eq!(registry.get(ids::VULN_DEVOPS).unwrap().label, "split_vulns.py");

        let registry = StageRegistry::build(
            vec![blueprint("a", InputDependency::Upload)],
            &tools_for(&["a"]),
            BTreeMap::new(),
            Path::new("/out"),
        )
        .unwrap();
        assert_eq!(registry.get("a").unwrap().label, "a.py");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = StageRegistry::build(
            vec![
                blueprint("a", InputDependency::Upload),
                blueprint("a", InputDependency::Upload),
            ],
            &BTreeMap::new(),
            BTreeMap::new(),
            Path::new("/out"),
        )
        .unwrap_err();
        assert!(matches!(err, ReportflowError::Validation(_)));
    }

    #[test]
    fn test_unknown_and_self_dependency_rejected() {
        let unknown = StageRegistry::build(
            vec![blueprint("a", InputDependency::Stage("ghost".to_string()))],
            &BTreeMap::new(),
            BTreeMap::new(),
            Path::new("/out"),
        )
        .unwrap_err();
        assert!(unknown.to_string().contains("unknown stage 'ghost'"));

        let own = StageRegistry::build(
            vec![blueprint("a", InputDependency::Stage("a".to_string()))],
            &BTreeMap::new(),
            BTreeMap::new(),
            Path::new("/out"),
        )
        .unwrap_err();
        assert!(own.to_string().contains("its own output"));
    }

    #[test]
    fn test_cycle_rejected_with_path() {
        let err = StageRegistry::build(
            vec![
                blueprint("a", InputDependency::Stage("c".to_string())),
                blueprint("b", InputDependency::Stage("a".to_string())),
                blueprint("c", InputDependency::Stage("b".to_string())),
            ],
            &BTreeMap::new(),
            BTreeMap::new(),
            Path::new("/out"),
        )
        .unwrap_err();

        let ReportflowError::Validation(validation) = err else {
            panic!("expected validation error");
        };
        assert_eq!(validation.stages, vec!["a", "c", "b", "a"]);
    }

    #[test]
    fn test_shared_output_rejected() {
        let mut second = blueprint("b", InputDependency::Upload);
        second.output = PathBuf::from("a/out.xlsx");
        let err = StageRegistry::build(
            vec![blueprint("a", InputDependency::Upload), second],
            &BTreeMap::new(),
            BTreeMap::new(),
            Path::new("/out"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("write the same output"));
    }

    #[test]
    fn test_template_checks() {
        let mut needs_resource = blueprint("a", InputDependency::Upload);
        needs_resource.command = CommandTemplate::new(["{program}", "{resource:rules_folder}"]);
        let err = StageRegistry::build(
            vec![needs_resource],
            &tools_for(&["a"]),
            BTreeMap::new(),
            Path::new("/out"),
        )
        .unwrap_err();
        assert!(matches!(err, ReportflowError::Config(ref c) if c.key.as_deref() == Some("resources.rules_folder")));

        let mut input_without_dep = blueprint("b", InputDependency::None);
        input_without_dep.command = io_template();
        assert!(StageRegistry::build(
            vec![input_without_dep],
            &BTreeMap::new(),
            BTreeMap::new(),
            Path::new("/out"),
        )
        .is_err());

        let mut tools = BTreeMap::new();
        tools.insert("c".to_string(), ToolConfig::new("python"));
        let err = StageRegistry::build(
            vec![blueprint("c", InputDependency::Upload)],
            &tools,
            BTreeMap::new(),
            Path::new("/out"),
        )
        .unwrap_err();
        assert!(matches!(err, ReportflowError::Config(ref c) if c.key.as_deref() == Some("tools.c.script")));
    }

    #[test]
    fn test_unbound_stage_needs_no_resources() {
        let mut needs_resource = blueprint("a", InputDependency::Upload);
        needs_resource.command = CommandTemplate::new(["{program}", "{resource:rules_folder}"]);
        let registry = StageRegistry::build(
            vec![needs_resource, blueprint("b", InputDependency::Upload)],
            &tools_for(&["b"]),
            BTreeMap::new(),
            Path::new("/out"),
        )
        .unwrap();
        assert_eq!(registry.len(), 1);

        let mut bad_syntax = blueprint("c", InputDependency::Upload);
        bad_syntax.command = CommandTemplate::new(["{program}", "{nonsense}"]);
        assert!(StageRegistry::build(
            vec![bad_syntax],
            &BTreeMap::new(),
            BTreeMap::new(),
            Path::new("/out"),
        )
        .is_err());
    }

    #[test]
    fn test_builtin_catalog_with_partial_tools() {
        let registry = StageRegistry::build(
            builtin_stages(),
            &tools_for(&[ids::VULN_DEVOPS]),
            BTreeMap::new(),
            Path::new("/out"),
        )
        .unwrap();
        let runnable: Vec<_> = registry.stages().map(|s| s.id.as_str()).collect();
        assert_eq!(runnable, vec![ids::VULN_DEVOPS]);

        let empty = StageRegistry::build(
            builtin_stages(),
            &BTreeMap::new(),
            BTreeMap::new(),
            Path::new("/out"),
        )
        .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_unconfigured_stage_is_unknown() {
        let registry = StageRegistry::build(
            vec![
                blueprint("a", InputDependency::Upload),
                blueprint("b", InputDependency::Stage("a".to_string())),
            ],
            &tools_for(&["b"]),
            BTreeMap::new(),
            Path::new("/out"),
        )
        .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.get("a"),
            Err(ReportflowError::UnknownStage { .. })
        ));
        assert_eq!(registry.display_name("a"), "Stage a");
        assert!(registry.definition("a").is_some());
    }

    #[test]
    fn test_prepare_missing_upload() {
        let registry = builtin_registry();
        let store = ArtifactStore::new("/up", "/out");

        let err = registry.prepare(ids::VULN_DEVOPS, None, &store).unwrap_err();
        assert!(matches!(err, ReportflowError::MissingUpload { .. }));
    }

    #[test]
    fn test_prepare_missing_predecessor() {
        let registry = builtin_registry();
        let store = ArtifactStore::new("/up", "/out");

        let err = registry
            .prepare(ids::MISCONFIG_FINAL, Some(Path::new("/up/report.xlsx")), &store)
            .unwrap_err();

        let ReportflowError::MissingPredecessorOutput {
            predecessor,
            predecessor_name,
            path,
            ..
        } = err
        else {
            panic!("expected missing predecessor output");
        };
        assert_eq!(predecessor, ids::MISCONFIG_AHA);
        assert_eq!(predecessor_name, "Misconfiguration AHA / PMP / AZURE / PP Report");
        assert_eq!(
            path,
            PathBuf::from("/out/Misconfig_AHA_PMP_AZURE_PP_report/Misconfig_AHA_PMP_AZURE_PP.xlsx")
        );
    }

    #[test]
    fn test_prepare_builds_argv() {
        let registry = builtin_registry();
        let store = ArtifactStore::new("/up", "/out");

        let prepared = registry
            .prepare(ids::VULN_DEVOPS, Some(Path::new("/up/my report.xlsx")), &store)
            .unwrap();

        assert_eq!(
            prepared.argv,
            vec![
                "python",
                "/tools/vuln-devops.py",
                "/up/my report.xlsx",
                "--output",
                "/out/Vulnarability_devops_report/vulnerabilities_by_application.xlsx",
            ]
        );
        assert_eq!(prepared.input.as_deref(), Some(Path::new("/up/my report.xlsx")));
        assert!(prepared.tool().is_some());
    }

    #[test]
    fn test_prepare_uses_predecessor_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut resources = BTreeMap::new();
        resources.insert("rules_folder".to_string(), dir.path().join("rules"));
        let registry = StageRegistry::build(
            builtin_stages(),
            &tools_for(&[ids::MISCONFIG_AHA, ids::MISCONFIG_FINAL]),
            resources,
            dir.path(),
        );
        // justification_file is referenced by the builtin catalog
        assert!(registry.is_err());

        let mut resources = BTreeMap::new();
        resources.insert("rules_folder".to_string(), dir.path().join("rules"));
        resources.insert("justification_file".to_string(), dir.path().join("j.xlsx"));
        let registry = StageRegistry::build(
            builtin_stages(),
            &tools_for(&[ids::MISCONFIG_AHA, ids::MISCONFIG_FINAL]),
            resources,
            dir.path(),
        )
        .unwrap();
        let store = ArtifactStore::new(dir.path().join("up"), dir.path());

        let aha = registry.get(ids::MISCONFIG_AHA).unwrap().output_path.clone();
        store.ensure_parent(&aha).unwrap();
        std::fs::write(&aha, b"xlsx").unwrap();

        let prepared = registry.prepare(ids::MISCONFIG_FINAL, None, &store).unwrap();
        assert_eq!(prepared.input.as_deref(), Some(aha.as_path()));
        assert_eq!(prepared.argv[3], aha.to_string_lossy());
        assert_eq!(prepared.argv[5], dir.path().join("rules").to_string_lossy());
    }
}
