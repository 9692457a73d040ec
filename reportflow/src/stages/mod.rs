//! Stage definitions, the builtin catalog and the stage registry.
//!
//! A stage is a fixed transformation: one external tool, one input
//! dependency and one deterministic output artifact.

mod catalog;
mod definition;
mod registry;
mod template;

pub use catalog::{builtin_stages, ids, JUSTIFICATION_FILE, RULES_FOLDER};
pub use definition::{InputDependency, StageBlueprint, StageDefinition};
pub use registry::{PreparedStage, StageRegistry};
pub use template::{CommandTemplate, Placeholder, TemplateBindings};
