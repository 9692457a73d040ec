//! The builtin stage catalog.

use super::{CommandTemplate, InputDependency, StageBlueprint};

/// Stage ids of the builtin catalog.
pub mod ids {
    /// Splits vulnerabilities by application for DevOps teams.
    pub const VULN_DEVOPS: &str = "vuln-devops";
    /// Aggregates vulnerabilities into the master report.
    pub const VULN_MASTER: &str = "vuln-master";
    /// Segregates misconfigurations for DevOps teams.
    pub const MISCONFIG_DEVOPS: &str = "misconfig-devops";
    /// Extracts the AHA / PMP / AZURE / PP misconfiguration report.
    pub const MISCONFIG_AHA: &str = "misconfig-aha";
    /// Classifies the AHA report into the final actionable report.
    pub const MISCONFIG_FINAL: &str = "misconfig-final";
    /// Aggregates the final report into the misconfiguration master report.
    pub const MISCONFIG_MASTER: &str = "misconfig-master";
    /// Applies justifications to the final report.
    pub const MISCONFIG_JUSTIFICATION: &str = "misconfig-justification";
    /// Segregates the image assessment report.
    pub const IMAGE_ASSESSMENT: &str = "image-assessment";
    /// Builds the image assessment master report.
    pub const IMAGE_ASSESSMENT_MASTER: &str = "image-assessment-master";
}

/// Resource name of the classification rules folder.
pub const RULES_FOLDER: &str = "rules_folder";
/// Resource name of the justification workbook.
pub const JUSTIFICATION_FILE: &str = "justification_file";

fn template(args: &[&str]) -> CommandTemplate {
    CommandTemplate::new(args.iter().copied())
}

/// Returns the builtin stage catalog in its canonical order.
#[must_use]
pub fn builtin_stages() -> Vec<StageBlueprint> {
    let flagged_io = || {
        template(&[
            "{program}",
            "{script}",
            "--input",
            "{input}",
            "--output",
            "{output}",
        ])
    };
    let positional_io = || template(&["{program}", "{script}", "{input}", "{output}"]);

    vec![
        StageBlueprint::new(
            ids::VULN_DEVOPS,
            "Vulnerability DevOps Report",
            template(&["{program}", "{script}", "{input}", "--output", "{output}"]),
            InputDependency::Upload,
            "Vulnarability_devops_report/vulnerabilities_by_application.xlsx",
        )
        .with_label("split_vulns.py"),
        StageBlueprint::new(
            ids::VULN_MASTER,
            "Vulnerability Master Report",
            flagged_io(),
            InputDependency::Upload,
            "Vulnarability_master_report/Master_Report_Automated.xlsx",
        )
        .with_label("automated_master_report.py"),
        StageBlueprint::new(
            ids::MISCONFIG_DEVOPS,
            "Misconfiguration DevOps Report",
            positional_io(),
            InputDependency::Upload,
            "Misconfig_devops_report/misconfig_segregated.xlsx",
        )
        .with_label("segregate_misconfigs.py"),
        StageBlueprint::new(
            ids::MISCONFIG_AHA,
            "Misconfiguration AHA / PMP / AZURE / PP Report",
            flagged_io(),
            InputDependency::Upload,
            "Misconfig_AHA_PMP_AZURE_PP_report/Misconfig_AHA_PMP_AZURE_PP.xlsx",
        )
        .with_label("Misconfigp2.py"),
        StageBlueprint::new(
            ids::MISCONFIG_FINAL,
            "Misconfiguration Final Report",
            template(&[
                "{program}",
                "{script}",
                "--report",
                "{input}",
                "--rules-folder",
                "{resource:rules_folder}",
                "--output",
                "{output}",
            ]),
            InputDependency::Stage(ids::MISCONFIG_AHA.to_string()),
            "Misconfig_final_report/Misconfig_AHA_PMP_AZURE_PP_actionable_final.xlsx",
        )
        .with_label("classify_misconfigs.py"),
        StageBlueprint::new(
            ids::MISCONFIG_MASTER,
            "Misconfiguration Master Report",
            flagged_io(),
            InputDependency::Stage(ids::MISCONFIG_FINAL.to_string()),
            "Misconfig_master_report/Misconfig_Master_Report_Automated.xlsx",
        )
        .with_label("automate_master_report.py"),
        StageBlueprint::new(
            ids::MISCONFIG_JUSTIFICATION,
            "Misconfiguration Justification",
            template(&[
                "{program}",
                "{script}",
                "--report",
                "{input}",
                "--justification-file",
                "{resource:justification_file}",
                "--output",
                "{output}",
            ]),
            InputDependency::Stage(ids::MISCONFIG_FINAL.to_string()),
            "Misconfig_justified_report/Misconfig_AHA_PMP_AZURE_PP_justified.xlsx",
        )
        .with_label("justification.py"),
        StageBlueprint::new(
            ids::IMAGE_ASSESSMENT,
            "Image Assessment Report",
            positional_io(),
            InputDependency::Upload,
            "Image_Assessment_Report/Image_Assessment_Segregated.xlsx",
        )
        .with_label("image_assessment.py"),
        StageBlueprint::new(
            ids::IMAGE_ASSESSMENT_MASTER,
            "Image Assessment Master Report",
            positional_io(),
            InputDependency::Upload,
            "Image_Assessment_Master_Report/Image_Assessment_Master_Report.xlsx",
        )
        .with_label("master_IA_report.py"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_ids_unique() {
        let stages = builtin_stages();
        let ids: HashSet<_> = stages.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), stages.len());
        assert_eq!(stages.len(), 9);
    }

    #[test]
    fn test_catalog_dependency_chain() {
        let stages = builtin_stages();
        let find = |id: &str| stages.iter().find(|s| s.id == id).unwrap();

        assert_eq!(find(ids::VULN_DEVOPS).input, InputDependency::Upload);
        assert_eq!(
            find(ids::MISCONFIG_FINAL).input.predecessor(),
            Some(ids::MISCONFIG_AHA)
        );
        assert_eq!(
            find(ids::MISCONFIG_MASTER).input.predecessor(),
            Some(ids::MISCONFIG_FINAL)
        );
        assert_eq!(
            find(ids::MISCONFIG_JUSTIFICATION).input.predecessor(),
            Some(ids::MISCONFIG_FINAL)
        );
    }

    #[test]
    fn test_catalog_templates_parse() {
        for stage in builtin_stages() {
            assert!(stage.command.placeholders().is_ok(), "{}", stage.id);
            assert!(stage.label.is_some(), "{}", stage.id);
        }
    }
}
