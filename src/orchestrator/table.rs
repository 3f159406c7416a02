//! Declarative prompt sequence table.
//!
//! The table maps `agent -> capability -> sequence of steps`, where each step
//! pulls one or more prompt files from the agent's prompt directory or a
//! single file from the target's prompt directory. It can be loaded from a
//! `sequences.yaml` file so new agents and targets can be added without a
//! rebuild; when no file is present the built-in table is used.
//!
//! # File Format
//!
//! ```yaml
//! code_architect:
//!   plan:
//!     description: "Analyze source and create migration plan"
//!     sequence:
//!       - type: agent
//!         prompts: ["01_analyze_project_structure.md"]
//!         purpose: "Understand source architecture"
//!       - type: target
//!         prompt: "01_analyze.md"
//!         purpose: "Analyze target requirements"
//! ```
//!
//! Unknown fields are ignored for forward compatibility.

use crate::error::{PassageError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One step of a declared sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepSpec {
    /// One or more prompt files resolved against `prompts/{agent}/{capability}/`.
    Agent {
        /// Prompt filenames, executed in the listed order.
        prompts: Vec<String>,
        /// Human-readable purpose of this step.
        purpose: String,
    },
    /// A single prompt file resolved against `prompts/targets/{target}/`.
    Target {
        /// Prompt filename.
        prompt: String,
        /// Human-readable purpose of this step.
        purpose: String,
    },
}

/// A capability's declared sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitySpec {
    /// What this capability accomplishes.
    pub description: String,
    /// Ordered steps.
    pub sequence: Vec<StepSpec>,
}

/// The full sequence table, keyed by normalized agent then capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceTable {
    /// agent key -> capability key -> spec
    pub agents: BTreeMap<String, BTreeMap<String, CapabilitySpec>>,
}

impl SequenceTable {
    /// Load the table from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PassageError::UserError(format!(
                "failed to read sequence table '{}': {}",
                path.display(),
                e
            ))
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            PassageError::UserError(format!(
                "failed to parse sequence table '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Load from a file if it exists, otherwise use the built-in table.
    pub fn load_or_builtin<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::builtin())
        }
    }

    /// Look up the declared spec for a normalized (agent, capability) pair.
    pub fn get(&self, agent_key: &str, capability_key: &str) -> Option<&CapabilitySpec> {
        self.agents.get(agent_key)?.get(capability_key)
    }

    /// The built-in orchestration patterns for the stock agent roles.
    pub fn builtin() -> Self {
        let mut agents: BTreeMap<String, BTreeMap<String, CapabilitySpec>> = BTreeMap::new();

        let agent_step = |prompts: &[&str], purpose: &str| StepSpec::Agent {
            prompts: prompts.iter().map(|s| s.to_string()).collect(),
            purpose: purpose.to_string(),
        };
        let target_step = |prompt: &str, purpose: &str| StepSpec::Target {
            prompt: prompt.to_string(),
            purpose: purpose.to_string(),
        };

        let mut code_architect = BTreeMap::new();
        code_architect.insert(
            "plan".to_string(),
            CapabilitySpec {
                description: "Analyze source and create migration plan".to_string(),
                sequence: vec![
                    agent_step(
                        &["01_analyze_project_structure.md"],
                        "Understand source architecture",
                    ),
                    target_step("01_analyze.md", "Analyze target requirements"),
                    target_step("02_plan.md", "Create target-specific migration plan"),
                    agent_step(
                        &["03_design_target_architecture.md"],
                        "Design final architecture",
                    ),
                ],
            },
        );
        code_architect.insert(
            "analyze".to_string(),
            CapabilitySpec {
                description: "Deep analysis of source code".to_string(),
                sequence: vec![
                    agent_step(
                        &["01_analyze_codebase.md", "02_identify_patterns.md"],
                        "Analyze source patterns",
                    ),
                    target_step("01_analyze.md", "Map to target patterns"),
                ],
            },
        );
        agents.insert("code_architect".to_string(), code_architect);

        let mut code_engineer = BTreeMap::new();
        code_engineer.insert(
            "migrate".to_string(),
            CapabilitySpec {
                description: "Execute code migration".to_string(),
                sequence: vec![
                    agent_step(&["01_setup_target_project.md"], "Initialize target project"),
                    target_step("03_migrate.md", "Execute target-specific migration"),
                    agent_step(&["02_migrate_data_models.md"], "Migrate data structures"),
                ],
            },
        );
        code_engineer.insert(
            "refactor".to_string(),
            CapabilitySpec {
                description: "Refactor migrated code".to_string(),
                sequence: vec![
                    target_step("04_validate.md", "Validate against target standards"),
                    target_step("05_fix.md", "Fix target-specific issues"),
                ],
            },
        );
        agents.insert("code_engineer".to_string(), code_engineer);

        let mut qa_engineer = BTreeMap::new();
        qa_engineer.insert(
            "test".to_string(),
            CapabilitySpec {
                description: "Create and run tests".to_string(),
                sequence: vec![
                    agent_step(
                        &["01_analyze_test_requirements.md"],
                        "Understand testing needs",
                    ),
                    target_step("04_validate.md", "Target-specific validation"),
                    agent_step(&["02_create_test_suite.md"], "Create comprehensive tests"),
                ],
            },
        );
        qa_engineer.insert(
            "validate".to_string(),
            CapabilitySpec {
                description: "Validate migration quality".to_string(),
                sequence: vec![
                    target_step("04_validate.md", "Target validation rules"),
                    agent_step(&["01_run_validation_suite.md"], "Execute validation"),
                ],
            },
        );
        agents.insert("qa_engineer".to_string(), qa_engineer);

        let mut devops_engineer = BTreeMap::new();
        devops_engineer.insert(
            "setup_ci_cd".to_string(),
            CapabilitySpec {
                description: "Setup CI/CD pipeline".to_string(),
                sequence: vec![
                    agent_step(
                        &["01_analyze_deployment_needs.md"],
                        "Understand deployment requirements",
                    ),
                    target_step("03_migrate.md", "Target deployment patterns"),
                    agent_step(&["02_create_pipeline.md"], "Create CI/CD pipeline"),
                ],
            },
        );
        agents.insert("devops_engineer".to_string(), devops_engineer);

        let mut project_manager = BTreeMap::new();
        project_manager.insert(
            "project_kickoff".to_string(),
            CapabilitySpec {
                description: "Initialize project".to_string(),
                sequence: vec![
                    agent_step(&["01_initialize_project.md"], "Setup project structure"),
                    target_step("06_discuss.md", "Discuss target approach"),
                ],
            },
        );
        project_manager.insert(
            "status_report".to_string(),
            CapabilitySpec {
                description: "Generate status reports".to_string(),
                sequence: vec![
                    agent_step(&["01_gather_metrics.md"], "Collect project metrics"),
                    agent_step(&["02_generate_report.md"], "Create status report"),
                ],
            },
        );
        agents.insert("project_manager".to_string(), project_manager);

        Self { agents }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_covers_stock_agents() {
        let table = SequenceTable::builtin();
        for agent in [
            "code_architect",
            "code_engineer",
            "qa_engineer",
            "devops_engineer",
            "project_manager",
        ] {
            assert!(table.agents.contains_key(agent), "missing agent {}", agent);
        }
        assert!(table.get("code_architect", "plan").is_some());
        assert!(table.get("code_architect", "teleport").is_none());
    }

    #[test]
    fn builtin_plan_sequence_shape() {
        let table = SequenceTable::builtin();
        let plan = table.get("code_architect", "plan").unwrap();
        assert_eq!(plan.sequence.len(), 4);
        assert!(matches!(plan.sequence[0], StepSpec::Agent { .. }));
        assert!(matches!(plan.sequence[1], StepSpec::Target { .. }));
        assert!(matches!(plan.sequence[2], StepSpec::Target { .. }));
        assert!(matches!(plan.sequence[3], StepSpec::Agent { .. }));
    }

    #[test]
    fn table_round_trips_through_yaml() {
        let table = SequenceTable::builtin();
        let yaml = serde_yaml::to_string(&table).unwrap();
        let parsed: SequenceTable = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            parsed.get("code_engineer", "migrate").unwrap().sequence,
            table.get("code_engineer", "migrate").unwrap().sequence
        );
    }

    #[test]
    fn loads_custom_table_from_yaml() {
        let yaml = r#"
custom_agent:
  review:
    description: "Review migrated code"
    sequence:
      - type: agent
        prompts: ["01_review.md"]
        purpose: "Review"
      - type: target
        prompt: "04_validate.md"
        purpose: "Validate"
"#;
        let table: SequenceTable = serde_yaml::from_str(yaml).unwrap();
        let spec = table.get("custom_agent", "review").unwrap();
        assert_eq!(spec.sequence.len(), 2);
        assert_eq!(
            spec.sequence[1],
            StepSpec::Target {
                prompt: "04_validate.md".to_string(),
                purpose: "Validate".to_string()
            }
        );
    }
}
