//! Prompt orchestration: maps (agent, capability, target) to an ordered
//! sequence of prompt files.
//!
//! Agent prompts live under `prompts/{agent}/{capability}/` and express
//! role-specific instructions; target prompts live under
//! `prompts/targets/{target}/` and express framework-specific instructions.
//! The declarative [`SequenceTable`] interleaves the two. When no sequence
//! is declared for a pair, a fallback policy lists every agent prompt in
//! lexicographic order and appends a fixed capability-to-file mapping of
//! target prompts.
//!
//! Missing prompt files are logged and skipped at resolution time; the
//! resulting sequence may be empty, which the execution coordinator treats
//! as a hard error.

mod table;
#[cfg(test)]
mod tests;

pub use table::{CapabilitySpec, SequenceTable, StepSpec};

use crate::context::{slugify, target_key};
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Whether a prompt step comes from the agent's or the target's directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Role-specific prompt from `prompts/{agent}/{capability}/`.
    Agent,
    /// Framework-specific prompt from `prompts/targets/{target}/`.
    Target,
}

/// One resolved prompt step, ready for execution.
#[derive(Debug, Clone, Serialize)]
pub struct PromptStep {
    /// Which directory family the prompt came from.
    pub kind: StepKind,
    /// Full path to the template file. Existence was checked at resolution
    /// time but is not guaranteed at execution time.
    pub path: PathBuf,
    /// The bare filename, used to derive output file names.
    pub file: String,
    /// Human-readable purpose carried from the sequence table.
    pub purpose: String,
    /// Original (unnormalized) agent name, for agent steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Original capability name, for agent steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    /// Original target name, for target steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Per-target result of a pre-flight validation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TargetValidation {
    /// Total prompt files the sequence declares for this target.
    pub total_prompts: usize,
    /// Declared files that exist on disk.
    pub found_prompts: Vec<String>,
    /// Declared files that are missing.
    pub missing_prompts: Vec<String>,
}

/// Result of validating an orchestration against a list of targets.
///
/// Used for pre-flight checks only; execution never consults this.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Agent name as given by the caller.
    pub agent: String,
    /// Capability name as given by the caller.
    pub capability: String,
    /// True when every declared prompt exists for every target.
    pub valid: bool,
    /// Per-target detail, keyed by the caller's target name.
    pub targets: BTreeMap<String, TargetValidation>,
}

/// Summary of one declared step, for listing orchestrations.
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    /// Step kind as declared.
    pub kind: StepKind,
    /// Declared purpose.
    pub purpose: String,
    /// Number of prompt files in this step.
    pub count: usize,
}

/// Summary of one declared capability.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilitySummary {
    /// Capability description from the table.
    pub description: String,
    /// Number of declared steps.
    pub steps: usize,
    /// Per-step detail.
    pub sequence: Vec<StepSummary>,
}

/// Resolves prompt sequences against a prompts directory and a sequence table.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    prompts_dir: PathBuf,
    table: SequenceTable,
}

/// Fixed capability-to-target-file mapping used by the fallback policy.
fn fallback_target_files(capability_key: &str) -> &'static [&'static str] {
    match capability_key {
        "plan" => &["01_analyze.md", "02_plan.md"],
        "analyze" => &["01_analyze.md"],
        "migrate" => &["03_migrate.md"],
        "validate" | "test" => &["04_validate.md"],
        "refactor" => &["05_fix.md"],
        "discuss" => &["06_discuss.md"],
        _ => &[],
    }
}

impl Orchestrator {
    /// Create an orchestrator over `prompts_dir` with an explicit table.
    pub fn new<P: Into<PathBuf>>(prompts_dir: P, table: SequenceTable) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            table,
        }
    }

    /// Create an orchestrator with the built-in sequence table.
    pub fn with_builtin_table<P: Into<PathBuf>>(prompts_dir: P) -> Self {
        Self::new(prompts_dir, SequenceTable::builtin())
    }

    /// The prompts directory this orchestrator resolves against.
    pub fn prompts_dir(&self) -> &Path {
        &self.prompts_dir
    }

    /// The sequence table in use.
    pub fn table(&self) -> &SequenceTable {
        &self.table
    }

    /// Resolve the ordered prompt sequence for (agent, capability, target).
    ///
    /// Inputs are normalized (lowercase, spaces to underscores; targets also
    /// replace `/` and `.`). Missing files are logged and skipped, never
    /// inserted as broken steps, so repeated calls over unchanged state are
    /// deterministic. An empty result means nothing could be resolved.
    pub fn get_prompt_sequence(
        &self,
        agent: &str,
        capability: &str,
        target: &str,
    ) -> Vec<PromptStep> {
        let agent_key = slugify(agent);
        let capability_key = slugify(capability);
        let tgt_key = target_key(target);

        let Some(spec) = self.table.get(&agent_key, &capability_key) else {
            warn!(agent, capability, "no declared sequence, using fallback");
            return self.fallback_sequence(&agent_key, &capability_key, &tgt_key, agent, capability, target);
        };

        let mut steps = Vec::new();
        for step in &spec.sequence {
            match step {
                StepSpec::Agent { prompts, purpose } => {
                    for file in prompts {
                        let path = self
                            .prompts_dir
                            .join(&agent_key)
                            .join(&capability_key)
                            .join(file);
                        if path.exists() {
                            steps.push(PromptStep {
                                kind: StepKind::Agent,
                                path,
                                file: file.clone(),
                                purpose: purpose.clone(),
                                agent: Some(agent.to_string()),
                                capability: Some(capability.to_string()),
                                target: None,
                            });
                        } else {
                            warn!(path = %path.display(), "agent prompt not found, skipping");
                        }
                    }
                }
                StepSpec::Target { prompt, purpose } => {
                    let path = self.prompts_dir.join("targets").join(&tgt_key).join(prompt);
                    if path.exists() {
                        steps.push(PromptStep {
                            kind: StepKind::Target,
                            path,
                            file: prompt.clone(),
                            purpose: purpose.clone(),
                            agent: None,
                            capability: None,
                            target: Some(target.to_string()),
                        });
                    } else {
                        warn!(path = %path.display(), "target prompt not found, skipping");
                    }
                }
            }
        }
        steps
    }

    /// Fallback policy: every `*.md` under the agent/capability directory in
    /// lexicographic order, then the fixed capability-to-file target mapping.
    fn fallback_sequence(
        &self,
        agent_key: &str,
        capability_key: &str,
        tgt_key: &str,
        agent: &str,
        capability: &str,
        target: &str,
    ) -> Vec<PromptStep> {
        let mut steps = Vec::new();

        let agent_dir = self.prompts_dir.join(agent_key).join(capability_key);
        for file in markdown_files(&agent_dir) {
            steps.push(PromptStep {
                kind: StepKind::Agent,
                path: agent_dir.join(&file),
                file,
                purpose: "Agent-specific task".to_string(),
                agent: Some(agent.to_string()),
                capability: Some(capability.to_string()),
                target: None,
            });
        }

        for file in fallback_target_files(capability_key) {
            let path = self.prompts_dir.join("targets").join(tgt_key).join(file);
            if path.exists() {
                steps.push(PromptStep {
                    kind: StepKind::Target,
                    path,
                    file: file.to_string(),
                    purpose: "Target-specific implementation".to_string(),
                    agent: None,
                    capability: None,
                    target: Some(target.to_string()),
                });
            } else {
                warn!(path = %path.display(), "target prompt not found, skipping");
            }
        }

        steps
    }

    /// Pre-flight check: for each target, count declared prompt files that
    /// exist versus ones that are missing.
    ///
    /// Unlike [`Orchestrator::get_prompt_sequence`], this inspects the
    /// *declared* file set without skipping, so missing files are reported
    /// rather than silently dropped.
    pub fn validate_orchestration(
        &self,
        agent: &str,
        capability: &str,
        targets: &[String],
    ) -> ValidationReport {
        let agent_key = slugify(agent);
        let capability_key = slugify(capability);

        let mut report = ValidationReport {
            agent: agent.to_string(),
            capability: capability.to_string(),
            valid: true,
            targets: BTreeMap::new(),
        };

        for target in targets {
            let tgt_key = target_key(target);
            let mut result = TargetValidation::default();

            let candidates: Vec<PathBuf> = match self.table.get(&agent_key, &capability_key) {
                Some(spec) => spec
                    .sequence
                    .iter()
                    .flat_map(|step| match step {
                        StepSpec::Agent { prompts, .. } => prompts
                            .iter()
                            .map(|f| {
                                self.prompts_dir
                                    .join(&agent_key)
                                    .join(&capability_key)
                                    .join(f)
                            })
                            .collect::<Vec<_>>(),
                        StepSpec::Target { prompt, .. } => {
                            vec![self.prompts_dir.join("targets").join(&tgt_key).join(prompt)]
                        }
                    })
                    .collect(),
                None => {
                    let agent_dir = self.prompts_dir.join(&agent_key).join(&capability_key);
                    let mut paths: Vec<PathBuf> = markdown_files(&agent_dir)
                        .into_iter()
                        .map(|f| agent_dir.join(f))
                        .collect();
                    paths.extend(
                        fallback_target_files(&capability_key)
                            .iter()
                            .map(|f| self.prompts_dir.join("targets").join(&tgt_key).join(f)),
                    );
                    paths
                }
            };

            result.total_prompts = candidates.len();
            for path in candidates {
                let display = path.display().to_string();
                if path.exists() {
                    result.found_prompts.push(display);
                } else {
                    result.missing_prompts.push(display);
                    report.valid = false;
                }
            }

            report.targets.insert(target.clone(), result);
        }

        report
    }

    /// Summarize every declared orchestration, for listing and inspection.
    pub fn orchestration_info(&self) -> BTreeMap<String, BTreeMap<String, CapabilitySummary>> {
        let mut info = BTreeMap::new();
        for (agent, capabilities) in &self.table.agents {
            let mut agent_info = BTreeMap::new();
            for (capability, spec) in capabilities {
                agent_info.insert(
                    capability.clone(),
                    CapabilitySummary {
                        description: spec.description.clone(),
                        steps: spec.sequence.len(),
                        sequence: spec
                            .sequence
                            .iter()
                            .map(|step| match step {
                                StepSpec::Agent { prompts, purpose } => StepSummary {
                                    kind: StepKind::Agent,
                                    purpose: purpose.clone(),
                                    count: prompts.len(),
                                },
                                StepSpec::Target { purpose, .. } => StepSummary {
                                    kind: StepKind::Target,
                                    purpose: purpose.clone(),
                                    count: 1,
                                },
                            })
                            .collect(),
                    },
                );
            }
            info.insert(agent.clone(), agent_info);
        }
        info
    }
}

/// List `*.md` files in a directory, sorted lexicographically by name.
///
/// Returns an empty list when the directory does not exist.
fn markdown_files(dir: &Path) -> Vec<String> {
    let matcher = markdown_matcher();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| matcher.is_match(name))
        .collect();
    files.sort();
    files
}

/// Matcher for markdown prompt files.
fn markdown_matcher() -> GlobMatcher {
    // The pattern is a compile-time constant; failure is a programmer error.
    Glob::new("*.md").expect("valid glob pattern").compile_matcher()
}
