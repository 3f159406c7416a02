//! Job, stage, and task model for migration jobs.
//!
//! A job is created once from a workflow template (parameterized by job type
//! and a project-management flag), persisted as a single JSON document, and
//! mutated only through stage/task status updates. Job status and progress
//! are derived from task statuses, never stored authoritatively by callers.
//!
//! Task identity is `(job_id, stage_id, task_index)` for compatibility with
//! existing consumers; every task also carries a stable generated `uid`
//! assigned at creation, which execution records capture so reordering does
//! not orphan history.

mod store;
mod workflow;

pub use store::JobStore;
pub use workflow::workflow_stages;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// What kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Convert a source codebase to a different target framework.
    #[default]
    Migration,
    /// Modernize a codebase in place; has no target reference.
    Modernization,
}

/// Lifecycle status shared by jobs, stages, and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Not started yet.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

/// One task inside a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSpec {
    /// Stable identifier generated at creation time.
    pub uid: String,
    /// Display name; doubles as the capability key after normalization.
    pub name: String,
    /// Owning agent name (free text, normalized for prompt lookup).
    pub agent: String,
    /// Current status.
    pub status: Status,
    /// Optional per-task configuration mapping.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, serde_json::Value>,
    /// Optional credential names required by this task.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<String>,
}

impl Default for TaskSpec {
    fn default() -> Self {
        Self {
            uid: generate_uid("task"),
            name: String::new(),
            agent: String::new(),
            status: Status::Pending,
            config: BTreeMap::new(),
            credentials: Vec::new(),
        }
    }
}

impl TaskSpec {
    /// Create a pending task with a fresh uid.
    pub fn new(name: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agent: agent.into(),
            ..Default::default()
        }
    }
}

/// One stage of a job's workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage {
    /// Stable stage identifier (e.g., "code_analysis").
    pub id: String,
    /// Display name.
    pub name: String,
    /// What this stage accomplishes.
    pub description: String,
    /// Current status.
    pub status: Status,
    /// Agents involved in this stage.
    pub agents: Vec<String>,
    /// Capabilities exercised by this stage.
    pub capabilities: Vec<String>,
    /// Ordered tasks.
    pub tasks: Vec<TaskSpec>,
    /// Credential names granted to this stage.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<String>,
    /// When the stage started running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the stage finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A migration or modernization job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    /// Job identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Migration or modernization.
    pub job_type: JobType,
    /// Source reference (owned by the source-management collaborator).
    pub source_id: String,
    /// Source display name, carried into prompt contexts.
    pub source_name: String,
    /// Target reference; `None` for modernization jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Target display name; `None` for modernization jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    /// Derived status (recomputed from stages, never set directly).
    pub status: Status,
    /// Derived progress percentage, job-wide across all stages' tasks.
    pub progress: u8,
    /// Ordered workflow stages.
    pub stages: Vec<Stage>,
    /// Index of the currently active stage.
    pub current_stage: usize,
    /// Arbitrary job configuration.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, serde_json::Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Who created the job.
    pub created_by: String,
}

impl Default for Job {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: String::new(),
            description: String::new(),
            job_type: JobType::Migration,
            source_id: String::new(),
            source_name: String::new(),
            target_id: None,
            target_name: None,
            status: Status::Pending,
            progress: 0,
            stages: Vec::new(),
            current_stage: 0,
            config: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            created_by: "system".to_string(),
        }
    }
}

/// Parameters for creating a job.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    /// Display name (required).
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Migration or modernization.
    pub job_type: JobType,
    /// Source reference (required).
    pub source_id: String,
    /// Source display name.
    pub source_name: String,
    /// Target reference (required for migration jobs).
    pub target_id: Option<String>,
    /// Target display name.
    pub target_name: Option<String>,
    /// Whether to include the project-management workflow stages.
    pub project_management_enabled: bool,
    /// Who created the job.
    pub created_by: Option<String>,
}

impl Job {
    /// Create a job from a workflow template.
    ///
    /// Stages are generated once at creation time and only their statuses
    /// change afterwards.
    pub fn create(params: NewJob) -> Self {
        let now = Utc::now();
        Self {
            id: generate_uid("job"),
            name: params.name,
            description: params.description,
            job_type: params.job_type,
            source_id: params.source_id,
            source_name: params.source_name,
            target_id: params.target_id,
            target_name: params.target_name,
            stages: workflow_stages(params.job_type, params.project_management_enabled),
            created_at: now,
            updated_at: now,
            created_by: params.created_by.unwrap_or_else(|| "system".to_string()),
            ..Default::default()
        }
    }

    /// Recompute derived status and progress from task statuses.
    ///
    /// Progress is job-wide: completed tasks over total tasks across every
    /// stage, not per stage. Status is failed if any stage failed, running
    /// if any stage is running, completed when all stages completed.
    pub fn recompute(&mut self) {
        let total: usize = self.stages.iter().map(|s| s.tasks.len()).sum();
        let completed: usize = self.stages
            .iter()
            .flat_map(|s| &s.tasks)
            .filter(|t| t.status == Status::Completed)
            .count();
        self.progress = if total == 0 {
            0
        } else {
            ((completed * 100) / total) as u8
        };

        self.status = if self.stages.iter().any(|s| s.status == Status::Failed) {
            Status::Failed
        } else if self.stages.iter().any(|s| s.status == Status::Running) {
            Status::Running
        } else if !self.stages.is_empty()
            && self.stages.iter().all(|s| s.status == Status::Completed)
        {
            Status::Completed
        } else {
            Status::Pending
        };

        // Advance current_stage past completed stages.
        self.current_stage = self
            .stages
            .iter()
            .position(|s| s.status != Status::Completed)
            .unwrap_or(self.stages.len().saturating_sub(1));

        self.updated_at = Utc::now();
    }

    /// Find a stage by id.
    pub fn stage(&self, stage_id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// Find a stage by id, mutably.
    pub fn stage_mut(&mut self, stage_id: &str) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.id == stage_id)
    }
}

/// Generate a process-unique identifier with a type prefix.
///
/// Combines a millisecond timestamp with a process-wide counter; good enough
/// for file and record names without pulling in a UUID dependency.
pub fn generate_uid(prefix: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), n)
}
