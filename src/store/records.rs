//! Execution record types.

use crate::job::Status;
use crate::orchestrator::StepKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one prompt step within a task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResult {
    /// Zero-based position in the sequence.
    pub index: usize,
    /// Prompt filename.
    pub prompt_file: String,
    /// Agent or target step.
    pub kind: StepKind,
    /// Purpose string from the sequence table.
    pub purpose: String,
    /// Whether the step succeeded (soft successes count).
    pub success: bool,
    /// True when the CLI reported `error_during_execution`, which is
    /// surfaced as success with a caveat.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub soft_success: bool,
    /// Wall-clock duration of the step.
    pub duration_secs: f64,
    /// Session identifier tail reported by the CLI, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Reported cost in USD, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    /// Reported conversation turns, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turns: Option<u64>,
    /// Error description for failed steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Relative path of the per-step output file, when one was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
}

/// One complete task execution, durable in the execution store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Unique execution identifier.
    pub execution_id: String,
    /// Owning job.
    pub job_id: String,
    /// Owning stage.
    pub stage_id: String,
    /// Position of the task within the stage.
    pub task_index: usize,
    /// Stable task uid from the job document.
    pub task_uid: String,
    /// Task display name.
    pub task_name: String,
    /// Agent that ran the task.
    pub agent: String,
    /// Normalized capability key.
    pub capability: String,
    /// Final status.
    pub status: Status,
    /// Attempts consumed, including the successful one.
    pub attempts: u32,
    /// When execution started.
    pub started_at: DateTime<Utc>,
    /// When execution finished.
    pub finished_at: DateTime<Utc>,
    /// Who ran it (`user@host`).
    pub actor: String,
    /// Per-step results in sequence order.
    pub results: Vec<PromptResult>,
    /// Task-level error for failed executions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Actor string for execution records (`user@host`).
pub fn actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
