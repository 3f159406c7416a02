//! CLI argument parsing for passage.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};

/// Passage: file-based orchestration core for CLI-driven code migration jobs.
///
/// Jobs are durable JSON documents; every task execution drives an external
/// coding CLI through an ordered sequence of rendered prompts and leaves its
/// outputs and an execution record on disk.
#[derive(Parser, Debug)]
#[command(name = "passage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the runner configuration file.
    #[arg(long, global = true, default_value = "passage.yaml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Available commands for passage.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage migration jobs.
    ///
    /// Jobs are created from a workflow template and persisted under the
    /// data root as a single JSON document.
    Job(JobCommand),

    /// Pre-flight check of an orchestration.
    ///
    /// Reports, per target, which declared prompt files exist and which are
    /// missing. Does not execute anything.
    Validate(ValidateArgs),

    /// Execute one task of a job.
    ///
    /// Resolves the prompt sequence, runs each prompt through the external
    /// CLI, and records the outcome in the execution history.
    Run(RunArgs),

    /// List the declared orchestration sequences.
    ///
    /// Shows every agent/capability pair in the sequence table with its
    /// step structure.
    Sequences,

    /// Show execution history.
    ///
    /// Lists recorded executions, newest first, optionally filtered by job
    /// or expanded to full detail for one execution.
    History(HistoryArgs),

    /// Show the captured progress log of a task's last run.
    Logs(TaskRefArgs),

    /// Print a task's combined output document.
    Output(TaskRefArgs),
}

/// Job subcommands.
#[derive(Parser, Debug)]
pub struct JobCommand {
    #[command(subcommand)]
    pub action: JobAction,
}

/// Available job actions.
#[derive(Subcommand, Debug)]
pub enum JobAction {
    /// Create a job from the workflow template.
    Create(JobCreateArgs),

    /// List all jobs, newest first.
    List,

    /// Show one job document.
    Show(JobIdArgs),

    /// Delete a job document.
    ///
    /// Task workspaces and execution history are left in place.
    Delete(JobIdArgs),
}

/// Arguments for `job create`.
#[derive(Parser, Debug)]
pub struct JobCreateArgs {
    /// Display name for the job.
    #[arg(long)]
    pub name: String,

    /// Free-text description.
    #[arg(long, default_value = "")]
    pub description: String,

    /// Job type: migration or modernization.
    #[arg(long, default_value = "migration")]
    pub job_type: String,

    /// Source reference id.
    #[arg(long)]
    pub source_id: String,

    /// Source display name.
    #[arg(long, default_value = "")]
    pub source_name: String,

    /// Target reference id (required for migration jobs).
    #[arg(long)]
    pub target_id: Option<String>,

    /// Target display name.
    #[arg(long)]
    pub target_name: Option<String>,

    /// Include the project-management workflow stages.
    #[arg(long)]
    pub project_management: bool,
}

/// Arguments that name one job.
#[derive(Parser, Debug)]
pub struct JobIdArgs {
    /// Job identifier.
    pub job_id: String,
}

/// Arguments for the `validate` command.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Agent name (e.g., "Code Architect").
    pub agent: String,

    /// Capability name (e.g., "plan").
    pub capability: String,

    /// Target names to validate against.
    #[arg(long, value_delimiter = ',', required = true)]
    pub targets: Vec<String>,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Job identifier.
    pub job_id: String,

    /// Stage identifier (e.g., "code_analysis").
    pub stage_id: String,

    /// Zero-based task index within the stage.
    pub task_index: usize,
}

/// Arguments for the `history` command.
#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// Only show executions of this job.
    #[arg(long)]
    pub job: Option<String>,

    /// Show full detail for one execution id instead of the list.
    #[arg(long)]
    pub details: Option<String>,
}

/// Arguments that name one task of a job.
#[derive(Parser, Debug)]
pub struct TaskRefArgs {
    /// Job identifier.
    pub job_id: String,

    /// Stage identifier.
    pub stage_id: String,

    /// Zero-based task index within the stage.
    pub task_index: usize,
}
