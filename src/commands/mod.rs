//! Command implementations for passage.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Commands that only read state (validate, sequences,
//! history, logs, output) live here; job management and task execution have
//! their own submodules.

mod job;
mod run;

use crate::cli::{Cli, Command, HistoryArgs, TaskRefArgs, ValidateArgs};
use crate::config::Config;
use crate::context::TaskPaths;
use crate::error::Result;
use crate::job::{JobStore, Status};
use crate::orchestrator::Orchestrator;
use crate::store::{self, ExecutionStore, TASK_LOG_FILE, get_task_output};

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command loads
/// the configuration named on the command line and routes to its handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(&cli.config)?;
    match cli.command {
        Command::Job(job_cmd) => job::dispatch(&config, job_cmd),
        Command::Validate(args) => cmd_validate(&config, args),
        Command::Run(args) => run::cmd_run(&config, args),
        Command::Sequences => cmd_sequences(&config),
        Command::History(args) => cmd_history(&config, args),
        Command::Logs(args) => cmd_logs(&config, args),
        Command::Output(args) => cmd_output(&config, args),
    }
}

/// Build the orchestrator the way every command needs it: external sequence
/// table when one is configured and present, builtin table otherwise.
fn load_orchestrator(config: &Config) -> Result<Orchestrator> {
    use crate::orchestrator::SequenceTable;
    let table = match &config.sequences_file {
        Some(path) => SequenceTable::load_or_builtin(path)?,
        None => SequenceTable::builtin(),
    };
    Ok(Orchestrator::new(&config.prompts_dir, table))
}

/// Lowercase status label matching the serialized form.
fn status_label(status: Status) -> &'static str {
    match status {
        Status::Pending => "pending",
        Status::Running => "running",
        Status::Completed => "completed",
        Status::Failed => "failed",
    }
}

fn cmd_validate(config: &Config, args: ValidateArgs) -> Result<()> {
    let orchestrator = load_orchestrator(config)?;
    let report =
        orchestrator.validate_orchestration(&args.agent, &args.capability, &args.targets);

    println!("Orchestration: {}/{}", report.agent, report.capability);
    for (target, validation) in &report.targets {
        let label = if validation.missing_prompts.is_empty() {
            "ok"
        } else {
            "missing prompts"
        };
        println!(
            "  {}: {} ({}/{} prompts found)",
            target,
            label,
            validation.found_prompts.len(),
            validation.total_prompts
        );
        for missing in &validation.missing_prompts {
            println!("    missing: {}", missing);
        }
    }
    if report.valid {
        println!("Valid");
        Ok(())
    } else {
        Err(crate::error::PassageError::ResolutionError {
            agent: report.agent,
            capability: report.capability,
        })
    }
}

fn cmd_sequences(config: &Config) -> Result<()> {
    let orchestrator = load_orchestrator(config)?;
    let info = orchestrator.orchestration_info();
    if info.is_empty() {
        println!("No sequences declared");
        return Ok(());
    }
    for (agent, capabilities) in &info {
        println!("{}", agent);
        for (capability, summary) in capabilities {
            println!("  {} ({} steps): {}", capability, summary.steps, summary.description);
            for step in &summary.sequence {
                println!("    {:?} x{}: {}", step.kind, step.count, step.purpose);
            }
        }
    }
    Ok(())
}

fn cmd_history(config: &Config, args: HistoryArgs) -> Result<()> {
    let store = ExecutionStore::open(&config.data_root)?;

    if let Some(execution_id) = &args.details {
        let record = store.get_details(execution_id).ok_or_else(|| {
            crate::error::PassageError::UserError(format!(
                "No execution found with id '{execution_id}'"
            ))
        })?;
        let rendered = serde_json::to_string_pretty(&record).map_err(|e| {
            crate::error::PassageError::ExecutionError(format!(
                "Failed to render execution record: {e}"
            ))
        })?;
        println!("{rendered}");
        return Ok(());
    }

    let records = store.get_history(args.job.as_deref());
    if records.is_empty() {
        println!("No executions recorded");
        return Ok(());
    }
    for record in &records {
        println!(
            "{}  {}  {}/{}[{}]  {}  {} attempt(s)  {}",
            record.execution_id,
            record.job_id,
            record.stage_id,
            record.task_name,
            record.task_index,
            status_label(record.status),
            record.attempts,
            record.started_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

/// Resolve the task workspace for a task reference, using the job document
/// for the task name so paths match what the executor used.
fn resolve_task_paths(config: &Config, args: &TaskRefArgs) -> Result<TaskPaths> {
    let store = JobStore::new(&config.data_root);
    let job = store.get_job(&args.job_id)?;
    let stage = job.stage(&args.stage_id).ok_or_else(|| {
        crate::error::PassageError::UserError(format!(
            "Job '{}' has no stage '{}'",
            args.job_id, args.stage_id
        ))
    })?;
    let task = stage.tasks.get(args.task_index).ok_or_else(|| {
        crate::error::PassageError::UserError(format!(
            "Stage '{}' has no task at index {}",
            args.stage_id, args.task_index
        ))
    })?;
    Ok(TaskPaths::resolve(
        std::path::Path::new(&config.data_root),
        &args.job_id,
        &args.stage_id,
        args.task_index,
        &task.name,
    ))
}

fn cmd_logs(config: &Config, args: TaskRefArgs) -> Result<()> {
    let paths = resolve_task_paths(config, &args)?;
    let entries = store::read_task_log(&paths.output_dir.join(TASK_LOG_FILE))?;
    if entries.is_empty() {
        println!("No log recorded for this task");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{} [{:?}] {}",
            entry.ts.format("%H:%M:%S"),
            entry.level,
            entry.message
        );
    }
    Ok(())
}

fn cmd_output(config: &Config, args: TaskRefArgs) -> Result<()> {
    let paths = resolve_task_paths(config, &args)?;
    let output = get_task_output(&paths)?;
    if let Some(status) = output.status {
        println!("Status: {}", status_label(status));
    }
    if let Some(ts) = output.timestamp {
        println!("Written: {}", ts.format("%Y-%m-%d %H:%M:%S"));
    }
    println!();
    println!("{}", output.content);
    Ok(())
}
