//! The `run` command: execute one task of a job end to end.
//!
//! Wires the stores, the credential refresh daemon, and the executor
//! together, then consumes the progress stream on a background thread so
//! events are printed and persisted as they arrive.

use crate::cli::RunArgs;
use crate::config::Config;
use crate::context::TaskPaths;
use crate::error::{PassageError, Result};
use crate::executor::Executor;
use crate::job::{JobStore, Status};
use crate::session::{CredentialManager, SessionManager};
use crate::store::{
    ExecutionStore, LogLevel, TASK_LOG_FILE, TaskKey, TaskLogEntry, TaskLogStore, append_task_log,
};
use crate::stream::StreamEvent;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;

/// Channel depth for progress events. The consumer drains quickly; this only
/// smooths over bursts from chatty steps.
const EVENT_CHANNEL_DEPTH: usize = 256;

pub fn cmd_run(config: &Config, args: RunArgs) -> Result<()> {
    let jobs = JobStore::new(&config.data_root);
    let job = jobs.get_job(&args.job_id)?;
    let stage = job.stage(&args.stage_id).ok_or_else(|| {
        PassageError::UserError(format!(
            "Job '{}' has no stage '{}'",
            args.job_id, args.stage_id
        ))
    })?;
    let task = stage.tasks.get(args.task_index).ok_or_else(|| {
        PassageError::UserError(format!(
            "Stage '{}' has no task at index {}",
            args.stage_id, args.task_index
        ))
    })?;

    let paths = TaskPaths::resolve(
        std::path::Path::new(&config.data_root),
        &args.job_id,
        &args.stage_id,
        args.task_index,
        &task.name,
    );
    paths.ensure_dirs()?;

    // Truncate the durable log so it reflects this run only.
    let log_path = paths.output_dir.join(TASK_LOG_FILE);
    if log_path.exists() {
        std::fs::remove_file(&log_path).map_err(|e| {
            PassageError::ExecutionError(format!("Failed to reset task log: {e}"))
        })?;
    }

    let store = ExecutionStore::open(&config.data_root)?;
    let logs = TaskLogStore::new();
    let orchestrator = super::load_orchestrator(config)?;

    let credentials = Arc::new(CredentialManager::new(config));
    let daemon = credentials.spawn_refresh_daemon(
        config.refresh_interval(),
        config.refresh_error_sleep(),
    );
    let session = Arc::new(SessionManager::new(config.clone(), Arc::clone(&credentials)));

    let executor = Executor::new(
        config.clone(),
        orchestrator,
        session,
        store,
        logs.clone(),
    );

    let key = TaskKey::new(&args.job_id, &args.stage_id, args.task_index);
    let (tx, rx) = mpsc::sync_channel::<StreamEvent>(EVENT_CHANNEL_DEPTH);
    let consumer = spawn_consumer(rx, logs.clone(), key.clone(), log_path);

    jobs.update_task_status(&args.job_id, &args.stage_id, args.task_index, Status::Running)?;

    println!(
        "Running {}/{}[{}]: {} ({})",
        args.job_id, args.stage_id, args.task_index, task.name, task.agent
    );

    let outcome = executor.execute_task(&job, &args.stage_id, args.task_index, &tx);

    // Drop our sender so the consumer sees the channel close and drains out.
    drop(tx);
    let _ = consumer.join();
    daemon.stop();

    match outcome {
        Ok(record) => {
            jobs.update_task_status(
                &args.job_id,
                &args.stage_id,
                args.task_index,
                Status::Completed,
            )?;
            println!(
                "Task completed: {} step(s), {} attempt(s)",
                record.results.len(),
                record.attempts
            );
            Ok(())
        }
        Err(err) => {
            jobs.update_task_status(
                &args.job_id,
                &args.stage_id,
                args.task_index,
                Status::Failed,
            )?;
            Err(err)
        }
    }
}

/// Print, buffer, and persist progress events until the channel closes.
fn spawn_consumer(
    rx: mpsc::Receiver<StreamEvent>,
    logs: TaskLogStore,
    key: TaskKey,
    log_path: PathBuf,
) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("event-consumer".to_string())
        .spawn(move || {
            for event in rx {
                let Some(line) = event.display() else {
                    continue;
                };
                println!("  {line}");
                let level = match event {
                    StreamEvent::Error { .. } => LogLevel::Error,
                    StreamEvent::Tool { .. } => LogLevel::Debug,
                    _ => LogLevel::Info,
                };
                let entry = TaskLogEntry::new(level, line);
                logs.append(&key, entry.clone());
                if let Err(e) = append_task_log(&log_path, &entry) {
                    tracing::warn!(error = %e, "failed to persist task log line");
                }
            }
        })
        .expect("failed to spawn event consumer")
}
