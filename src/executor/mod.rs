//! Task execution coordinator.
//!
//! Drives one task end to end: resolve the prompt sequence, render each
//! template against the job context, run each prompt through the CLI with a
//! wall-clock timeout, fail fast on step failure, and retry the whole task
//! with exponential backoff. Every execution leaves a durable record in the
//! execution store and a summary plus combined output in the task workspace.

#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::context::TaskPaths;
use crate::error::{PassageError, Result};
use crate::fs::atomic_write_file;
use crate::job::{Job, Status, TaskSpec, generate_uid};
use crate::orchestrator::{Orchestrator, PromptStep, StepKind};
use crate::session::SessionManager;
use crate::store::{
    ExecutionRecord, ExecutionStore, PromptResult, TaskKey, TaskLogStore, actor_string,
};
use crate::stream::{StreamEvent, TextFilter, run_step};
use crate::template;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::SyncSender;
use std::time::Duration;

/// Outcome of one attempt over the whole sequence.
struct AttemptOutcome {
    results: Vec<PromptResult>,
    /// Error text of the failing step, `None` when every step passed.
    error: Option<String>,
}

/// Coordinates sequence resolution, process sessions, and persistence.
pub struct Executor {
    config: Config,
    orchestrator: Orchestrator,
    session: Arc<SessionManager>,
    store: ExecutionStore,
    logs: TaskLogStore,
    filter: TextFilter,
}

impl Executor {
    pub fn new(
        config: Config,
        orchestrator: Orchestrator,
        session: Arc<SessionManager>,
        store: ExecutionStore,
        logs: TaskLogStore,
    ) -> Self {
        let filter = TextFilter::new(config.text_filters.clone());
        Self {
            config,
            orchestrator,
            session,
            store,
            logs,
            filter,
        }
    }

    /// Execute one task of a job.
    ///
    /// Returns the execution record on success (soft successes included).
    /// Failures are typed: resolution failures and spawn failures surface as
    /// their own error variants, everything else as `ExecutionError`. The
    /// record is persisted to the store on every path, and a `Completed`
    /// sentinel is sent on `tx` at the end of every execution.
    pub fn execute_task(
        &self,
        job: &Job,
        stage_id: &str,
        task_index: usize,
        tx: &SyncSender<StreamEvent>,
    ) -> Result<ExecutionRecord> {
        let stage = job.stage(stage_id).ok_or_else(|| {
            PassageError::UserError(format!("stage '{}' not found in job '{}'", stage_id, job.id))
        })?;
        let task = stage.tasks.get(task_index).ok_or_else(|| {
            PassageError::UserError(format!(
                "task index {} out of range for stage '{}'",
                task_index, stage_id
            ))
        })?;

        let key = TaskKey::new(job.id.clone(), stage_id.to_string(), task_index);
        let target = job.target_name.clone().unwrap_or_default();
        let capability = crate::context::slugify(&task.name);
        let started_at = Utc::now();

        let paths = TaskPaths::resolve(
            Path::new(&self.config.data_root),
            &job.id,
            stage_id,
            task_index,
            &task.name,
        );
        paths.ensure_dirs()?;

        let mut record = ExecutionRecord {
            execution_id: generate_uid("exec"),
            job_id: job.id.clone(),
            stage_id: stage_id.to_string(),
            task_index,
            task_uid: task.uid.clone(),
            task_name: task.name.clone(),
            agent: task.agent.clone(),
            capability: capability.clone(),
            status: Status::Running,
            attempts: 0,
            started_at,
            finished_at: started_at,
            actor: actor_string(),
            results: Vec::new(),
            error: None,
        };

        let sequence = self
            .orchestrator
            .get_prompt_sequence(&task.agent, &task.name, &target);
        if sequence.is_empty() {
            let err = PassageError::ResolutionError {
                agent: task.agent.clone(),
                capability: task.name.clone(),
            };
            self.logs.error(&key, err.to_string());
            record.status = Status::Failed;
            record.error = Some(err.to_string());
            record.finished_at = Utc::now();
            self.finish(&paths, &record, tx)?;
            return Err(err);
        }

        self.logs.info(
            &key,
            format!(
                "resolved {} prompt step(s) for {}/{}",
                sequence.len(),
                task.agent,
                capability
            ),
        );

        let context = self.task_context(job, task, &capability, &target);
        let mut last_error = None;

        for attempt in 1..=self.config.max_attempts {
            record.attempts = attempt;
            self.logs.info(
                &key,
                format!("attempt {} of {}", attempt, self.config.max_attempts),
            );

            match self.run_sequence(&sequence, &context, &paths, &key, tx) {
                Ok(outcome) => {
                    record.results = outcome.results;
                    match outcome.error {
                        None => {
                            record.status = Status::Completed;
                            record.error = None;
                            record.finished_at = Utc::now();
                            self.logs.info(&key, "task completed");
                            self.finish(&paths, &record, tx)?;
                            return Ok(record);
                        }
                        Some(error) => {
                            self.logs.error(&key, format!("attempt failed: {}", error));
                            let auth_recovered = self.session.handle_auth_error(&error);
                            last_error = Some(error);
                            if attempt < self.config.max_attempts && !auth_recovered {
                                // Exponential backoff; auth recovery retries
                                // immediately instead.
                                let backoff = Duration::from_secs(2u64.pow(attempt));
                                std::thread::sleep(backoff);
                            }
                        }
                    }
                }
                // Spawn failures are not retryable; surface them directly.
                Err(err @ PassageError::ProcessStartError(_)) => {
                    self.logs.error(&key, err.to_string());
                    record.status = Status::Failed;
                    record.error = Some(err.to_string());
                    record.finished_at = Utc::now();
                    self.finish(&paths, &record, tx)?;
                    return Err(err);
                }
                Err(err) => {
                    self.logs.error(&key, err.to_string());
                    last_error = Some(err.to_string());
                }
            }
        }

        let error = last_error.unwrap_or_else(|| "task failed".to_string());
        record.status = Status::Failed;
        record.error = Some(error.clone());
        record.finished_at = Utc::now();
        self.finish(&paths, &record, tx)?;
        Err(PassageError::ExecutionError(format!(
            "task '{}' failed after {} attempt(s): {}",
            record.task_name, record.attempts, error
        )))
    }

    /// Run every step of the sequence once, failing fast on the first error.
    fn run_sequence(
        &self,
        sequence: &[PromptStep],
        context: &HashMap<String, String>,
        paths: &TaskPaths,
        key: &TaskKey,
        tx: &SyncSender<StreamEvent>,
    ) -> Result<AttemptOutcome> {
        let mut results = Vec::new();

        for (index, step) in sequence.iter().enumerate() {
            self.logs.info(
                key,
                format!("step {}/{}: {}", index + 1, sequence.len(), step.file),
            );

            let rendered_path = self.render_prompt(step, context, paths)?;
            let child = self.session.start_process(&rendered_path, &paths.input_dir)?;
            let outcome = run_step(child, &self.filter, self.config.step_timeout(), tx)?;

            if outcome.helper_flag_unsupported {
                self.session.note_helper_unsupported();
            }

            let base = step.file.trim_end_matches(".md");
            let output_text = outcome.messages.join("\n\n");
            let mut output_file = None;
            if !output_text.is_empty() {
                let file = format!("{}_output.md", base);
                atomic_write_file(paths.output_dir.join(&file), &output_text)?;
                output_file = Some(file);
            }

            let success = outcome.is_success() || outcome.is_soft_success();
            let error = if success {
                None
            } else if outcome.timed_out {
                Some(format!(
                    "step timed out after {}s",
                    self.config.step_timeout_secs
                ))
            } else if let Some(message) = outcome.result.as_ref().and_then(|r| r.message.clone()) {
                Some(message)
            } else if !outcome.stderr.trim().is_empty() {
                Some(outcome.stderr.trim().to_string())
            } else {
                Some(format!(
                    "process exited with code {:?}",
                    outcome.exit_code
                ))
            };

            if let Some(err) = &error {
                atomic_write_file(paths.output_dir.join(format!("{}_error.txt", base)), err)?;
            }

            results.push(PromptResult {
                index,
                prompt_file: step.file.clone(),
                kind: step.kind,
                purpose: step.purpose.clone(),
                success,
                soft_success: outcome.is_soft_success(),
                duration_secs: outcome
                    .stats
                    .map(|s| s.duration_secs)
                    .unwrap_or_else(|| outcome.duration.as_secs_f64()),
                session_id: outcome.session_tail.clone(),
                cost_usd: outcome.stats.map(|s| s.cost_usd),
                turns: outcome.stats.map(|s| s.turns),
                error: error.clone(),
                output_file,
            });

            if let Some(err) = error {
                // Fail fast: remaining steps are not attempted.
                return Ok(AttemptOutcome {
                    results,
                    error: Some(err),
                });
            }

            if outcome.is_soft_success() {
                self.logs.info(
                    key,
                    format!("step {} reported an execution error but produced output", index + 1),
                );
            }
        }

        Ok(AttemptOutcome {
            results,
            error: None,
        })
    }

    /// Render one prompt template into the task data directory.
    fn render_prompt(
        &self,
        step: &PromptStep,
        context: &HashMap<String, String>,
        paths: &TaskPaths,
    ) -> Result<std::path::PathBuf> {
        let text = std::fs::read_to_string(&step.path).map_err(|e| {
            PassageError::ExecutionError(format!(
                "failed to read prompt template '{}': {}",
                step.path.display(),
                e
            ))
        })?;

        let mut ctx = context.clone();
        ctx.insert(
            "step_kind".to_string(),
            match step.kind {
                StepKind::Agent => "agent".to_string(),
                StepKind::Target => "target".to_string(),
            },
        );
        ctx.insert("step_purpose".to_string(), step.purpose.clone());

        let rendered = template::substitute(&text, &ctx);
        let path = paths.data_dir.join(&step.file);
        atomic_write_file(&path, &rendered)?;
        Ok(path)
    }

    /// Merged substitution context from job, source, target, and task.
    fn task_context(
        &self,
        job: &Job,
        task: &TaskSpec,
        capability: &str,
        target: &str,
    ) -> HashMap<String, String> {
        let mut ctx = template::context_from([
            ("job_id", job.id.as_str()),
            ("job_name", job.name.as_str()),
            ("job_description", job.description.as_str()),
            ("source_name", job.source_name.as_str()),
            ("target_name", target),
            ("task_name", task.name.as_str()),
            ("agent", task.agent.as_str()),
            ("capability", capability),
        ]);
        for (k, v) in &task.config {
            if let Some(s) = v.as_str() {
                ctx.insert(k.clone(), s.to_string());
            }
        }
        ctx
    }

    /// Persist the summary, combined output, and store record, then send the
    /// end-of-execution sentinel.
    fn finish(
        &self,
        paths: &TaskPaths,
        record: &ExecutionRecord,
        tx: &SyncSender<StreamEvent>,
    ) -> Result<()> {
        let summary = serde_json::to_string_pretty(record).map_err(|e| {
            PassageError::ExecutionError(format!("failed to serialize execution summary: {}", e))
        })?;
        atomic_write_file(paths.execution_summary(), &summary)?;

        let combined = self.combined_output(paths, record);
        atomic_write_file(paths.combined_output(), &combined)?;

        self.store.record(record.clone())?;
        let _ = tx.send(StreamEvent::Completed);
        Ok(())
    }

    /// Concatenate per-step outputs into one markdown document.
    fn combined_output(&self, paths: &TaskPaths, record: &ExecutionRecord) -> String {
        let mut out = format!("# {}\n", record.task_name);
        for result in &record.results {
            out.push_str(&format!("\n## {}\n\n", result.prompt_file));
            if let Some(file) = &result.output_file {
                match std::fs::read_to_string(paths.output_dir.join(file)) {
                    Ok(text) => {
                        out.push_str(&text);
                        out.push('\n');
                    }
                    Err(_) => out.push_str("(output file missing)\n"),
                }
            }
            if result.soft_success {
                out.push_str("\n> Note: the step reported an error during execution; output may be partial.\n");
            }
            if let Some(err) = &result.error {
                out.push_str(&format!("\n> Failed: {}\n", err));
            }
        }
        if let Some(err) = &record.error
            && record.results.is_empty()
        {
            out.push_str(&format!("\n{}\n", err));
        }
        out
    }
}
