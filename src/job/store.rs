//! File-backed job persistence.
//!
//! All jobs live in one `jobs.json` document under the data root. Every
//! mutation rewrites the whole document atomically, so a crash mid-save
//! never leaves a torn file behind.

use super::{Job, NewJob, Status};
use crate::error::{PassageError, Result};
use crate::fs::atomic_write_file;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct JobsDocument {
    jobs: BTreeMap<String, Job>,
}

/// Store for jobs, persisted as `{data_root}/jobs.json`.
#[derive(Debug)]
pub struct JobStore {
    path: PathBuf,
}

impl JobStore {
    /// Create a store rooted at `data_root`. The document is created lazily
    /// on first save.
    pub fn new<P: AsRef<Path>>(data_root: P) -> Self {
        Self {
            path: data_root.as_ref().join("jobs.json"),
        }
    }

    /// Create a job from a workflow template and persist it.
    pub fn create_job(&self, params: NewJob) -> Result<Job> {
        if params.name.trim().is_empty() {
            return Err(PassageError::UserError("job name is required".to_string()));
        }
        if params.source_id.trim().is_empty() {
            return Err(PassageError::UserError(
                "job source_id is required".to_string(),
            ));
        }
        if params.job_type == super::JobType::Migration && params.target_id.is_none() {
            return Err(PassageError::UserError(
                "migration jobs require a target_id".to_string(),
            ));
        }

        let job = Job::create(params);
        let mut doc = self.load()?;
        doc.jobs.insert(job.id.clone(), job.clone());
        self.save(&doc)?;
        Ok(job)
    }

    /// Fetch one job by id.
    pub fn get_job(&self, job_id: &str) -> Result<Job> {
        let doc = self.load()?;
        doc.jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| PassageError::UserError(format!("job '{}' not found", job_id)))
    }

    /// List all jobs, newest first.
    pub fn all_jobs(&self) -> Result<Vec<Job>> {
        let doc = self.load()?;
        let mut jobs: Vec<Job> = doc.jobs.into_values().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    /// Delete a job. Returns an error if it does not exist.
    pub fn delete_job(&self, job_id: &str) -> Result<()> {
        let mut doc = self.load()?;
        if doc.jobs.remove(job_id).is_none() {
            return Err(PassageError::UserError(format!(
                "job '{}' not found",
                job_id
            )));
        }
        self.save(&doc)
    }

    /// Set a stage's status, recompute derived job fields, and persist.
    pub fn update_stage_status(
        &self,
        job_id: &str,
        stage_id: &str,
        status: Status,
    ) -> Result<Job> {
        self.mutate(job_id, |job| {
            let stage = job
                .stage_mut(stage_id)
                .ok_or_else(|| PassageError::UserError(format!("stage '{}' not found", stage_id)))?;
            stage.status = status;
            let now = chrono::Utc::now();
            match status {
                Status::Running => stage.started_at.get_or_insert(now),
                Status::Completed | Status::Failed => stage.completed_at.get_or_insert(now),
                Status::Pending => return Ok(()),
            };
            Ok(())
        })
    }

    /// Set one task's status, recompute derived job fields, and persist.
    ///
    /// The stage itself flips to running on the first running task and to
    /// completed/failed once every task has finished.
    pub fn update_task_status(
        &self,
        job_id: &str,
        stage_id: &str,
        task_index: usize,
        status: Status,
    ) -> Result<Job> {
        self.mutate(job_id, |job| {
            let stage = job
                .stage_mut(stage_id)
                .ok_or_else(|| PassageError::UserError(format!("stage '{}' not found", stage_id)))?;
            let task = stage.tasks.get_mut(task_index).ok_or_else(|| {
                PassageError::UserError(format!(
                    "task index {} out of range for stage '{}'",
                    task_index, stage_id
                ))
            })?;
            task.status = status;

            let now = chrono::Utc::now();
            if status == Status::Running {
                stage.status = Status::Running;
                stage.started_at.get_or_insert(now);
            } else if stage.tasks.iter().all(|t| {
                matches!(t.status, Status::Completed | Status::Failed)
            }) {
                stage.status = if stage.tasks.iter().any(|t| t.status == Status::Failed) {
                    Status::Failed
                } else {
                    Status::Completed
                };
                stage.completed_at.get_or_insert(now);
            }
            Ok(())
        })
    }

    fn mutate<F>(&self, job_id: &str, f: F) -> Result<Job>
    where
        F: FnOnce(&mut Job) -> Result<()>,
    {
        let mut doc = self.load()?;
        let job = doc
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| PassageError::UserError(format!("job '{}' not found", job_id)))?;
        f(job)?;
        job.recompute();
        let updated = job.clone();
        self.save(&doc)?;
        Ok(updated)
    }

    fn load(&self) -> Result<JobsDocument> {
        if !self.path.exists() {
            return Ok(JobsDocument::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            PassageError::UserError(format!(
                "failed to read '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PassageError::UserError(format!(
                "failed to parse '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    fn save(&self, doc: &JobsDocument) -> Result<()> {
        let content = serde_json::to_string_pretty(doc)
            .map_err(|e| PassageError::UserError(format!("failed to serialize jobs: {}", e)))?;
        atomic_write_file(&self.path, &content)
    }
}
