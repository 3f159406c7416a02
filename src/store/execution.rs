//! Execution history store.

use super::records::ExecutionRecord;
use crate::context::TaskPaths;
use crate::error::{PassageError, Result};
use crate::job::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Inner {
    records: Vec<ExecutionRecord>,
    by_id: HashMap<String, usize>,
}

/// Append-only store of execution records.
///
/// Records live in memory behind a mutex and are mirrored to
/// `{data_root}/executions.ndjson`, one JSON object per line; the file is
/// replayed on construction so history survives restarts. Clones share the
/// same state.
#[derive(Debug, Clone)]
pub struct ExecutionStore {
    path: PathBuf,
    inner: Arc<Mutex<Inner>>,
}

impl ExecutionStore {
    /// Open the store under `data_root`, replaying any existing audit file.
    ///
    /// Lines that fail to parse are skipped with a warning rather than
    /// failing the whole store; a torn final line after a crash must not
    /// take history down with it.
    pub fn open<P: AsRef<Path>>(data_root: P) -> Result<Self> {
        let path = data_root.as_ref().join("executions.ndjson");
        let mut inner = Inner::default();

        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                PassageError::UserError(format!(
                    "failed to read execution history '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ExecutionRecord>(line) {
                    Ok(record) => {
                        let idx = inner.records.len();
                        inner.by_id.insert(record.execution_id.clone(), idx);
                        inner.records.push(record);
                    }
                    Err(e) => {
                        tracing::warn!(
                            line = line_no + 1,
                            error = %e,
                            "skipping unparseable execution history line"
                        );
                    }
                }
            }
        }

        Ok(Self {
            path,
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Append one execution record, durably.
    pub fn record(&self, record: ExecutionRecord) -> Result<()> {
        let line = serde_json::to_string(&record).map_err(|e| {
            PassageError::UserError(format!("failed to serialize execution record: {}", e))
        })?;

        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                PassageError::UserError(format!(
                    "failed to create data directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                PassageError::UserError(format!(
                    "failed to open execution history '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;
        writeln!(file, "{}", line).map_err(|e| {
            PassageError::UserError(format!(
                "failed to write execution history '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        file.sync_all().map_err(|e| {
            PassageError::UserError(format!(
                "failed to sync execution history '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        let mut guard = self.inner.lock().expect("execution store lock poisoned");
        let inner = &mut *guard;
        let idx = inner.records.len();
        inner.by_id.insert(record.execution_id.clone(), idx);
        inner.records.push(record);
        Ok(())
    }

    /// Execution history, newest first, optionally filtered by job.
    pub fn get_history(&self, job_id: Option<&str>) -> Vec<ExecutionRecord> {
        let inner = self.inner.lock().expect("execution store lock poisoned");
        inner
            .records
            .iter()
            .rev()
            .filter(|r| job_id.is_none_or(|id| r.job_id == id))
            .cloned()
            .collect()
    }

    /// Full record for one execution id.
    pub fn get_details(&self, execution_id: &str) -> Option<ExecutionRecord> {
        let inner = self.inner.lock().expect("execution store lock poisoned");
        inner
            .by_id
            .get(execution_id)
            .map(|&i| inner.records[i].clone())
    }
}

/// Combined task output read back from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Contents of `combined_output.md`.
    pub content: String,
    /// Final status from the execution summary, if one was written.
    pub status: Option<Status>,
    /// Modification time of the combined output file.
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SummaryStatus {
    status: Status,
}

/// Read a task's combined output and summary status from its workspace.
pub fn get_task_output(paths: &TaskPaths) -> Result<TaskOutput> {
    let combined = paths.combined_output();
    let content = fs::read_to_string(&combined).map_err(|e| {
        PassageError::UserError(format!(
            "no output recorded at '{}': {}",
            combined.display(),
            e
        ))
    })?;

    let timestamp = fs::metadata(&combined)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);

    let status = fs::read_to_string(paths.execution_summary())
        .ok()
        .and_then(|s| serde_json::from_str::<SummaryStatus>(&s).ok())
        .map(|s| s.status);

    Ok(TaskOutput {
        content,
        status,
        timestamp,
    })
}
