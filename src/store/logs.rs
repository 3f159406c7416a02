//! In-memory task log ring buffer, plus the durable per-task log file.

use crate::error::{PassageError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Maximum log entries retained per task. Older entries are evicted.
pub const TASK_LOG_CAPACITY: usize = 1000;

/// File name of the durable per-task log, written into the task output dir.
pub const TASK_LOG_FILE: &str = "task_log.ndjson";

/// Severity of a task log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Debug,
    Error,
}

/// One progress line for a running task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogEntry {
    /// When the line was logged.
    pub ts: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Display text.
    pub message: String,
}

impl TaskLogEntry {
    /// Create an entry timestamped now.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// Identifies one task within one job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub job_id: String,
    pub stage_id: String,
    pub task_index: usize,
}

impl TaskKey {
    pub fn new(job_id: impl Into<String>, stage_id: impl Into<String>, task_index: usize) -> Self {
        Self {
            job_id: job_id.into(),
            stage_id: stage_id.into(),
            task_index,
        }
    }
}

/// Ring buffer of recent log lines per task.
///
/// In-memory only; restarting the process loses these lines. The durable
/// record of a task is its execution record and output files. Clones share
/// the same state.
#[derive(Debug, Clone, Default)]
pub struct TaskLogStore {
    inner: Arc<Mutex<HashMap<TaskKey, VecDeque<TaskLogEntry>>>>,
}

impl TaskLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line, evicting the oldest once the cap is reached.
    pub fn append(&self, key: &TaskKey, entry: TaskLogEntry) {
        let mut inner = self.inner.lock().expect("task log lock poisoned");
        let buffer = inner.entry(key.clone()).or_default();
        if buffer.len() >= TASK_LOG_CAPACITY {
            buffer.pop_front();
        }
        buffer.push_back(entry);
    }

    /// Log an info line.
    pub fn info(&self, key: &TaskKey, message: impl Into<String>) {
        self.append(key, TaskLogEntry::new(LogLevel::Info, message));
    }

    /// Log a debug line.
    pub fn debug(&self, key: &TaskKey, message: impl Into<String>) {
        self.append(key, TaskLogEntry::new(LogLevel::Debug, message));
    }

    /// Log an error line.
    pub fn error(&self, key: &TaskKey, message: impl Into<String>) {
        self.append(key, TaskLogEntry::new(LogLevel::Error, message));
    }

    /// All retained lines for a task, oldest first.
    pub fn get(&self, key: &TaskKey) -> Vec<TaskLogEntry> {
        let inner = self.inner.lock().expect("task log lock poisoned");
        inner
            .get(key)
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Append one entry to a task's durable log file as a JSON line.
///
/// The file is truncated at the start of each run, so it always reflects the
/// most recent execution of the task.
pub fn append_task_log(path: &Path, entry: &TaskLogEntry) -> Result<()> {
    let line = serde_json::to_string(entry)
        .map_err(|e| PassageError::ExecutionError(format!("Failed to serialize log entry: {e}")))?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| PassageError::ExecutionError(format!("Failed to open task log: {e}")))?;
    writeln!(file, "{line}")
        .map_err(|e| PassageError::ExecutionError(format!("Failed to write task log: {e}")))?;
    Ok(())
}

/// Read back a task's durable log file, oldest first.
///
/// Unparseable lines are skipped; a missing file is an empty log.
pub fn read_task_log(path: &Path) -> Result<Vec<TaskLogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| PassageError::ExecutionError(format!("Failed to read task log: {e}")))?;
    Ok(content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}
