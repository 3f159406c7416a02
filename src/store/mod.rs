//! Execution history and task log stores.
//!
//! Two stores with different durability:
//!
//! - [`ExecutionStore`] keeps every execution record and appends each one to
//!   an NDJSON audit file (one JSON object per line) under the data root, so
//!   history survives restarts.
//! - [`TaskLogStore`] is an in-memory ring buffer of progress lines per
//!   task, capped at 1000 entries. It does not survive restart; the durable
//!   record of a task is its execution record and output files.

mod execution;
mod logs;
mod records;

pub use execution::{ExecutionStore, TaskOutput, get_task_output};
pub use logs::{
    LogLevel, TASK_LOG_CAPACITY, TASK_LOG_FILE, TaskKey, TaskLogEntry, TaskLogStore,
    append_task_log, read_task_log,
};
pub use records::{ExecutionRecord, PromptResult, actor_string};
