//! Child process supervision for one prompt step.
//!
//! Owns the child from spawn to reaped: a reader thread drains stdout
//! line-wise and forwards classified events through a bounded channel, a
//! second thread drains stderr, and the calling thread polls `try_wait`
//! against the step timeout. Termination escalates TERM then KILL, bounded.

use super::classify::{Classified, ResultOutcome, TextFilter, classify_line};
use super::{StreamEvent, classify::SuccessStats};
use crate::error::{PassageError, Result};
use std::io::{BufRead, BufReader, Read};
use std::process::Child;
use std::sync::mpsc::SyncSender;
use std::thread;
use std::time::{Duration, Instant};

/// Stderr marker printed by older CLI builds that predate the auth helper
/// flag. Callers fall back to plain invocation when this is seen.
pub const UNSUPPORTED_HELPER_MARKER: &str = "unknown option '--api-key-helper'";

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const TERM_GRACE: Duration = Duration::from_secs(2);

/// Everything observed while running one step.
#[derive(Debug, Default)]
pub struct StepOutcome {
    /// Process exit code, `None` if it was killed.
    pub exit_code: Option<i32>,
    /// Whether the step hit the wall-clock timeout.
    pub timed_out: bool,
    /// Wall-clock duration.
    pub duration: Duration,
    /// Metrics from a successful result line.
    pub stats: Option<SuccessStats>,
    /// Session tail from the init line.
    pub session_tail: Option<String>,
    /// Terminal result line, if one was seen.
    pub result: Option<ResultOutcome>,
    /// Assistant text, filtered, in arrival order.
    pub messages: Vec<String>,
    /// Tool names, in arrival order.
    pub tools: Vec<String>,
    /// Captured stderr.
    pub stderr: String,
    /// Whether stderr contained the unsupported-helper-flag marker.
    pub helper_flag_unsupported: bool,
}

impl StepOutcome {
    /// A step succeeded when the process exited zero in time and its result
    /// line did not report an error.
    pub fn is_success(&self) -> bool {
        if self.timed_out || self.exit_code != Some(0) {
            return false;
        }
        match &self.result {
            Some(r) => r.is_success(),
            None => true,
        }
    }

    /// Whether the result subtype was `error_during_execution`, which
    /// callers surface as success with a caveat.
    pub fn is_soft_success(&self) -> bool {
        self.result
            .as_ref()
            .is_some_and(|r| r.subtype == "error_during_execution")
    }
}

#[derive(Debug, Default)]
struct Collected {
    stats: Option<SuccessStats>,
    session_tail: Option<String>,
    result: Option<ResultOutcome>,
    messages: Vec<String>,
    tools: Vec<String>,
}

impl Collected {
    fn fold(&mut self, classified: Classified) {
        if let Some(tail) = classified.session_tail {
            self.session_tail = Some(tail);
        }
        if let Some(result) = classified.result {
            self.stats = result.stats;
            self.result = Some(result);
        }
        for event in &classified.events {
            match event {
                StreamEvent::Message { text } => self.messages.push(text.clone()),
                StreamEvent::Tool { name } => self.tools.push(name.clone()),
                _ => {}
            }
        }
    }
}

/// Run a spawned child to completion under a wall-clock timeout.
///
/// Events are forwarded through `tx` as they arrive; a `Completed` sentinel
/// is sent exactly once when stdout closes, even if the process printed
/// nothing. A dropped receiver does not fail the step.
pub fn run_step(
    mut child: Child,
    filter: &TextFilter,
    timeout: Duration,
    tx: &SyncSender<StreamEvent>,
) -> Result<StepOutcome> {
    let stdout = child.stdout.take().ok_or_else(|| {
        PassageError::ExecutionError("child process has no piped stdout".to_string())
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        PassageError::ExecutionError("child process has no piped stderr".to_string())
    })?;

    let filter = filter.clone();
    let event_tx = tx.clone();
    let reader = thread::spawn(move || {
        let mut collected = Collected::default();
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            let classified = classify_line(&line, &filter);
            for event in &classified.events {
                // Receiver may be gone; progress display is best-effort.
                let _ = event_tx.send(event.clone());
            }
            collected.fold(classified);
        }
        let _ = event_tx.send(StreamEvent::Completed);
        collected
    });

    let stderr_reader = thread::spawn(move || {
        let mut buf = String::new();
        let _ = BufReader::new(stderr).read_to_string(&mut buf);
        buf
    });

    let start = Instant::now();
    let mut timed_out = false;
    let exit_code = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    timed_out = true;
                    break reap(&mut child)?;
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(PassageError::ExecutionError(format!(
                    "failed to check process status: {}",
                    e
                )));
            }
        }
    };
    let duration = start.elapsed();

    // Pipes close once the child is gone, so these joins are bounded.
    let collected = reader
        .join()
        .map_err(|_| PassageError::ExecutionError("stdout reader thread panicked".to_string()))?;
    let stderr_text = stderr_reader
        .join()
        .map_err(|_| PassageError::ExecutionError("stderr reader thread panicked".to_string()))?;

    if !stderr_text.trim().is_empty() {
        tracing::warn!(stderr = %stderr_text.trim(), "step process wrote to stderr");
    }

    Ok(StepOutcome {
        exit_code,
        timed_out,
        duration,
        stats: collected.stats,
        session_tail: collected.session_tail,
        result: collected.result,
        messages: collected.messages,
        tools: collected.tools,
        helper_flag_unsupported: stderr_text.contains(UNSUPPORTED_HELPER_MARKER),
        stderr: stderr_text,
    })
}

/// Terminate a child process, escalating from TERM to KILL.
///
/// Guaranteed to return with the process reaped: a graceful TERM is given
/// `TERM_GRACE` to take effect, after which the process is killed outright
/// and waited on.
pub fn reap(child: &mut Child) -> Result<Option<i32>> {
    if let Ok(Some(status)) = child.try_wait() {
        return Ok(status.code());
    }

    terminate(child);
    let deadline = Instant::now() + TERM_GRACE;
    while Instant::now() < deadline {
        if let Ok(Some(status)) = child.try_wait() {
            return Ok(status.code());
        }
        thread::sleep(Duration::from_millis(50));
    }

    let _ = child.kill();
    let status = child.wait().map_err(|e| {
        PassageError::ExecutionError(format!("failed to reap child process: {}", e))
    })?;
    Ok(status.code())
}

/// Ask the process to exit gracefully.
#[cfg(unix)]
fn terminate(child: &Child) {
    // SIGTERM via the kill binary; std exposes only SIGKILL.
    let _ = std::process::Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status();
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
}
