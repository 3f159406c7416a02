//! Stream-JSON output reduction for the external CLI.
//!
//! The CLI emits one JSON object per stdout line. A reader thread decodes
//! and classifies each line into a [`StreamEvent`] and forwards it through a
//! bounded channel so callers can surface live progress. A `Completed`
//! sentinel is sent exactly once when stdout closes, regardless of what the
//! process printed before.

mod classify;
mod runner;

pub use classify::{Classified, ResultOutcome, SuccessStats, TextFilter, classify_line};
pub use runner::{StepOutcome, UNSUPPORTED_HELPER_MARKER, reap, run_step};

use serde::Serialize;

/// One classified line of CLI output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Session established; carries the last 8 characters of the session id.
    Init { session_tail: String },
    /// Assistant text, already passed through the configured filter.
    Message { text: String },
    /// Tool invocation by name.
    Tool { name: String },
    /// Successful result with reported metrics.
    Success {
        duration_secs: f64,
        cost_usd: f64,
        turns: u64,
    },
    /// Failed result, explained.
    Error { message: String },
    /// A line that was not valid JSON.
    Raw { line: String },
    /// Sent exactly once when stdout closes.
    Completed,
}

impl StreamEvent {
    /// Human-readable progress line, or `None` for events with no display.
    pub fn display(&self) -> Option<String> {
        match self {
            StreamEvent::Init { session_tail } => {
                Some(format!("Session started ({})", session_tail))
            }
            StreamEvent::Message { text } => Some(text.clone()),
            StreamEvent::Tool { name } => Some(format!("Using tool: {}", name)),
            StreamEvent::Success {
                duration_secs,
                cost_usd,
                turns,
            } => Some(format!(
                "Completed in {:.2}s | Cost: ${:.4} | Turns: {}",
                duration_secs, cost_usd, turns
            )),
            StreamEvent::Error { message } => Some(format!("Error: {}", message)),
            StreamEvent::Raw { .. } => None,
            StreamEvent::Completed => None,
        }
    }
}
