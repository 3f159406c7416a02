//! Line classification for stream-JSON output.

use super::StreamEvent;
use serde_json::Value;

/// Substring replacements applied to assistant text before it is surfaced.
///
/// Used to scrub product names or boilerplate from progress output. Pairs
/// are applied in order; patterns are plain substrings, not regexes.
#[derive(Debug, Clone, Default)]
pub struct TextFilter {
    pairs: Vec<(String, String)>,
}

impl TextFilter {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Apply every replacement pair in order.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (pattern, replacement) in &self.pairs {
            if !pattern.is_empty() {
                out = out.replace(pattern.as_str(), replacement);
            }
        }
        out
    }
}

/// Metrics reported on a successful result line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuccessStats {
    pub duration_secs: f64,
    pub cost_usd: f64,
    pub turns: u64,
}

/// Terminal result of one CLI invocation, extracted from its `result` line.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultOutcome {
    /// Raw subtype string from the CLI (`success`, `error_max_turns`, ...).
    pub subtype: String,
    /// Metrics, present only for `success`.
    pub stats: Option<SuccessStats>,
    /// Explanation, present only for non-success subtypes.
    pub message: Option<String>,
}

impl ResultOutcome {
    /// Whether the subtype reports success.
    pub fn is_success(&self) -> bool {
        self.subtype == "success"
    }
}

/// Everything extracted from one stdout line.
#[derive(Debug, Clone, Default)]
pub struct Classified {
    /// Events to forward to consumers, in order.
    pub events: Vec<StreamEvent>,
    /// Terminal result, if this was a `result` line.
    pub result: Option<ResultOutcome>,
    /// Session tail, if this was an init line.
    pub session_tail: Option<String>,
}

/// Classify one line of CLI stdout.
///
/// Lines that are not valid JSON become `Raw` events; unknown JSON shapes
/// are silently dropped rather than failing the stream.
pub fn classify_line(line: &str, filter: &TextFilter) -> Classified {
    let mut out = Classified::default();

    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(_) => {
            if !line.trim().is_empty() {
                out.events.push(StreamEvent::Raw {
                    line: line.to_string(),
                });
            }
            return out;
        }
    };

    match value.get("type").and_then(Value::as_str) {
        Some("assistant") => {
            let items = value
                .pointer("/message/content")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for item in items {
                match item.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = item.get("text").and_then(Value::as_str) {
                            let filtered = filter.apply(text);
                            // Text filtered down to nothing is noise, not a
                            // message.
                            if !filtered.trim().is_empty() {
                                out.events.push(StreamEvent::Message { text: filtered });
                            }
                        }
                    }
                    Some("tool_use") => {
                        let name = item
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown")
                            .to_string();
                        out.events.push(StreamEvent::Tool { name });
                    }
                    _ => {}
                }
            }
        }
        Some("system") => {
            if value.get("subtype").and_then(Value::as_str) == Some("init")
                && let Some(id) = value.get("session_id").and_then(Value::as_str)
            {
                let tail = session_tail(id);
                out.session_tail = Some(tail.clone());
                out.events.push(StreamEvent::Init { session_tail: tail });
            }
        }
        Some("result") => {
            let subtype = value
                .get("subtype")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            if subtype == "success" {
                let stats = SuccessStats {
                    duration_secs: value
                        .get("duration_ms")
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0)
                        / 1000.0,
                    cost_usd: value
                        .get("total_cost_usd")
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0),
                    turns: value.get("num_turns").and_then(Value::as_u64).unwrap_or(0),
                };
                out.events.push(StreamEvent::Success {
                    duration_secs: stats.duration_secs,
                    cost_usd: stats.cost_usd,
                    turns: stats.turns,
                });
                out.result = Some(ResultOutcome {
                    subtype,
                    stats: Some(stats),
                    message: None,
                });
            } else {
                let message = explain_subtype(&subtype);
                out.events.push(StreamEvent::Error {
                    message: message.clone(),
                });
                out.result = Some(ResultOutcome {
                    subtype,
                    stats: None,
                    message: Some(message),
                });
            }
        }
        _ => {}
    }

    out
}

/// Last 8 characters of a session id.
fn session_tail(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let start = chars.len().saturating_sub(8);
    chars[start..].iter().collect()
}

/// Map a non-success result subtype to a human-readable explanation.
fn explain_subtype(subtype: &str) -> String {
    match subtype {
        "error_max_turns" => "maximum turns reached without completing the task".to_string(),
        "error_during_execution" => "an error occurred during execution".to_string(),
        "timeout" => "the process timed out".to_string(),
        "resource_limit" => "a resource limit was reached".to_string(),
        "permission_denied" => "permission denied".to_string(),
        "network_error" => "a network error occurred".to_string(),
        "invalid_input" => "the input was invalid".to_string(),
        "tool_error" => "a tool invocation failed".to_string(),
        other => format!("process error: {}", other),
    }
}
