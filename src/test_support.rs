//! Shared helpers for tests that drive stub CLI processes.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Write an executable shell script into `dir` and return its path.
#[cfg(unix)]
pub(crate) fn write_stub_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// A stub CLI that prints the given stdout lines and exits zero.
#[cfg(unix)]
pub(crate) fn stub_cli(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let body = lines
        .iter()
        .map(|l| format!("echo '{}'", l))
        .collect::<Vec<_>>()
        .join("\n");
    write_stub_script(dir, name, &body)
}

/// A stub CLI that ignores SIGTERM and sleeps well past any test timeout.
#[cfg(unix)]
pub(crate) fn term_ignoring_stub(dir: &Path, name: &str) -> PathBuf {
    // Close stdout/stderr before sleeping so the reader sees EOF promptly;
    // otherwise the orphaned sleep would keep the pipe open after the kill.
    write_stub_script(dir, name, "trap '' TERM\nexec >/dev/null 2>&1\nsleep 60")
}

/// Spawn a script with piped stdout/stderr, the way step processes run.
pub(crate) fn spawn_piped(program: &Path, args: &[&str]) -> Child {
    Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap()
}

/// A stream-JSON init line with the given session id.
pub(crate) fn init_line(session_id: &str) -> String {
    format!(
        "{{\"type\": \"system\", \"subtype\": \"init\", \"session_id\": \"{}\"}}",
        session_id
    )
}

/// A stream-JSON assistant text line.
pub(crate) fn text_line(text: &str) -> String {
    format!(
        "{{\"type\": \"assistant\", \"message\": {{\"content\": [{{\"type\": \"text\", \"text\": \"{}\"}}]}}}}",
        text
    )
}

/// A stream-JSON success result line.
pub(crate) fn success_line(duration_ms: u64, cost_usd: f64, turns: u64) -> String {
    format!(
        "{{\"type\": \"result\", \"subtype\": \"success\", \"duration_ms\": {}, \"total_cost_usd\": {}, \"num_turns\": {}}}",
        duration_ms, cost_usd, turns
    )
}

/// A stream-JSON error result line with the given subtype.
pub(crate) fn error_result_line(subtype: &str) -> String {
    format!("{{\"type\": \"result\", \"subtype\": \"{}\"}}", subtype)
}
