//! Step process construction and auth-error recovery.

use super::credentials::CredentialManager;
use crate::config::Config;
use crate::error::{PassageError, Result};
use crate::stream::reap;
use crate::template;
use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Spawns CLI processes and tracks the session clock.
///
/// Sessions older than `max_session_secs` get a credential refresh and a
/// clock reset before the next spawn, so a long-running job never rides an
/// expired session.
pub struct SessionManager {
    config: Config,
    credentials: Arc<CredentialManager>,
    session_start: Mutex<Instant>,
    helper_supported: AtomicBool,
}

impl SessionManager {
    pub fn new(config: Config, credentials: Arc<CredentialManager>) -> Self {
        Self {
            config,
            credentials,
            session_start: Mutex::new(Instant::now()),
            helper_supported: AtomicBool::new(true),
        }
    }

    /// Record that the CLI rejected the auth helper flag, so later spawns
    /// fall back to plain invocation.
    pub fn note_helper_unsupported(&self) {
        if self.helper_supported.swap(false, Ordering::Relaxed) {
            tracing::warn!("CLI does not support the auth helper flag, falling back");
        }
    }

    /// Spawn a step process for the given rendered prompt file, running in
    /// `working_dir`.
    ///
    /// Stdout and stderr are piped; a `working_dir` from config overrides
    /// the per-call directory. Spawn failures are mapped to typed errors.
    pub fn start_process(&self, prompt_file: &Path, working_dir: &Path) -> Result<Child> {
        self.roll_session_if_expired()?;

        let args = self.build_args(prompt_file)?;
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| PassageError::UserError("command template is empty".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(rest)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env(self.credentials.env_var(), self.credentials.current()?);
        match &self.config.working_dir {
            Some(dir) => command.current_dir(dir),
            None => command.current_dir(working_dir),
        };

        command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => PassageError::ProcessStartError(format!(
                "CLI binary '{}' not found; ensure it is installed and in PATH",
                program
            )),
            ErrorKind::PermissionDenied => PassageError::ProcessStartError(format!(
                "CLI binary '{}' is not executable",
                program
            )),
            _ => PassageError::ProcessStartError(format!(
                "failed to start CLI '{}': {}",
                program, e
            )),
        })
    }

    /// Argv for one step, from the command template.
    fn build_args(&self, prompt_file: &Path) -> Result<Vec<String>> {
        let mut ctx = HashMap::new();
        ctx.insert(
            "prompt_file".to_string(),
            prompt_file.to_string_lossy().to_string(),
        );
        ctx.insert("allowed_tools".to_string(), self.config.allowed_tools.clone());

        // Command templates use single-brace placeholders, not the
        // double-brace prompt token form.
        let rendered = template::substitute_args(&self.config.command_template, &ctx);
        let mut args = shell_words::split(&rendered).map_err(|e| {
            PassageError::UserError(format!(
                "failed to parse command template '{}': {}",
                rendered, e
            ))
        })?;

        if self.helper_supported.load(Ordering::Relaxed) {
            args.push("--api-key-helper".to_string());
            args.push(self.credentials.helper_path().to_string_lossy().to_string());
        }

        Ok(args)
    }

    /// Refresh the credential and reset the clock once a session ages out.
    fn roll_session_if_expired(&self) -> Result<()> {
        let mut start = self.session_start.lock().expect("session lock poisoned");
        if start.elapsed() >= self.config.max_session_duration() {
            tracing::info!("session exceeded maximum duration, refreshing credential");
            self.credentials.refresh()?;
            *start = Instant::now();
        }
        Ok(())
    }

    /// Classify output text as an auth failure and attempt recovery.
    ///
    /// Returns true when the text matched the auth vocabulary and a forced
    /// refresh plus probe succeeded; false when the text is not auth-related.
    /// A non-match has no side effects.
    pub fn handle_auth_error(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        let matched = self
            .config
            .auth_error_markers
            .iter()
            .any(|marker| lowered.contains(marker.as_str()));
        if !matched {
            return false;
        }

        tracing::warn!("authentication error detected, forcing credential refresh");
        if let Err(e) = self.credentials.refresh() {
            tracing::error!(error = %e, "forced credential refresh failed");
            return false;
        }

        match self.probe() {
            Ok(true) => {
                tracing::info!("auth probe succeeded after refresh");
                true
            }
            Ok(false) => {
                tracing::error!("auth probe returned no result after refresh");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "auth probe failed after refresh");
                false
            }
        }
    }

    /// Run the lightweight probe invocation and check for a result object.
    fn probe(&self) -> Result<bool> {
        let args = shell_words::split(&self.config.probe_template).map_err(|e| {
            PassageError::UserError(format!(
                "failed to parse probe template '{}': {}",
                self.config.probe_template, e
            ))
        })?;
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| PassageError::UserError("probe template is empty".to_string()))?;

        let mut child = Command::new(program)
            .args(rest)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .env(self.credentials.env_var(), self.credentials.current()?)
            .spawn()
            .map_err(|e| {
                PassageError::ProcessStartError(format!(
                    "failed to start auth probe '{}': {}",
                    program, e
                ))
            })?;

        let deadline = Instant::now() + Duration::from_secs(self.config.probe_timeout_secs);
        let exited = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status.success(),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        reap(&mut child)?;
                        return Ok(false);
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    return Err(PassageError::ExecutionError(format!(
                        "failed to check probe status: {}",
                        e
                    )));
                }
            }
        };
        if !exited {
            return Ok(false);
        }

        let mut output = String::new();
        if let Some(mut stdout) = child.stdout.take() {
            let _ = stdout.read_to_string(&mut output);
        }
        let has_result = output.lines().any(|line| {
            serde_json::from_str::<serde_json::Value>(line)
                .is_ok_and(|v| v.get("type").and_then(|t| t.as_str()) == Some("result"))
        });
        Ok(has_result)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("helper_supported", &self.helper_supported)
            .finish_non_exhaustive()
    }
}
