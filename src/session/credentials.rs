//! Credential resolution and refresh.

use crate::config::Config;
use crate::error::{PassageError, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Pluggable credential source, e.g. a cloud secret-manager lookup.
pub type CredentialProvider = Box<dyn Fn() -> Result<String> + Send + Sync>;

/// Resolves and refreshes the CLI credential.
///
/// Resolution order: environment variable, then credential file, then the
/// injected provider. The resolved secret is cached and injected into
/// spawned process environments rather than written into the global
/// process environment.
pub struct CredentialManager {
    env_var: String,
    file: Option<PathBuf>,
    provider: Option<CredentialProvider>,
    helper_path: PathBuf,
    current: Mutex<Option<String>>,
    last_refresh: Mutex<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("env_var", &self.env_var)
            .field("file", &self.file)
            .field("helper_path", &self.helper_path)
            .finish_non_exhaustive()
    }
}

impl CredentialManager {
    /// Build a manager from config. The helper script lives under the data
    /// root.
    pub fn new(config: &Config) -> Self {
        Self {
            env_var: config.credential_env.clone(),
            file: config.credential_file.as_ref().map(PathBuf::from),
            provider: None,
            helper_path: Path::new(&config.data_root).join("auth_helper.sh"),
            current: Mutex::new(None),
            last_refresh: Mutex::new(None),
        }
    }

    /// Attach a credential provider consulted after env var and file.
    pub fn with_provider(mut self, provider: CredentialProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Environment variable the credential is exposed through.
    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    /// Path of the auth helper script.
    pub fn helper_path(&self) -> &Path {
        &self.helper_path
    }

    /// When the credential was last refreshed.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.lock().expect("credential lock poisoned")
    }

    /// The cached credential, refreshing first if none is cached yet.
    pub fn current(&self) -> Result<String> {
        {
            let cached = self.current.lock().expect("credential lock poisoned");
            if let Some(secret) = cached.as_ref() {
                return Ok(secret.clone());
            }
        }
        self.refresh()?;
        let cached = self.current.lock().expect("credential lock poisoned");
        cached
            .clone()
            .ok_or_else(|| PassageError::AuthError("no credential available".to_string()))
    }

    /// Resolve the credential from its sources, in order.
    fn resolve(&self) -> Result<String> {
        if let Ok(value) = std::env::var(&self.env_var)
            && !value.trim().is_empty()
        {
            return Ok(value);
        }

        if let Some(file) = &self.file
            && file.exists()
        {
            let content = std::fs::read_to_string(file).map_err(|e| {
                PassageError::AuthError(format!(
                    "failed to read credential file '{}': {}",
                    file.display(),
                    e
                ))
            })?;
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }

        if let Some(provider) = &self.provider {
            return provider();
        }

        Err(PassageError::AuthError(format!(
            "no credential found: set {}, provide a credential file, or configure a provider",
            self.env_var
        )))
    }

    /// Re-resolve the credential, rewrite the helper script, and stamp
    /// `last_refresh`.
    pub fn refresh(&self) -> Result<()> {
        let secret = self.resolve()?;
        self.write_helper_script()?;

        *self.current.lock().expect("credential lock poisoned") = Some(secret);
        *self.last_refresh.lock().expect("credential lock poisoned") = Some(Utc::now());
        tracing::debug!("credential refreshed");
        Ok(())
    }

    /// Write the auth helper script the CLI invokes to obtain the key.
    ///
    /// The script echoes the credential env var so the secret itself never
    /// lands on disk.
    fn write_helper_script(&self) -> Result<()> {
        let script = format!("#!/bin/sh\nprintf '%s\\n' \"${{{}}}\"\n", self.env_var);
        crate::fs::atomic_write_file(&self.helper_path, &script)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.helper_path, std::fs::Permissions::from_mode(0o755))
                .map_err(|e| {
                    PassageError::AuthError(format!(
                        "failed to mark auth helper '{}' executable: {}",
                        self.helper_path.display(),
                        e
                    ))
                })?;
        }

        Ok(())
    }

    /// Start the background refresh loop.
    ///
    /// Refreshes every `interval`; on error, logs and retries after
    /// `error_sleep`. Runs until the returned daemon is stopped or dropped.
    pub fn spawn_refresh_daemon(
        self: &Arc<Self>,
        interval: Duration,
        error_sleep: Duration,
    ) -> RefreshDaemon {
        let manager = Arc::clone(self);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("credential-refresh".to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Relaxed) {
                    let sleep_for = match manager.refresh() {
                        Ok(()) => interval,
                        Err(e) => {
                            tracing::error!(error = %e, "credential refresh failed");
                            error_sleep
                        }
                    };
                    interruptible_sleep(sleep_for, &stop_flag);
                }
            })
            .expect("failed to spawn refresh thread");

        RefreshDaemon {
            stop,
            handle: Some(handle),
        }
    }
}

/// Sleep in short slices so a stop request is noticed promptly.
fn interruptible_sleep(total: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + total;
    while Instant::now() < deadline && !stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }
}

/// Handle to the background refresh thread.
#[derive(Debug)]
pub struct RefreshDaemon {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshDaemon {
    /// Signal the loop to stop and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RefreshDaemon {
    fn drop(&mut self) {
        self.shutdown();
    }
}
