//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for the passage runner.
///
/// This struct represents the contents of `passage.yaml`. Unknown fields in
/// the YAML are preserved for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // CLI invocation
    // =========================================================================
    /// Command template for one prompt step. Parsed with shell-words (no
    /// shell). `{prompt_file}` and `{allowed_tools}` are substituted before
    /// parsing.
    #[serde(default = "default_command_template")]
    pub command_template: String,

    /// Command template for the post-refresh auth probe.
    #[serde(default = "default_probe_template")]
    pub probe_template: String,

    /// Comma-separated tool allowlist passed to the CLI.
    #[serde(default = "default_allowed_tools")]
    pub allowed_tools: String,

    /// Working directory for spawned CLI processes; current directory if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    // =========================================================================
    // Layout
    // =========================================================================
    /// Directory holding per-agent prompt files.
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,

    /// Root directory for jobs, task workspaces, and execution artifacts.
    #[serde(default = "default_data_root")]
    pub data_root: String,

    /// Optional path to a sequence table YAML file. The builtin table is
    /// used when unset or when the file does not exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequences_file: Option<String>,

    // =========================================================================
    // Timeouts and retries
    // =========================================================================
    /// Per-step timeout in seconds.
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,

    /// Maximum session age before the session clock is reset.
    #[serde(default = "default_max_session_secs")]
    pub max_session_secs: u64,

    /// Maximum attempts per task, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    // =========================================================================
    // Authentication
    // =========================================================================
    /// Environment variable consulted first for the CLI credential.
    #[serde(default = "default_credential_env")]
    pub credential_env: String,

    /// Optional file read for the credential when the env var is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_file: Option<String>,

    /// Background refresh interval in seconds.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Sleep after a failed refresh before retrying.
    #[serde(default = "default_refresh_error_sleep_secs")]
    pub refresh_error_sleep_secs: u64,

    /// Timeout for the post-refresh auth probe.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Substrings that classify output as an authentication failure.
    #[serde(default = "default_auth_error_markers")]
    pub auth_error_markers: Vec<String>,

    // =========================================================================
    // Output filtering
    // =========================================================================
    /// Substring replacement pairs applied to assistant text.
    #[serde(default = "default_text_filters")]
    pub text_filters: Vec<(String, String)>,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_template: default_command_template(),
            probe_template: default_probe_template(),
            allowed_tools: default_allowed_tools(),
            working_dir: None,
            prompts_dir: default_prompts_dir(),
            data_root: default_data_root(),
            sequences_file: None,
            step_timeout_secs: default_step_timeout_secs(),
            max_session_secs: default_max_session_secs(),
            max_attempts: default_max_attempts(),
            credential_env: default_credential_env(),
            credential_file: None,
            refresh_interval_secs: default_refresh_interval_secs(),
            refresh_error_sleep_secs: default_refresh_error_sleep_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            auth_error_markers: default_auth_error_markers(),
            text_filters: default_text_filters(),
            extra: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Per-step timeout as a Duration.
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    /// Maximum session age as a Duration.
    pub fn max_session_duration(&self) -> Duration {
        Duration::from_secs(self.max_session_secs)
    }

    /// Refresh interval as a Duration.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Sleep after a failed refresh as a Duration.
    pub fn refresh_error_sleep(&self) -> Duration {
        Duration::from_secs(self.refresh_error_sleep_secs)
    }
}
