//! Configuration defaults for passage.
//!
//! Default value functions used by the Config struct.

/// Default substrings that classify CLI output as an authentication failure.
///
/// Matched case-insensitively against both stderr lines and error result
/// payloads.
pub fn default_auth_error_markers() -> Vec<String> {
    vec![
        "401".to_string(),
        "unauthorized".to_string(),
        "authentication".to_string(),
        "auth failed".to_string(),
        "invalid api key".to_string(),
        "expired".to_string(),
        "forbidden".to_string(),
    ]
}

/// Default filter pairs applied to assistant text before display.
///
/// Each pair is `(pattern, replacement)`; patterns are plain substrings.
pub fn default_text_filters() -> Vec<(String, String)> {
    Vec::new()
}

// Default value functions for serde
pub(crate) fn default_command_template() -> String {
    "agent -p {prompt_file} --output-format stream-json --verbose --allowedTools {allowed_tools}"
        .to_string()
}
pub(crate) fn default_probe_template() -> String {
    "agent -p test --output-format json".to_string()
}
pub(crate) fn default_allowed_tools() -> String {
    "Read,Write,Edit,MultiEdit,Bash,Glob,Grep,LS".to_string()
}
pub(crate) fn default_prompts_dir() -> String {
    "prompts".to_string()
}
pub(crate) fn default_data_root() -> String {
    "data".to_string()
}
pub(crate) fn default_step_timeout_secs() -> u64 {
    300
}
pub(crate) fn default_max_session_secs() -> u64 {
    2 * 60 * 60
}
pub(crate) fn default_refresh_interval_secs() -> u64 {
    240
}
pub(crate) fn default_refresh_error_sleep_secs() -> u64 {
    30
}
pub(crate) fn default_probe_timeout_secs() -> u64 {
    15
}
pub(crate) fn default_max_attempts() -> u32 {
    3
}
pub(crate) fn default_credential_env() -> String {
    "AGENT_CLI_TOKEN".to_string()
}
