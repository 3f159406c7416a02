//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{PassageError, Result};
use std::path::Path;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are preserved for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            PassageError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from a file if it exists, otherwise use defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| PassageError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| PassageError::UserError(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `command_template` must reference `{prompt_file}`
    /// - `step_timeout_secs`, `max_session_secs`, `refresh_interval_secs`,
    ///   and `max_attempts` must be positive
    pub fn validate(&self) -> Result<()> {
        if !self.command_template.contains("{prompt_file}") {
            return Err(PassageError::UserError(
                "config validation failed: command_template must contain {prompt_file}".to_string(),
            ));
        }

        if self.step_timeout_secs == 0 {
            return Err(PassageError::UserError(
                "config validation failed: step_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.max_session_secs == 0 {
            return Err(PassageError::UserError(
                "config validation failed: max_session_secs must be greater than 0".to_string(),
            ));
        }

        if self.refresh_interval_secs == 0 {
            return Err(PassageError::UserError(
                "config validation failed: refresh_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(PassageError::UserError(
                "config validation failed: max_attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
