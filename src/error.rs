//! Error types for passage.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.
//! Detailed technical errors are logged at the point of failure; the messages
//! carried here are the short forms surfaced to callers.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for passage operations.
///
/// Each variant maps to a specific exit code for the CLI wrapper. Library
/// callers match on the variant instead.
#[derive(Error, Debug)]
pub enum PassageError {
    /// User provided invalid arguments or the system is in an invalid state.
    #[error("{0}")]
    UserError(String),

    /// No prompt sequence could be resolved for an (agent, capability) pair.
    #[error("No prompts found for {agent}/{capability}")]
    ResolutionError {
        /// Normalized agent key.
        agent: String,
        /// Normalized capability key.
        capability: String,
    },

    /// The external CLI binary could not be started.
    ///
    /// Kept distinct from [`PassageError::ExecutionError`] so the coordinator
    /// can fast-fail instead of burning the retry budget on a missing binary.
    #[error("Failed to start external process: {0}")]
    ProcessStartError(String),

    /// A prompt step or subprocess failed during execution.
    #[error("Execution failed: {0}")]
    ExecutionError(String),

    /// Credential refresh or re-authentication failed.
    #[error("Authentication failed: {0}")]
    AuthError(String),
}

impl PassageError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            PassageError::UserError(_) => exit_codes::USER_ERROR,
            PassageError::ResolutionError { .. } => exit_codes::RESOLUTION_FAILURE,
            PassageError::ProcessStartError(_) => exit_codes::PROCESS_FAILURE,
            PassageError::ExecutionError(_) => exit_codes::EXECUTION_FAILURE,
            PassageError::AuthError(_) => exit_codes::AUTH_FAILURE,
        }
    }
}

/// Result type alias for passage operations.
pub type Result<T> = std::result::Result<T, PassageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_has_correct_exit_code() {
        let err = PassageError::UserError("bad argument".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn resolution_error_has_correct_exit_code() {
        let err = PassageError::ResolutionError {
            agent: "code_architect".to_string(),
            capability: "plan".to_string(),
        };
        assert_eq!(err.exit_code(), exit_codes::RESOLUTION_FAILURE);
    }

    #[test]
    fn process_start_error_has_correct_exit_code() {
        let err = PassageError::ProcessStartError("binary not found".to_string());
        assert_eq!(err.exit_code(), exit_codes::PROCESS_FAILURE);
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = PassageError::ResolutionError {
            agent: "code_architect".to_string(),
            capability: "plan".to_string(),
        };
        assert_eq!(err.to_string(), "No prompts found for code_architect/plan");

        let err = PassageError::ExecutionError("step timed out".to_string());
        assert_eq!(err.to_string(), "Execution failed: step timed out");
    }
}
