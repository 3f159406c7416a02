//! Exit code constants for the passage CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid state)
//! - 2: Resolution failure (no prompt sequence for agent/capability)
//! - 3: Process failure (external CLI could not be started)
//! - 4: Execution failure (a prompt step failed after retries)
//! - 5: Authentication failure (credential refresh/recovery failed)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid state.
pub const USER_ERROR: i32 = 1;

/// Resolution failure: no prompt sequence found for an agent/capability pair.
pub const RESOLUTION_FAILURE: i32 = 2;

/// Process failure: external CLI binary missing or not executable.
pub const PROCESS_FAILURE: i32 = 3;

/// Execution failure: a prompt step failed after the retry budget.
pub const EXECUTION_FAILURE: i32 = 4;

/// Authentication failure: credential refresh or probe failed.
pub const AUTH_FAILURE: i32 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            USER_ERROR,
            RESOLUTION_FAILURE,
            PROCESS_FAILURE,
            EXECUTION_FAILURE,
            AUTH_FAILURE,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }
}
