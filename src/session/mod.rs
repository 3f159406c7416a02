//! CLI process sessions and credential lifecycle.
//!
//! [`CredentialManager`] resolves the opaque CLI credential (env var, then
//! file, then an injected provider), maintains the auth helper script, and
//! can run a background refresh loop. [`SessionManager`] builds and spawns
//! step processes from the configured command template and owns the session
//! clock and auth-error recovery.

mod credentials;
mod manager;
#[cfg(test)]
mod tests;

pub use credentials::{CredentialManager, CredentialProvider, RefreshDaemon};
pub use manager::SessionManager;
