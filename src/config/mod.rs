//! Runner configuration.
//!
//! The config file is YAML (`passage.yaml` by default) and every field has
//! a default, so an empty file is a valid configuration.

mod model;
mod operations;
mod types;

pub use model::Config;
pub use types::default_auth_error_markers;
