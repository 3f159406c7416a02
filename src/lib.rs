//! Passage: file-based orchestration core for CLI-driven code migration jobs.
//!
//! A job is a durable JSON document describing a staged migration workflow.
//! Each task of a stage maps an (agent, capability) pair to an ordered
//! sequence of prompt templates; executing a task renders those templates
//! against the job context and drives an external coding CLI through them,
//! one subprocess per prompt, streaming classified progress events and
//! leaving an execution record, a combined output document, and rendered
//! artifacts on disk.
//!
//! Module map:
//!
//! - [`job`]: job documents, the workflow template, and the job store
//! - [`orchestrator`]: sequence table, prompt resolution, validation
//! - [`executor`]: per-task execution with retries and persistence
//! - [`session`]: credential resolution, refresh daemon, process spawning
//! - [`stream`]: stream-json classification and the step runner
//! - [`store`]: execution history and task logs
//! - [`cli`] / [`commands`]: the thin binary surface over the library

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod exit_codes;
pub mod fs;
pub mod job;
pub mod orchestrator;
pub mod session;
pub mod store;
pub mod stream;
pub mod template;

#[cfg(test)]
pub(crate) mod test_support;
