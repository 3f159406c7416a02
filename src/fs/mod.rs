//! Filesystem utilities for passage.
//!
//! Provides atomic write operations used for every persisted artifact
//! (job documents, execution summaries, combined outputs), so on-disk
//! state is never left half-written by a crash.

pub mod atomic;

pub use atomic::atomic_write;
pub use atomic::atomic_write_file;
