//! Data-root and per-task path resolution for passage.
//!
//! All persisted artifacts live under a single data root supplied by the
//! caller. The layout is fixed for compatibility with existing consumers:
//!
//! ```text
//! {data_root}/jobs/{job_id}/                       job documents + task dirs
//! {data_root}/jobs/{job_id}/{stage_id}/{index}_{task_slug}/
//!     input/     working copy of the source (prepared by a collaborator)
//!     output/    execution_summary.json, per-step outputs, combined_output.md
//!     data/      rendered prompts and scratch files
//! ```

use crate::error::{PassageError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Normalize a free-text name into a filesystem/lookup slug.
///
/// Lowercases and replaces spaces with underscores. Used for agent names,
/// capability names, and task directory names.
pub fn slugify(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Normalize a target framework name into a prompt-directory key.
///
/// Targets additionally replace `/` and `.` so names like "C#/.NET" map to
/// a single directory component. The identical normalization must be applied
/// when target prompt directories are registered.
pub fn target_key(name: &str) -> String {
    slugify(name).replace(['/', '.'], "_")
}

/// Resolved paths for one task execution.
///
/// All paths are absolute once the data root is absolute.
#[derive(Debug, Clone)]
pub struct TaskPaths {
    /// Root of the job's directory tree.
    pub job_dir: PathBuf,
    /// The task's own directory: `{job_dir}/{stage_id}/{index}_{slug}`.
    pub task_dir: PathBuf,
    /// Working directory for the external process (source copy).
    pub input_dir: PathBuf,
    /// Where execution outputs are written.
    pub output_dir: PathBuf,
    /// Rendered prompts and scratch files.
    pub data_dir: PathBuf,
}

impl TaskPaths {
    /// Resolve the path layout for a task, without touching the filesystem.
    pub fn resolve(
        data_root: &Path,
        job_id: &str,
        stage_id: &str,
        task_index: usize,
        task_name: &str,
    ) -> Self {
        let job_dir = data_root.join("jobs").join(job_id);
        let task_dir = job_dir
            .join(stage_id)
            .join(format!("{}_{}", task_index, slugify(task_name)));

        Self {
            input_dir: task_dir.join("input"),
            output_dir: task_dir.join("output"),
            data_dir: task_dir.join("data"),
            job_dir,
            task_dir,
        }
    }

    /// Create the input/output/data directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.input_dir, &self.output_dir, &self.data_dir] {
            fs::create_dir_all(dir).map_err(|e| {
                PassageError::UserError(format!(
                    "failed to create task directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Path of the combined markdown document for this task.
    pub fn combined_output(&self) -> PathBuf {
        self.output_dir.join("combined_output.md")
    }

    /// Path of the execution summary JSON for this task.
    pub fn execution_summary(&self) -> PathBuf {
        self.output_dir.join("execution_summary.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn slugify_lowercases_and_underscores() {
        assert_eq!(slugify("Code Architect"), "code_architect");
        assert_eq!(slugify("Analyze Source Structure"), "analyze_source_structure");
    }

    #[test]
    fn target_key_replaces_separators() {
        assert_eq!(target_key("C#/.NET"), "c#__net");
        assert_eq!(target_key("Rust"), "rust");
        assert_eq!(target_key("Node.js Express"), "node_js_express");
    }

    #[test]
    fn resolve_builds_expected_layout() {
        let paths = TaskPaths::resolve(
            Path::new("/data"),
            "job-1",
            "code_analysis",
            2,
            "Create Migration Plan",
        );
        assert_eq!(
            paths.task_dir,
            Path::new("/data/jobs/job-1/code_analysis/2_create_migration_plan")
        );
        assert_eq!(paths.input_dir, paths.task_dir.join("input"));
        assert_eq!(
            paths.combined_output(),
            paths.task_dir.join("output/combined_output.md")
        );
    }

    #[test]
    fn ensure_dirs_creates_structure() {
        let root = TempDir::new().unwrap();
        let paths = TaskPaths::resolve(root.path(), "job-1", "stage", 0, "Task");
        paths.ensure_dirs().unwrap();

        assert!(paths.input_dir.is_dir());
        assert!(paths.output_dir.is_dir());
        assert!(paths.data_dir.is_dir());
    }
}
