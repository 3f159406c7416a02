use super::*;
use std::fs;
use tempfile::TempDir;

fn write_prompt(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, format!("# prompt {}\n", rel)).unwrap();
}

/// Prompt tree for the builtin code_architect/plan sequence against rust.
fn plan_fixture() -> (TempDir, Orchestrator) {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    write_prompt(&root, "code_architect/plan/01_analyze_project_structure.md");
    write_prompt(&root, "code_architect/plan/03_design_target_architecture.md");
    write_prompt(&root, "targets/rust/01_analyze.md");
    write_prompt(&root, "targets/rust/02_plan.md");
    let orchestrator = Orchestrator::with_builtin_table(root);
    (dir, orchestrator)
}

#[test]
fn declared_sequence_resolves_in_order() {
    let (_dir, orchestrator) = plan_fixture();

    let steps = orchestrator.get_prompt_sequence("Code Architect", "Plan", "Rust");

    assert_eq!(steps.len(), 4);
    let kinds: Vec<StepKind> = steps.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![StepKind::Agent, StepKind::Target, StepKind::Target, StepKind::Agent]
    );
    assert_eq!(steps[0].file, "01_analyze_project_structure.md");
    assert_eq!(steps[1].file, "01_analyze.md");
    assert_eq!(steps[2].file, "02_plan.md");
    assert_eq!(steps[3].file, "03_design_target_architecture.md");
    assert_eq!(steps[0].agent.as_deref(), Some("Code Architect"));
    assert_eq!(steps[1].target.as_deref(), Some("Rust"));
}

#[test]
fn sequence_is_deterministic_across_calls() {
    let (_dir, orchestrator) = plan_fixture();

    let first = orchestrator.get_prompt_sequence("code_architect", "plan", "rust");
    let second = orchestrator.get_prompt_sequence("code_architect", "plan", "rust");

    let files = |steps: &[PromptStep]| steps.iter().map(|s| s.file.clone()).collect::<Vec<_>>();
    assert_eq!(files(&first), files(&second));
}

#[test]
fn missing_declared_files_are_skipped_not_broken() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    // Only one of the four declared plan files exists.
    write_prompt(&root, "targets/rust/02_plan.md");
    let orchestrator = Orchestrator::with_builtin_table(root);

    let steps = orchestrator.get_prompt_sequence("code_architect", "plan", "rust");

    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].file, "02_plan.md");
    assert!(steps[0].path.exists());
}

#[test]
fn unknown_pair_resolves_nothing_when_no_files_exist() {
    let dir = TempDir::new().unwrap();
    let orchestrator = Orchestrator::with_builtin_table(dir.path());

    let steps = orchestrator.get_prompt_sequence("mystery_agent", "conjure", "rust");

    assert!(steps.is_empty());
}

#[test]
fn fallback_lists_agent_files_sorted_then_mapped_target_files() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    // No declared table entry for security_engineer/migrate.
    write_prompt(&root, "security_engineer/migrate/02_harden.md");
    write_prompt(&root, "security_engineer/migrate/01_audit.md");
    write_prompt(&root, "security_engineer/migrate/notes.txt");
    write_prompt(&root, "targets/rust/03_migrate.md");
    let orchestrator = Orchestrator::with_builtin_table(root);

    let steps = orchestrator.get_prompt_sequence("Security Engineer", "Migrate", "Rust");

    let files: Vec<&str> = steps.iter().map(|s| s.file.as_str()).collect();
    assert_eq!(files, vec!["01_audit.md", "02_harden.md", "03_migrate.md"]);
    assert_eq!(steps[0].kind, StepKind::Agent);
    assert_eq!(steps[2].kind, StepKind::Target);
}

#[test]
fn fallback_unmapped_capability_gets_no_target_steps() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    write_prompt(&root, "security_engineer/audit/01_scan.md");
    write_prompt(&root, "targets/rust/03_migrate.md");
    let orchestrator = Orchestrator::with_builtin_table(root);

    let steps = orchestrator.get_prompt_sequence("security_engineer", "audit", "rust");

    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].kind, StepKind::Agent);
}

#[test]
fn target_names_are_normalized_for_directory_lookup() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    write_prompt(&root, "code_engineer/refactor_nothing/01_only.md");
    // "C#/.NET" normalizes to "c#__net".
    write_prompt(&root, "targets/c#__net/03_migrate.md");
    let orchestrator = Orchestrator::with_builtin_table(root);

    let steps = orchestrator.get_prompt_sequence("code_engineer", "refactor nothing", "C#/.NET");
    // Fallback path: agent file found, but "refactor nothing" maps to no target file.
    assert_eq!(steps.len(), 1);

    let steps = orchestrator.get_prompt_sequence("other_agent", "migrate", "C#/.NET");
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].file, "03_migrate.md");
}

#[test]
fn validation_reports_found_and_missing_counts() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    write_prompt(&root, "code_architect/plan/01_analyze_project_structure.md");
    write_prompt(&root, "targets/rust/01_analyze.md");
    // 02_plan.md and 03_design_target_architecture.md are missing.
    let orchestrator = Orchestrator::with_builtin_table(root);

    let report =
        orchestrator.validate_orchestration("code_architect", "plan", &["rust".to_string()]);

    assert!(!report.valid);
    let rust = &report.targets["rust"];
    assert_eq!(rust.total_prompts, 4);
    assert_eq!(rust.found_prompts.len(), 2);
    assert_eq!(rust.missing_prompts.len(), 2);
}

#[test]
fn validation_passes_when_all_files_exist() {
    let (_dir, orchestrator) = plan_fixture();

    let report =
        orchestrator.validate_orchestration("code_architect", "plan", &["rust".to_string()]);

    assert!(report.valid);
    assert!(report.targets["rust"].missing_prompts.is_empty());
}

#[test]
fn orchestration_info_summarizes_table() {
    let orchestrator = Orchestrator::with_builtin_table("/nonexistent");

    let info = orchestrator.orchestration_info();

    let plan = &info["code_architect"]["plan"];
    assert_eq!(plan.steps, 4);
    assert_eq!(plan.sequence[0].kind, StepKind::Agent);
    assert_eq!(plan.sequence[0].count, 1);
    assert!(!plan.description.is_empty());
}
