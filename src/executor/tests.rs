#![cfg(unix)]

use super::*;
use crate::config::Config;
use crate::orchestrator::SequenceTable;
use crate::session::CredentialManager;
use crate::store::TaskLogStore;
use crate::test_support::write_stub_script;
use serial_test::serial;
use std::sync::mpsc;
use tempfile::TempDir;

const TABLE_YAML: &str = "\
builder:
  assemble:
    description: Assemble the build
    sequence:
      - type: agent
        prompts: [\"01_prepare.md\", \"02_build.md\", \"03_verify.md\"]
        purpose: Build steps
";

const SUCCESS_LINE: &str = r#"{"type": "result", "subtype": "success", "duration_ms": 2500, "total_cost_usd": 0.05, "num_turns": 3}"#;

struct Fixture {
    _dir: TempDir,
    config: Config,
    job: Job,
}

fn fixture(dir: TempDir, cli_body: &str, max_attempts: u32) -> Fixture {
    let prompts = dir.path().join("prompts").join("builder").join("assemble");
    std::fs::create_dir_all(&prompts).unwrap();
    for name in ["01_prepare.md", "02_build.md", "03_verify.md"] {
        std::fs::write(prompts.join(name), format!("{} for {{{{job_name}}}}", name)).unwrap();
    }

    let cli = write_stub_script(dir.path(), "agent", cli_body);

    let config = Config {
        data_root: dir.path().join("data").to_string_lossy().to_string(),
        prompts_dir: dir.path().join("prompts").to_string_lossy().to_string(),
        command_template: format!("{} -p {{prompt_file}}", cli.to_string_lossy()),
        credential_env: "PASSAGE_TEST_EXEC_CRED".to_string(),
        max_attempts,
        step_timeout_secs: 10,
        ..Config::default()
    };

    let job = Job {
        id: "job-exec".to_string(),
        name: "Exec Test".to_string(),
        source_name: "legacy-app".to_string(),
        target_name: Some("Rust".to_string()),
        stages: vec![crate::job::Stage {
            id: "build".to_string(),
            name: "Build".to_string(),
            tasks: vec![TaskSpec::new("Assemble", "Builder")],
            ..Default::default()
        }],
        ..Job::default()
    };

    Fixture {
        _dir: dir,
        config,
        job,
    }
}

fn executor_for(fixture: &Fixture) -> (Executor, ExecutionStore) {
    let table: SequenceTable = serde_yaml::from_str(TABLE_YAML).unwrap();
    let orchestrator = Orchestrator::new(&fixture.config.prompts_dir, table);
    let credentials = Arc::new(CredentialManager::new(&fixture.config));
    let session = Arc::new(SessionManager::new(fixture.config.clone(), credentials));
    let store = ExecutionStore::open(&fixture.config.data_root).unwrap();
    let executor = Executor::new(
        fixture.config.clone(),
        orchestrator,
        session,
        store.clone(),
        TaskLogStore::new(),
    );
    (executor, store)
}

fn set_cred() {
    unsafe { std::env::set_var("PASSAGE_TEST_EXEC_CRED", "secret") };
}

#[test]
#[serial]
fn successful_task_runs_every_step() {
    set_cred();
    let dir = TempDir::new().unwrap();
    let body = format!(
        "echo '{{\"type\": \"assistant\", \"message\": {{\"content\": [{{\"type\": \"text\", \"text\": \"done\"}}]}}}}'\necho '{}'",
        SUCCESS_LINE
    );
    let fixture = fixture(dir, &body, 3);
    let (executor, store) = executor_for(&fixture);

    let (tx, rx) = mpsc::sync_channel(1024);
    let record = executor.execute_task(&fixture.job, "build", 0, &tx).unwrap();
    drop(tx);

    assert_eq!(record.status, Status::Completed);
    assert_eq!(record.attempts, 1);
    assert_eq!(record.results.len(), 3);
    assert!(record.results.iter().all(|r| r.success));
    assert_eq!(record.results[0].turns, Some(3));

    // Durable artifacts.
    let paths = TaskPaths::resolve(
        Path::new(&fixture.config.data_root),
        "job-exec",
        "build",
        0,
        "Assemble",
    );
    assert!(paths.execution_summary().exists());
    let combined = std::fs::read_to_string(paths.combined_output()).unwrap();
    assert!(combined.contains("01_prepare.md"));
    assert!(combined.contains("done"));

    // Rendered prompts had the job context substituted.
    let rendered = std::fs::read_to_string(paths.data_dir.join("01_prepare.md")).unwrap();
    assert!(rendered.contains("Exec Test"));

    // Record landed in the store.
    assert!(store.get_details(&record.execution_id).is_some());

    // End-of-execution sentinel present.
    let events: Vec<_> = rx.iter().collect();
    assert_eq!(*events.last().unwrap(), crate::stream::StreamEvent::Completed);
}

#[test]
#[serial]
fn failing_step_stops_the_sequence() {
    set_cred();
    let dir = TempDir::new().unwrap();
    // The second prompt fails; the third must never run.
    let body = "case \"$2\" in\n\
                *02_build*) echo '{\"type\": \"result\", \"subtype\": \"error_max_turns\"}';;\n\
                *) echo '{\"type\": \"result\", \"subtype\": \"success\", \"duration_ms\": 100, \"total_cost_usd\": 0.01, \"num_turns\": 1}';;\n\
                esac";
    let fixture = fixture(dir, body, 1);
    let (executor, store) = executor_for(&fixture);

    let (tx, _rx) = mpsc::sync_channel(1024);
    let err = executor
        .execute_task(&fixture.job, "build", 0, &tx)
        .unwrap_err();
    assert!(matches!(err, PassageError::ExecutionError(_)));

    let record = &store.get_history(Some("job-exec"))[0];
    assert_eq!(record.status, Status::Failed);
    assert_eq!(record.results.len(), 2);
    assert!(record.results[0].success);
    assert!(!record.results[1].success);
    assert!(
        record.results[1]
            .error
            .as_deref()
            .unwrap()
            .contains("maximum turns")
    );
}

#[test]
#[serial]
fn empty_sequence_is_an_error_without_spawning() {
    set_cred();
    let dir = TempDir::new().unwrap();
    let mut fixture = fixture(dir, "exit 0", 3);
    // A pair with no declared sequence and no prompt files on disk; if the
    // executor tried to spawn anyway, the bogus binary would turn this into
    // a ProcessStartError.
    fixture.config.command_template = "no_such_binary_here -p {prompt_file}".to_string();
    fixture.job.stages[0].tasks[0] = TaskSpec::new("Discuss", "Security Engineer");
    let (executor, store) = executor_for(&fixture);

    let (tx, _rx) = mpsc::sync_channel(1024);
    let err = executor
        .execute_task(&fixture.job, "build", 0, &tx)
        .unwrap_err();
    assert!(matches!(err, PassageError::ResolutionError { .. }));

    let record = &store.get_history(None)[0];
    assert_eq!(record.status, Status::Failed);
    assert!(record.results.is_empty());
}

#[test]
#[serial]
fn missing_binary_fails_fast_without_retries() {
    set_cred();
    let dir = TempDir::new().unwrap();
    let mut fixture = fixture(dir, "exit 0", 3);
    fixture.config.command_template = "no_such_binary_here -p {prompt_file}".to_string();
    let (executor, store) = executor_for(&fixture);

    let (tx, _rx) = mpsc::sync_channel(1024);
    let err = executor
        .execute_task(&fixture.job, "build", 0, &tx)
        .unwrap_err();
    assert!(matches!(err, PassageError::ProcessStartError(_)));

    // One attempt only.
    assert_eq!(store.get_history(None)[0].attempts, 1);
}

#[test]
#[serial]
fn retry_recovers_on_second_attempt() {
    set_cred();
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("first_attempt_done");
    let body = format!(
        "if [ ! -f \"{marker}\" ]; then\n\
         touch \"{marker}\"\n\
         echo '{{\"type\": \"result\", \"subtype\": \"error_max_turns\"}}'\n\
         else\n\
         echo '{{\"type\": \"result\", \"subtype\": \"success\", \"duration_ms\": 100, \"total_cost_usd\": 0.01, \"num_turns\": 1}}'\n\
         fi",
        marker = marker.display()
    );
    let fixture = fixture(dir, &body, 3);
    let (executor, _store) = executor_for(&fixture);

    let (tx, _rx) = mpsc::sync_channel(4096);
    let record = executor.execute_task(&fixture.job, "build", 0, &tx).unwrap();

    assert_eq!(record.status, Status::Completed);
    assert_eq!(record.attempts, 2);
    assert_eq!(record.results.len(), 3);
}

#[test]
#[serial]
fn steps_run_inside_the_task_input_dir() {
    set_cred();
    let dir = TempDir::new().unwrap();
    // The stub drops a marker into its cwd; it must land in input/.
    let body = format!("touch step_ran_here\necho '{}'", SUCCESS_LINE);
    let fixture = fixture(dir, &body, 1);
    let (executor, _store) = executor_for(&fixture);

    let (tx, _rx) = mpsc::sync_channel(1024);
    executor.execute_task(&fixture.job, "build", 0, &tx).unwrap();

    let paths = TaskPaths::resolve(
        Path::new(&fixture.config.data_root),
        "job-exec",
        "build",
        0,
        "Assemble",
    );
    assert!(paths.input_dir.join("step_ran_here").exists());
}

#[test]
#[serial]
fn error_during_execution_is_surfaced_as_soft_success() {
    set_cred();
    let dir = TempDir::new().unwrap();
    let body = "echo '{\"type\": \"assistant\", \"message\": {\"content\": [{\"type\": \"text\", \"text\": \"partial work\"}]}}'\n\
                echo '{\"type\": \"result\", \"subtype\": \"error_during_execution\"}'";
    let fixture = fixture(dir, body, 1);
    let (executor, _store) = executor_for(&fixture);

    let (tx, _rx) = mpsc::sync_channel(1024);
    let record = executor.execute_task(&fixture.job, "build", 0, &tx).unwrap();

    assert_eq!(record.status, Status::Completed);
    assert!(record.results.iter().all(|r| r.success && r.soft_success));

    let paths = TaskPaths::resolve(
        Path::new(&fixture.config.data_root),
        "job-exec",
        "build",
        0,
        "Assemble",
    );
    let combined = std::fs::read_to_string(paths.combined_output()).unwrap();
    assert!(combined.contains("partial work"));
    assert!(combined.contains("output may be partial"));
}
