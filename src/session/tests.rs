use super::*;
use crate::config::Config;
use crate::error::PassageError;
use crate::test_support::{stub_cli, write_stub_script};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> Config {
    Config {
        data_root: dir.path().to_string_lossy().to_string(),
        ..Config::default()
    }
}

fn set_env(key: &str, value: &str) {
    // Safe enough under #[serial]: no other thread touches the environment.
    unsafe { std::env::set_var(key, value) };
}

fn remove_env(key: &str) {
    unsafe { std::env::remove_var(key) };
}

#[test]
#[serial]
fn credential_resolution_prefers_env_var() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("credential");
    std::fs::write(&file, "from-file\n").unwrap();

    let mut config = config_in(&dir);
    config.credential_env = "PASSAGE_TEST_CRED_A".to_string();
    config.credential_file = Some(file.to_string_lossy().to_string());

    set_env("PASSAGE_TEST_CRED_A", "from-env");
    let manager = CredentialManager::new(&config);
    assert_eq!(manager.current().unwrap(), "from-env");
    remove_env("PASSAGE_TEST_CRED_A");
}

#[test]
#[serial]
fn credential_resolution_falls_back_to_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("credential");
    std::fs::write(&file, "from-file\n").unwrap();

    let mut config = config_in(&dir);
    config.credential_env = "PASSAGE_TEST_CRED_B".to_string();
    config.credential_file = Some(file.to_string_lossy().to_string());

    remove_env("PASSAGE_TEST_CRED_B");
    let manager = CredentialManager::new(&config);
    assert_eq!(manager.current().unwrap(), "from-file");
}

#[test]
#[serial]
fn credential_resolution_uses_provider_last() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.credential_env = "PASSAGE_TEST_CRED_C".to_string();

    remove_env("PASSAGE_TEST_CRED_C");
    let manager = CredentialManager::new(&config)
        .with_provider(Box::new(|| Ok("from-provider".to_string())));
    assert_eq!(manager.current().unwrap(), "from-provider");
}

#[test]
#[serial]
fn missing_credential_is_a_typed_auth_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.credential_env = "PASSAGE_TEST_CRED_D".to_string();

    remove_env("PASSAGE_TEST_CRED_D");
    let manager = CredentialManager::new(&config);
    match manager.current() {
        Err(PassageError::AuthError(msg)) => assert!(msg.contains("PASSAGE_TEST_CRED_D")),
        other => panic!("expected AuthError, got {:?}", other),
    }
}

#[cfg(unix)]
#[test]
#[serial]
fn refresh_writes_executable_helper_script() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.credential_env = "PASSAGE_TEST_CRED_E".to_string();

    set_env("PASSAGE_TEST_CRED_E", "secret-value");
    let manager = CredentialManager::new(&config);
    manager.refresh().unwrap();
    remove_env("PASSAGE_TEST_CRED_E");

    let helper = manager.helper_path();
    assert!(helper.exists());
    let mode = std::fs::metadata(helper).unwrap().permissions().mode();
    assert_eq!(mode & 0o755, 0o755);

    // The script must reference the env var, never embed the secret.
    let body = std::fs::read_to_string(helper).unwrap();
    assert!(body.contains("PASSAGE_TEST_CRED_E"));
    assert!(!body.contains("secret-value"));

    assert!(manager.last_refresh().is_some());
}

#[test]
#[serial]
fn refresh_daemon_stops_cleanly() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.credential_env = "PASSAGE_TEST_CRED_F".to_string();

    set_env("PASSAGE_TEST_CRED_F", "secret");
    let manager = Arc::new(CredentialManager::new(&config));
    let daemon =
        manager.spawn_refresh_daemon(Duration::from_secs(60), Duration::from_secs(1));

    // Give the first refresh a moment to land.
    std::thread::sleep(Duration::from_millis(300));
    assert!(manager.last_refresh().is_some());

    daemon.stop();
    remove_env("PASSAGE_TEST_CRED_F");
}

#[test]
#[serial]
fn auth_error_detection_ignores_unrelated_text() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.credential_env = "PASSAGE_TEST_CRED_G".to_string();

    remove_env("PASSAGE_TEST_CRED_G");
    let credentials = Arc::new(CredentialManager::new(&config));
    let session = SessionManager::new(config, credentials.clone());

    // Not auth vocabulary: no refresh side effect.
    assert!(!session.handle_auth_error("compile error in module foo"));
    assert!(credentials.last_refresh().is_none());
}

#[cfg(unix)]
#[test]
#[serial]
fn auth_error_recovery_refreshes_and_probes() {
    let dir = TempDir::new().unwrap();
    let probe = stub_cli(
        dir.path(),
        "probe",
        &[r#"{"type": "result", "subtype": "success"}"#],
    );

    let mut config = config_in(&dir);
    config.credential_env = "PASSAGE_TEST_CRED_H".to_string();
    config.probe_template = probe.to_string_lossy().to_string();

    set_env("PASSAGE_TEST_CRED_H", "secret");
    let credentials = Arc::new(CredentialManager::new(&config));
    let session = SessionManager::new(config, credentials.clone());

    assert!(session.handle_auth_error("HTTP 401 Unauthorized"));
    assert!(credentials.last_refresh().is_some());
    remove_env("PASSAGE_TEST_CRED_H");
}

#[cfg(unix)]
#[test]
#[serial]
fn auth_recovery_fails_when_probe_reports_nothing() {
    let dir = TempDir::new().unwrap();
    let probe = write_stub_script(dir.path(), "probe", "echo not-json");

    let mut config = config_in(&dir);
    config.credential_env = "PASSAGE_TEST_CRED_I".to_string();
    config.probe_template = probe.to_string_lossy().to_string();

    set_env("PASSAGE_TEST_CRED_I", "secret");
    let credentials = Arc::new(CredentialManager::new(&config));
    let session = SessionManager::new(config, credentials);

    assert!(!session.handle_auth_error("token expired"));
    remove_env("PASSAGE_TEST_CRED_I");
}

#[cfg(unix)]
#[test]
#[serial]
fn start_process_spawns_with_piped_output() {
    let dir = TempDir::new().unwrap();
    let cli = stub_cli(dir.path(), "agent", &[r#"{"type": "result", "subtype": "success"}"#]);
    let prompt = dir.path().join("prompt.md");
    std::fs::write(&prompt, "do the thing").unwrap();

    let mut config = config_in(&dir);
    config.credential_env = "PASSAGE_TEST_CRED_J".to_string();
    config.command_template = format!("{} -p {{prompt_file}}", cli.to_string_lossy());

    set_env("PASSAGE_TEST_CRED_J", "secret");
    let credentials = Arc::new(CredentialManager::new(&config));
    let session = SessionManager::new(config, credentials);

    let mut child = session.start_process(&prompt, dir.path()).unwrap();
    assert!(child.stdout.is_some());
    assert!(child.stderr.is_some());
    let status = child.wait().unwrap();
    assert!(status.success());
    remove_env("PASSAGE_TEST_CRED_J");
}

#[cfg(unix)]
#[test]
#[serial]
fn command_template_placeholders_reach_the_process() {
    use std::io::Read;

    let dir = TempDir::new().unwrap();
    let cli = write_stub_script(dir.path(), "agent", "echo \"$@\"");
    let prompt = dir.path().join("rendered_prompt.md");
    std::fs::write(&prompt, "do the thing").unwrap();

    let mut config = config_in(&dir);
    config.credential_env = "PASSAGE_TEST_CRED_L".to_string();
    config.command_template = format!(
        "{} -p {{prompt_file}} --allowedTools {{allowed_tools}}",
        cli.to_string_lossy()
    );
    config.allowed_tools = "Read,Write".to_string();

    set_env("PASSAGE_TEST_CRED_L", "secret");
    let credentials = Arc::new(CredentialManager::new(&config));
    let session = SessionManager::new(config, credentials);

    let mut child = session.start_process(&prompt, dir.path()).unwrap();
    child.wait().unwrap();
    let mut argv = String::new();
    child.stdout.take().unwrap().read_to_string(&mut argv).unwrap();

    // The actual path and tool list, never the literal placeholder text.
    assert!(argv.contains("rendered_prompt.md"), "argv was: {argv}");
    assert!(argv.contains("Read,Write"));
    assert!(!argv.contains("{prompt_file}"));
    assert!(!argv.contains("{allowed_tools}"));
    remove_env("PASSAGE_TEST_CRED_L");
}

#[cfg(unix)]
#[test]
#[serial]
fn processes_run_in_the_given_working_dir() {
    use std::io::Read;

    let dir = TempDir::new().unwrap();
    let cli = write_stub_script(dir.path(), "agent", "pwd");
    let workspace = dir.path().join("task_input");
    std::fs::create_dir_all(&workspace).unwrap();
    let prompt = dir.path().join("prompt.md");
    std::fs::write(&prompt, "do the thing").unwrap();

    let mut config = config_in(&dir);
    config.credential_env = "PASSAGE_TEST_CRED_M".to_string();
    config.command_template = format!("{} -p {{prompt_file}}", cli.to_string_lossy());

    set_env("PASSAGE_TEST_CRED_M", "secret");
    let credentials = Arc::new(CredentialManager::new(&config));
    let session = SessionManager::new(config, credentials);

    let mut child = session.start_process(&prompt, &workspace).unwrap();
    child.wait().unwrap();
    let mut out = String::new();
    child.stdout.take().unwrap().read_to_string(&mut out).unwrap();

    // Canonicalize both sides; temp dirs may sit behind symlinks.
    let reported = std::fs::canonicalize(out.trim()).unwrap();
    assert_eq!(reported, std::fs::canonicalize(&workspace).unwrap());
    remove_env("PASSAGE_TEST_CRED_M");
}

#[test]
#[serial]
fn missing_binary_is_a_process_start_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.credential_env = "PASSAGE_TEST_CRED_K".to_string();
    config.command_template = "definitely_not_a_real_binary_xyz -p {prompt_file}".to_string();

    set_env("PASSAGE_TEST_CRED_K", "secret");
    let credentials = Arc::new(CredentialManager::new(&config));
    let session = SessionManager::new(config, credentials);

    match session.start_process(std::path::Path::new("prompt.md"), dir.path()) {
        Err(PassageError::ProcessStartError(msg)) => assert!(msg.contains("not found")),
        other => panic!("expected ProcessStartError, got {:?}", other),
    }
    remove_env("PASSAGE_TEST_CRED_K");
}
