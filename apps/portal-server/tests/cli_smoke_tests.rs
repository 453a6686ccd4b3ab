//! CLI smoke tests for the portal-server binary: help and version output,
//! configuration checks and a short-lived `run`.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

fn run_portal_server(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_portal-server"))
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute portal-server")
}

async fn run_portal_server_with_timeout(
    args: &[&str],
    timeout_duration: Duration,
) -> Result<std::process::Output, Box<dyn std::error::Error>> {
    let mut cmd = tokio::process::Command::new(env!("CARGO_BIN_EXE_portal-server"));
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match timeout(timeout_duration, cmd.output()).await {
        Ok(result) => result.map_err(|e| e.into()),
        Err(elapsed) => Err(elapsed.into()),
    }
}

/// Writes a config whose home dir and logs stay inside `dir`.
fn write_config(dir: &Path, session_gate: &str) -> String {
    let home = dir.join("home");
    let config_path = dir.join("portal.yaml");
    let content = format!(
        r#"
server:
  home_dir: "{home}"
  host: "127.0.0.1"
  port: 0
  timeout_sec: 30

logging:
  default:
    console_level: info
    file: "logs/portal.log"
    file_level: debug

modules:
  session_gate:
{session_gate}
"#,
        home = home.display(),
    );
    std::fs::write(&config_path, content).expect("Failed to write config");
    config_path.to_string_lossy().to_string()
}

const VALID_GATE: &str = r#"    provider_url: "http://127.0.0.1:9"
    anon_key: "anon-test-key"
    redirect_url: "http://127.0.0.1:8087/auth/callback"
    app_url: "http://127.0.0.1:8087/"
    initial_credits: 5
    transition_delay: "1s"
    persist_session: false"#;

#[test]
fn test_cli_help_command() {
    let output = run_portal_server(&["--help"]);

    assert!(output.status.success(), "Help command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("portal-server"), "Should contain binary name");
    assert!(
        stdout.contains("Usage:") || stdout.contains("USAGE:"),
        "Should contain usage information"
    );
    assert!(stdout.contains("run"), "Should contain 'run' subcommand");
    assert!(stdout.contains("check"), "Should contain 'check' subcommand");
    assert!(stdout.contains("--config"), "Should mention config option");
}

#[test]
fn test_cli_version_command() {
    let output = run_portal_server(&["--version"]);

    assert!(output.status.success(), "Version command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("portal-server"), "Should contain binary name");
    assert!(stdout.contains("0.1.0"), "Should contain version");
}

#[test]
fn test_cli_invalid_command() {
    let output = run_portal_server(&["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("unrecognized"),
        "Should contain error message about invalid command"
    );
}

#[test]
fn test_cli_config_validation_missing_file() {
    let output = run_portal_server(&["--config", "/nonexistent/config.yaml", "check"]);

    assert!(!output.status.success(), "Should fail with missing config");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("config file not found"),
        "Should mention config file issue: {}",
        stderr
    );
}

#[test]
fn test_cli_config_validation_invalid_yaml() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("invalid.yaml");
    std::fs::write(&config_path, "invalid: yaml: content: [unclosed")
        .expect("Failed to write file");

    let output = run_portal_server(&["--config", config_path.to_str().unwrap(), "check"]);

    assert!(!output.status.success(), "Should fail with invalid YAML");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Failed to parse yaml config"),
        "Should mention YAML parsing issue: {}",
        stderr
    );
}

#[test]
fn test_cli_config_validation_valid_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), VALID_GATE);

    let output = run_portal_server(&["--config", &config_path, "check"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        output.status.success(),
        "Valid config should pass: {}",
        stderr
    );
    assert!(stdout.contains("Configuration check passed"));
    assert!(stdout.contains("portal.log"), "Should list the log file");
    assert!(stdout.contains("session_gate"), "Should echo module config");
}

#[test]
fn test_cli_check_rejects_missing_anon_key() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let gate = r#"    provider_url: "http://127.0.0.1:9""#;
    let config_path = write_config(temp_dir.path(), gate);

    let output = run_portal_server(&["--config", &config_path, "check"]);

    assert!(!output.status.success(), "Missing anon_key should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("anon_key"),
        "Should name the missing field: {}",
        stderr
    );
}

#[test]
fn test_cli_check_rejects_unknown_module_key() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let gate = format!("{VALID_GATE}\n    colour: \"blue\"");
    let config_path = write_config(temp_dir.path(), &gate);

    let output = run_portal_server(&["--config", &config_path, "check"]);

    assert!(!output.status.success(), "Unknown key should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid session_gate config"),
        "Should name the module: {}",
        stderr
    );
}

#[test]
fn test_cli_print_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), VALID_GATE);

    let output = run_portal_server(&["--config", &config_path, "--print-config"]);

    assert!(output.status.success(), "print-config should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("anon-test-key"));
    assert!(!stdout.contains("Configuration check passed"));
}

#[test]
fn test_cli_subcommand_help() {
    let output = run_portal_server(&["check", "--help"]);

    assert!(output.status.success(), "Subcommand help should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Check configuration"));
}

#[tokio::test]
async fn test_cli_run_command_serves_until_stopped() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), VALID_GATE);

    let result =
        run_portal_server_with_timeout(&["--config", &config_path, "run"], Duration::from_secs(3))
            .await;

    match result {
        Err(e) => assert!(
            e.to_string().contains("deadline has elapsed"),
            "Server should keep running until killed: {e}"
        ),
        Ok(output) => panic!(
            "Server exited early: {}",
            String::from_utf8_lossy(&output.stderr)
        ),
    }
}

#[tokio::test]
async fn test_cli_run_fails_on_invalid_module_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let gate = r#"    provider_url: "not a url"
    anon_key: "anon-test-key""#;
    let config_path = write_config(temp_dir.path(), gate);

    let output =
        run_portal_server_with_timeout(&["--config", &config_path, "run"], Duration::from_secs(10))
            .await
            .expect("Server should exit on its own");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("provider_url"),
        "Should name the bad field: {}",
        stderr
    );
}
