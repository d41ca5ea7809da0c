//! 命令行接口测试
//!
//! Runs the built binary in an isolated working directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use std::net::TcpListener;
use tempfile::TempDir;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn kvctl(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kvctl").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env("API_PORT", free_port().to_string())
        .env("API_HOST", "0.0.0.0")
        .env("WEAVIATE_URL", "http://127.0.0.1:9")
        .env("KVCTL_PROBE_TIMEOUT_MS", "200");
    cmd
}

#[test]
#[serial]
fn status_reports_stopped_and_exits_zero() {
    let dir = TempDir::new().unwrap();
    kvctl(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("stopped"));
}

#[test]
#[serial]
fn status_json_is_machine_readable() {
    let dir = TempDir::new().unwrap();
    let output = kvctl(&dir).args(["status", "--json"]).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["status"]["state"], "stopped");
    assert_eq!(value["status"]["dependency_state"], "stopped");
    assert!(value["urls"]["ui"].as_str().unwrap().ends_with("/ui/"));
}

#[test]
#[serial]
fn urls_use_https_when_ssl_enabled() {
    let dir = TempDir::new().unwrap();
    kvctl(&dir)
        .env("ENABLE_SSL", "true")
        .arg("urls")
        .assert()
        .success()
        .stdout(predicate::str::contains("https://localhost:"))
        .stdout(predicate::str::contains("/docs"));
}

#[test]
#[serial]
fn stop_with_nothing_running_succeeds() {
    let dir = TempDir::new().unwrap();
    kvctl(&dir)
        .args(["stop", "--keep-deps"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not running"));
    assert!(!dir.path().join("logs/app.pid").exists());
}

#[test]
#[serial]
fn logs_without_log_file_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    kvctl(&dir)
        .args(["logs", "-n", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No log file yet"));
}

#[test]
#[serial]
fn logs_prints_the_tail() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("logs")).unwrap();
    let body: String = (1..=10).map(|i| format!("entry {i}\n")).collect();
    std::fs::write(dir.path().join("logs/app.log"), body).unwrap();

    kvctl(&dir)
        .args(["logs", "-n", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("entry 9\nentry 10\n"))
        .stdout(predicate::str::contains("entry 8").not());
}

#[test]
fn unknown_subcommand_fails_with_usage() {
    let dir = TempDir::new().unwrap();
    kvctl(&dir)
        .arg("launch")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
#[serial]
fn status_survives_invalid_configuration() {
    let dir = TempDir::new().unwrap();
    kvctl(&dir)
        .env("API_PORT", "abc")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("KoalaqVision status"))
        .stderr(predicate::str::contains("using default settings"))
        .stderr(predicate::str::contains("api_port"));
}

#[test]
#[serial]
fn status_json_stays_parseable_with_invalid_configuration() {
    let dir = TempDir::new().unwrap();
    let output = kvctl(&dir)
        .env("APP_MODE", "video")
        .args(["status", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["status"]["listen_port"], 10770);
    assert!(String::from_utf8_lossy(&output.stderr).contains("APP_MODE"));
}

#[test]
fn urls_survive_invalid_configuration() {
    let dir = TempDir::new().unwrap();
    kvctl(&dir)
        .env("API_PORT", "abc")
        .arg("urls")
        .assert()
        .success()
        .stdout(predicate::str::contains(":10770/ui/"))
        .stderr(predicate::str::contains("using default settings"));
}

#[test]
fn invalid_configuration_blocks_state_changes() {
    let dir = TempDir::new().unwrap();
    kvctl(&dir)
        .env("APP_MODE", "video")
        .args(["stop", "--keep-deps"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("APP_MODE"));
}

#[test]
#[serial]
fn failed_restart_still_reports_the_stop() {
    let dir = TempDir::new().unwrap();
    kvctl(&dir)
        .env("KVCTL_APP_COMMAND", "kvctl-missing-binary --serve")
        .arg("restart")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Service was not running"))
        .stderr(predicate::str::contains("kvctl-missing-binary"));
}

#[test]
#[serial]
fn supervisor_log_mirrors_diagnostics_to_a_file() {
    let dir = TempDir::new().unwrap();
    kvctl(&dir)
        .env("KVCTL_SUPERVISOR_LOG", "diag/kvctl.log")
        .args(["-v", "status"])
        .assert()
        .success();

    let log = std::fs::read_to_string(dir.path().join("diag/kvctl.log")).unwrap();
    assert!(log.contains("Logger initialized"), "{log}");
}

#[test]
fn missing_subcommand_without_terminal_is_rejected() {
    let dir = TempDir::new().unwrap();
    kvctl(&dir)
        .write_stdin("")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("interactive menu"));
}
