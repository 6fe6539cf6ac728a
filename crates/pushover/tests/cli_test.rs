//! Integration tests for the `pushover` CLI binary.
//!
//! Argument parsing, completions and error exit codes run without any
//! network; the account commands run against a wiremock server.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `pushover` binary with env isolation.
///
/// Points home and config directories at `home` and clears every
/// `PUSHOVER_*` variable the binary reads.
fn pushover_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("pushover");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("PUSHOVER_CONFIG")
        .env_remove("PUSHOVER_CREDENTIALS")
        .env_remove("PUSHOVER_PASSWORD")
        .arg("--config")
        .arg(home.join("config.toml"));
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Write a credential file holding a complete session.
fn write_session(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("creds.json");
    let creds = json!({
        "email": "me@example.com",
        "password": "hunter2",
        "secret": "sekrit",
        "device_id": "dev-1"
    });
    std::fs::write(&path, creds.to_string()).unwrap();
    path
}

async fn mount_pending(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/1/messages.json"))
        .and(query_param("secret", "sekrit"))
        .and(query_param("device_id", "dev-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 1,
            "messages": [
                { "id": 12, "message": "second", "app": "Backups", "date": 1_700_000_100 },
                { "id": 11, "message": "hello", "title": "Greeting", "date": 1_700_000_000 }
            ]
        })))
        .mount(server)
        .await;
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = cargo_bin_cmd!("pushover")
        .env("HOME", dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    pushover_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("login")
            .and(predicate::str::contains("messages"))
            .and(predicate::str::contains("ack"))
            .and(predicate::str::contains("listen")),
    );
}

#[test]
fn test_version_flag() {
    let dir = tempfile::tempdir().unwrap();
    pushover_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pushover"));
}

#[test]
fn test_completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    pushover_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Errors ──────────────────────────────────────────────────────────

#[test]
fn test_messages_without_login_exits_with_auth_code() {
    let dir = tempfile::tempdir().unwrap();
    let output = pushover_cmd(dir.path())
        .arg("messages")
        .arg("--credentials")
        .arg(dir.path().join("missing.json"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let text = combined_output(&output);
    assert!(text.contains("pushover login"), "Expected login hint in:\n{text}");
}

#[test]
fn test_invalid_realtime_setting_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let creds = write_session(&dir);

    let output = pushover_cmd(dir.path())
        .env("PUSHOVER_REALTIME__IDLE_TIMEOUT_SECS", "0")
        .arg("listen")
        .arg("--credentials")
        .arg(&creds)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("idle_timeout_secs"));
}

// ── Account commands ────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_messages_json_lists_pending_in_order() {
    let server = MockServer::start().await;
    mount_pending(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let creds = write_session(&dir);

    let output = pushover_cmd(dir.path())
        .env("PUSHOVER_API__BASE_URL", format!("{}/1/", server.uri()))
        .args(["messages", "--json", "--credentials"])
        .arg(&creds)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let listed: Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<u64> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![11, 12]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_messages_table_shows_titles() {
    let server = MockServer::start().await;
    mount_pending(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let creds = write_session(&dir);

    pushover_cmd(dir.path())
        .env("PUSHOVER_API__BASE_URL", format!("{}/1/", server.uri()))
        .args(["messages", "--credentials"])
        .arg(&creds)
        .assert()
        .success()
        .stdout(predicate::str::contains("Greeting").and(predicate::str::contains("Backups")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ack_acknowledges_highest_id() {
    let server = MockServer::start().await;
    mount_pending(&server).await;
    Mock::given(method("POST"))
        .and(path("/1/devices/dev-1/update_highest_message.json"))
        .and(body_string_contains("message=12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": 1 })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let creds = write_session(&dir);

    pushover_cmd(dir.path())
        .env("PUSHOVER_API__BASE_URL", format!("{}/1/", server.uri()))
        .args(["ack", "--credentials"])
        .arg(&creds)
        .assert()
        .success()
        .stdout(predicate::str::contains("up to id 12"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_registers_and_saves_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/users/login.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": 1, "secret": "fresh-secret" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1/devices.json"))
        .and(body_string_contains("name=desk-1"))
        .and(body_string_contains("os=O"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": 1, "id": "dev-42" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let creds = dir.path().join("creds.json");

    pushover_cmd(dir.path())
        .env("PUSHOVER_API__BASE_URL", format!("{}/1/", server.uri()))
        .args([
            "login",
            "--email",
            "me@example.com",
            "--password",
            "hunter2",
            "--device-name",
            "desk-1",
            "--credentials",
        ])
        .arg(&creds)
        .assert()
        .success()
        .stdout(predicate::str::contains("dev-42"));

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&creds).unwrap()).unwrap();
    assert_eq!(saved["secret"], "fresh-secret");
    assert_eq!(saved["device_id"], "dev-42");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_reports_missing_twofa_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/users/login.json"))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({
            "status": 0,
            "errors": ["two-factor authentication code required"]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = pushover_cmd(dir.path())
        .env("PUSHOVER_API__BASE_URL", format!("{}/1/", server.uri()))
        .args([
            "login",
            "--email",
            "me@example.com",
            "--password",
            "hunter2",
            "--twofa",
            "000000",
            "--credentials",
        ])
        .arg(dir.path().join("creds.json"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("Two-factor"));
}
