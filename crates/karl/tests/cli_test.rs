//! Integration tests for the `karl` CLI binary.
//!
//! These tests cover argument parsing, config management, device listing
//! and the simulated bridge. Nothing here talks to a real appliance.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use pretty_assertions::assert_eq;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `karl` binary with env isolation.
///
/// Clears all `KARL_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn karl_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("karl");
    cmd.env("HOME", "/tmp/karl-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/karl-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("KARL_CONFIG")
        .env_remove("KARL_OUTPUT")
        .env_remove("KARL_RECONNECT_DELAY")
        .env_remove("KARL_LOCAL_KEY")
        .env_remove("KARL_TEST_OFFICE_KEY")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const TWO_DEVICES: &str = r#"
reconnect_delay = "1s"

[[devices]]
name = "Bedroom"
id = "bf01"
key = "0123456789abcdef"

[[devices]]
name = "Office"
id = "bf02"
key_env = "KARL_TEST_OFFICE_KEY"
"#;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

fn with_config(path: &Path) -> assert_cmd::Command {
    let mut cmd = karl_cmd();
    cmd.arg("--config").arg(path);
    cmd
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = karl_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    karl_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("Karl humidifiers")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("simulate"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    karl_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("karl"));
}

#[test]
fn test_invalid_subcommand() {
    karl_cmd().arg("defrost").assert().failure().code(2);
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    karl_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("karl"));
}

#[test]
fn test_completions_zsh() {
    karl_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    with_config(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_writes_starter_then_conflicts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    with_config(&path)
        .args(["config", "init", "--name", "Bedroom", "--id", "bf01"])
        .assert()
        .success();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("Bedroom"), "unexpected config:\n{written}");
    assert!(written.contains("KARL_LOCAL_KEY"), "unexpected config:\n{written}");

    let output = with_config(&path).args(["config", "init"]).output().unwrap();
    assert_eq!(output.status.code(), Some(6));
    assert!(combined_output(&output).contains("already exists"));

    with_config(&path)
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_config_show_redacts_plaintext_keys() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, TWO_DEVICES);

    with_config(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("****")
                .and(predicate::str::contains("0123456789abcdef").not())
                .and(predicate::str::contains("KARL_TEST_OFFICE_KEY")),
        );
}

#[test]
fn test_invalid_reconnect_delay_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "reconnect_delay = \"soon\"\n");

    let output = with_config(&path).args(["config", "show"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("reconnect_delay"));
}

// ── Devices ─────────────────────────────────────────────────────────

#[test]
fn test_devices_json_reports_key_sources() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, TWO_DEVICES);

    let output = with_config(&path)
        .env("KARL_TEST_OFFICE_KEY", "fedcba9876543210")
        .args(["devices", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["name"], "Bedroom");
    assert_eq!(listed[0]["key_source"], "config");
    assert_eq!(listed[1]["id"], "bf02");
    assert_eq!(listed[1]["key_source"], "env");
    assert_ne!(listed[0]["accessory_uuid"], listed[1]["accessory_uuid"]);
}

#[test]
fn test_devices_plain_lists_ids() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, TWO_DEVICES);

    with_config(&path)
        .args(["devices", "-o", "plain"])
        .assert()
        .success()
        .stdout("bf01\nbf02\n");
}

#[test]
fn test_config_defaults_choose_output_format() {
    let dir = TempDir::new().unwrap();
    let contents = format!("{TWO_DEVICES}\n[defaults]\noutput = \"plain\"\n");
    let path = write_config(&dir, &contents);

    with_config(&path)
        .arg("devices")
        .assert()
        .success()
        .stdout("bf01\nbf02\n");

    let output = with_config(&path)
        .args(["devices", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 2);
}

#[test]
fn test_unknown_default_output_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[defaults]\noutput = \"xml\"\n");

    let output = with_config(&path).arg("devices").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("defaults.output"));
}

// ── Simulate ────────────────────────────────────────────────────────

#[test]
fn test_simulate_demo_device_reports_initial_state() {
    let output = karl_cmd()
        .args(["simulate", "-o", "plain"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in [
        "Karl (demo) active-state=0",
        "Karl (demo) current-humidity=45",
        "Karl (demo) target-humidity=60",
        "Karl (demo) fan-speed=50",
        "Karl (demo) water-level=100",
        "Karl (demo) filter-life-level=80",
    ] {
        assert!(stdout.contains(line), "missing '{line}' in:\n{stdout}");
    }
    assert!(!stdout.contains("light-level"), "light is write-only:\n{stdout}");
}

#[test]
fn test_simulate_set_round_trips_through_device() {
    let output = karl_cmd()
        .args([
            "simulate",
            "-o",
            "plain",
            "--set",
            "fan-speed=100",
            "--set",
            "active-state=1",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("fan-speed=100"), "{stdout}");
    assert!(stdout.contains("active-state=1"), "{stdout}");
}

#[test]
fn test_simulate_replays_device_report() {
    let output = karl_cmd()
        .args([
            "simulate",
            "-o",
            "plain",
            "--report",
            r#"{"dps": {"14": 52, "22": 1, "33": 150}, "t": 1700000000}"#,
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Karl (demo) current-humidity=52"), "{stdout}");
    assert!(stdout.contains("Karl (demo) water-level=0"), "{stdout}");
    assert_eq!(stdout.matches("filter-life-level=").count(), 1, "{stdout}");
}

#[test]
fn test_simulate_malformed_report_is_usage_error() {
    let output = karl_cmd()
        .args(["simulate", "--report", "{not json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--report"));
}

#[test]
fn test_simulate_unmapped_value_is_usage_error() {
    let output = karl_cmd()
        .args(["simulate", "--set", "target-humidity=50"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("target-humidity"));
}

#[test]
fn test_simulate_rejects_read_only_property() {
    karl_cmd()
        .args(["simulate", "--set", "current-humidity=40"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_simulate_drop_link_reconnects() {
    let output = karl_cmd()
        .args([
            "simulate",
            "-o",
            "plain",
            "--drop-link",
            "--reconnect-delay",
            "50ms",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let refreshes = stdout
        .lines()
        .filter(|l| l.contains("active-state="))
        .count();
    assert!(refreshes >= 2, "expected a second refresh:\n{stdout}");
}

#[test]
fn test_simulate_unknown_device_is_not_found() {
    let output = karl_cmd()
        .args(["simulate", "--device", "garage"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("garage"));
}

#[test]
fn test_simulate_missing_key_is_auth_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, TWO_DEVICES);

    let output = with_config(&path)
        .args(["simulate", "--device", "Office"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}

#[test]
fn test_simulate_selected_device_json() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, TWO_DEVICES);

    let output = with_config(&path)
        .args(["simulate", "--device", "bf01", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let updates: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let updates = updates.as_array().unwrap();
    assert_eq!(updates.len(), 8);
    assert!(updates.iter().all(|u| u["device"] == "Bedroom"));
}
