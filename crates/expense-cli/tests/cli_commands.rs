// crates/expense-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests for config and store commands.
// Purpose: Ensure commands report success and fail closed on bad input.
// Dependencies: expense-tracker binary
// ============================================================================

//! ## Overview
//! Runs the `expense-tracker` binary against temporary config files and
//! `SQLite` stores.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use expense_config::ExpenseTrackerConfig;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn expense_tracker_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_expense-tracker"))
}

fn run(args: &[&str]) -> Output {
    Command::new(expense_tracker_bin())
        .args(args)
        .env_remove("EXPENSE_TRACKER_CONFIG")
        .output()
        .expect("run expense-tracker")
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("expense-tracker.toml");
    fs::write(&path, body.trim()).expect("write config");
    path
}

fn sqlite_config(dir: &TempDir) -> PathBuf {
    let db = dir.path().join("data").join("expenses.db");
    write_config(
        dir,
        &format!(
            r#"
[store]
type = "sqlite"
path = "{}"
journal_mode = "delete"
"#,
            db.display()
        ),
    )
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Verifies `--version` prints the binary name and crate version.
#[test]
fn version_flag_prints_version() {
    let output = run(&["--version"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), format!("expense-tracker {}", env!("CARGO_PKG_VERSION")));
}

/// Verifies config validation succeeds for a loopback bind.
#[test]
fn config_validate_accepts_valid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[server]\nbind = \"127.0.0.1:0\"\n");
    let output = run(&["config", "validate", "--config", &path_arg(&path)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Config valid"));
}

/// Verifies config validation fails closed on non-loopback binds.
#[test]
fn config_validate_rejects_non_loopback_without_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[server]\nbind = \"0.0.0.0:8080\"\n");
    let output = run(&["config", "validate", "--config", &path_arg(&path)]);
    assert!(!output.status.success());
    let stderr = stderr(&output);
    assert!(stderr.contains("Failed to load config"), "unexpected stderr: {stderr}");
    assert!(stderr.contains("allow_non_loopback"), "unexpected stderr: {stderr}");
}

/// Verifies a missing config file is an error.
#[test]
fn config_validate_rejects_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let output = run(&["config", "validate", "--config", &path_arg(&path)]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("config io error"));
}

/// Verifies the printed example is itself a valid configuration.
#[test]
fn config_example_round_trips_through_validation() {
    let output = run(&["config", "example"]);
    assert!(output.status.success());
    let text = stdout(&output);
    let config = ExpenseTrackerConfig::from_toml_str(&text).expect("example validates");
    assert!(!config.chat.enabled);
}

/// Verifies store init creates the database and seeds demo data once.
#[test]
fn store_init_creates_and_seeds_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = sqlite_config(&dir);

    let first = run(&["store", "init", "--with-demo-data", "--config", &path_arg(&path)]);
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    let out = stdout(&first);
    assert!(out.contains("Store initialized at"));
    assert!(out.contains("Inserted 4 demo expenses."));
    assert!(dir.path().join("data").join("expenses.db").is_file());

    let second = run(&["store", "init", "--with-demo-data", "--config", &path_arg(&path)]);
    assert!(second.status.success());
    assert!(stdout(&second).contains("demo data not inserted"));
}

/// Verifies store init refuses the in-memory backend.
#[test]
fn store_init_requires_sqlite_backend() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[store]\ntype = \"memory\"\n");
    let output = run(&["store", "init", "--config", &path_arg(&path)]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("store.type = \"sqlite\""));
}

/// Verifies `serve` fails closed before binding when config is invalid.
#[test]
fn serve_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[store]\ntype = \"sqlite\"\n");
    let output = run(&["serve", "--config", &path_arg(&path)]);
    assert!(!output.status.success());
    let stderr = stderr(&output);
    assert!(stderr.contains("sqlite store requires path"), "unexpected stderr: {stderr}");
}
