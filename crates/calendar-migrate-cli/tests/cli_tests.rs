//! CLI integration tests for calendar-migrate.
//!
//! These tests verify command-line argument parsing, help output, exit
//! codes for error conditions, and a small end-to-end job against SQLite
//! files.

use assert_cmd::Command;
use calendar_migrate::orchestrator::pools::{connect_sqlite, table_exists};
use calendar_migrate::source::create_foreign_tables;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;

/// Get a command for the calendar-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("calendar-migrate").unwrap()
}

/// Create a foreign database with three events and one ticket on event 2.
fn seed_foreign_db(path: &Path) {
    let url = format!("sqlite://{}", path.display());
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let pool = connect_sqlite(&url, 1, true, "seeding").await.unwrap();
        create_foreign_tables(&pool, "legacy_").await.unwrap();
        for sql in [
            "INSERT INTO legacy_events (event_id, title, start_date, end_date) VALUES
             (1, 'Opening night', '2024-03-01 19:00:00', '2024-03-01 22:00:00'),
             (2, 'Workshop', '2024-03-02 10:00:00', '2024-03-02 12:00:00'),
             (3, 'Closing party', '2024-03-03 20:00:00', '2024-03-03 23:00:00')",
            "INSERT INTO legacy_tickets (ticket_id, event_id, name, price, capacity)
             VALUES (1, 2, 'Workshop seat', 25.0, -1)",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        pool.close().await;
    });
}

/// Whether `table` exists in the SQLite file at `path`.
fn has_table(path: &Path, table: &str) -> bool {
    let url = format!("sqlite://{}", path.display());
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let pool = connect_sqlite(&url, 1, false, "inspecting").await.unwrap();
        let exists = table_exists(&pool, table).await.unwrap();
        pool.close().await;
        exists
    })
}

fn write_config(dir: &Path, source: &Path) -> std::path::PathBuf {
    let config_path = dir.join("config.yaml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  url: \"sqlite://{}\"", source.display()).unwrap();
    writeln!(file, "target:").unwrap();
    writeln!(file, "  url: \"sqlite://{}\"", dir.join("native.db").display()).unwrap();
    writeln!(file, "migration:").unwrap();
    writeln!(file, "  job_id: cli-test").unwrap();
    config_path
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("step"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_step_subcommand_help() {
    cmd()
        .args(["step", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--totals"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--batch-size"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("calendar-migrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--progress"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_same_source_and_target_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  url: sqlite://same.db").unwrap();
    writeln!(file, "target:").unwrap();
    writeln!(file, "  url: sqlite://same.db").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "status"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_source_database_exits_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &dir.path().join("absent.db"));

    cmd()
        .args(["--config", config.to_str().unwrap(), "step"])
        .assert()
        .code(2);
}

// =============================================================================
// End-to-end
// =============================================================================

#[test]
fn test_two_steps_complete_small_job() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("legacy.db");
    seed_foreign_db(&source);
    let config = write_config(dir.path(), &source);
    let config = config.to_str().unwrap();

    cmd()
        .args(["--config", config, "step"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Phase: events"))
        .stdout(predicate::str::contains("Processed this batch: 3"))
        .stdout(predicate::str::contains("Status: in progress"));

    cmd()
        .args(["--config", config, "step"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Phase: complete"))
        .stdout(predicate::str::contains("Processed this batch: 1"));

    cmd()
        .args(["--config", config, "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: complete"));
}

#[test]
fn test_run_outputs_json_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("legacy.db");
    seed_foreign_db(&source);
    let config = write_config(dir.path(), &source);

    let output = cmd()
        .args(["--config", config.to_str().unwrap(), "--output-json", "run"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let snapshot: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(snapshot["status"], "complete");
    assert_eq!(snapshot["phase"], "complete");
    assert_eq!(snapshot["job_id"], "cli-test");
}

#[test]
fn test_health_check_reports_healthy() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("legacy.db");
    seed_foreign_db(&source);
    let config = write_config(dir.path(), &source);

    cmd()
        .args(["--config", config.to_str().unwrap(), "health-check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("HEALTHY"));
}

#[test]
fn test_step_reports_supplied_totals() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("legacy.db");
    seed_foreign_db(&source);
    let config = write_config(dir.path(), &source);

    cmd()
        .args(["--config", config.to_str().unwrap(), "step", "--totals", "events=42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total events: 42"))
        .stdout(predicate::str::contains("Processed this batch: 3"));
}

#[test]
fn test_step_rejects_unknown_totals_key() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("legacy.db");
    seed_foreign_db(&source);
    let config = write_config(dir.path(), &source);

    cmd()
        .args(["--config", config.to_str().unwrap(), "step", "--totals", "venues=2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown record type"));
}

#[test]
fn test_status_and_health_check_create_no_tables() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("legacy.db");
    seed_foreign_db(&source);
    let config = write_config(dir.path(), &source);
    let config = config.to_str().unwrap();

    cmd()
        .args(["--config", config, "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: not started"))
        .stdout(predicate::str::contains("events: 3"));

    cmd()
        .args(["--config", config, "health-check"])
        .assert()
        .success();

    let target = dir.path().join("native.db");
    assert!(!has_table(&target, "events"));
    assert!(!has_table(&target, "_calmig_job_status"));
    assert!(!has_table(&source, "_calmig_map_events"));
}
