//! Corruption recovery tests for liftgraph.
//!
//! These tests verify the system can handle:
//! - Corrupted cache lines
//! - Corrupted input files
//! - Corrupted references inside templates
//! - Missing files
//! - Partial writes

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use tempfile::TempDir;

const ALICE: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";

fn cli(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("liftgraph"));
    cmd.env("XDG_CONFIG_HOME", temp_dir.path().join("config"))
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(temp_dir.path().join("data"));
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn exercise_line(d: &str) -> String {
    serde_json::json!({
        "id": format!("ex-{}", d),
        "kind": 33401,
        "authority": ALICE,
        "created_at": 1_700_000_000,
        "tags": [
            ["d", d],
            ["title", "Deadlift"],
            ["format", "weight", "reps"],
            ["format_units", "kg", "count"],
            ["equipment", "barbell"]
        ],
        "content": ""
    })
    .to_string()
}

fn cache_path(temp_dir: &TempDir) -> std::path::PathBuf {
    temp_dir.path().join("data/cache/records.jsonl")
}

#[test]
fn test_corrupted_cache_lines_ignored_during_read() {
    let temp_dir = setup_test_dir();
    let cache = cache_path(&temp_dir);
    fs::create_dir_all(cache.parent().unwrap()).unwrap();
    fs::write(
        &cache,
        format!("{{ invalid json }}\n{}\n{{ more invalid }}\n", exercise_line("deadlift")),
    )
    .expect("Failed to write corrupted cache");

    cli(&temp_dir)
        .arg("--strategy")
        .arg("cache-only")
        .arg("exercises")
        .arg(format!("33401:{}:deadlift", ALICE))
        .assert()
        .success()
        .stdout(predicate::str::contains("Deadlift"));
}

#[test]
fn test_partial_write_at_end_of_cache() {
    let temp_dir = setup_test_dir();
    let cache = cache_path(&temp_dir);
    fs::create_dir_all(cache.parent().unwrap()).unwrap();

    let mut file = fs::File::create(&cache).unwrap();
    writeln!(file, "{}", exercise_line("deadlift")).unwrap();
    // Simulate a crash mid-append
    write!(file, "{{\"id\":\"ex-row\",\"kind\":33401,\"auth").unwrap();
    drop(file);

    cli(&temp_dir)
        .arg("probe")
        .arg(format!("33401:{}:deadlift", ALICE))
        .assert()
        .success()
        .stdout(predicate::str::contains("cached"));

    // Compaction rewrites the store without the torn line
    cli(&temp_dir).arg("compact").assert().success();
    let content = fs::read_to_string(&cache).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains("ex-deadlift"));
}

#[test]
fn test_import_skips_corrupted_input_lines() {
    let temp_dir = setup_test_dir();
    let input = temp_dir.path().join("input.jsonl");
    fs::write(
        &input,
        format!("not json at all\n{}\n\n", exercise_line("deadlift")),
    )
    .unwrap();

    cli(&temp_dir)
        .arg("import")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 records (0 rejected)"));
}

#[test]
fn test_template_with_corrupted_entry_reports_it() {
    let temp_dir = setup_test_dir();
    let template = serde_json::json!({
        "id": "tpl-pull",
        "kind": 33402,
        "authority": ALICE,
        "created_at": 1_700_000_000,
        "tags": [
            ["d", "pull"],
            ["title", "Pull Day"],
            ["type", "strength"],
            ["exercise", format!("33401:{}:deadlift", ALICE), "140", "5"],
            ["exercise", format!("33401:{}:row,80,8", ALICE), "80", "8"]
        ],
        "content": ""
    });
    let input = temp_dir.path().join("input.jsonl");
    fs::write(&input, format!("{}\n{}\n", exercise_line("deadlift"), template)).unwrap();
    cli(&temp_dir).arg("import").arg(&input).assert().success();

    cli(&temp_dir)
        .arg("template")
        .arg(format!("33402:{}:pull", ALICE))
        .assert()
        .success()
        .stdout(predicate::str::contains("Deadlift × 1 sets"))
        .stdout(predicate::str::contains("Skipped references:"))
        .stdout(predicate::str::contains("row,80,8"))
        .stdout(predicate::str::contains("[corrupted]"));
}

#[test]
fn test_missing_input_file() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir)
        .arg("validate")
        .arg(temp_dir.path().join("nope.jsonl"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_missing_cache_is_empty_not_error() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir)
        .arg("--strategy")
        .arg("cache-only")
        .arg("exercises")
        .arg(format!("33401:{}:deadlift", ALICE))
        .assert()
        .success()
        .stdout(predicate::str::contains("No exercises found."));
}

#[test]
fn test_corrupted_config_file_is_reported() {
    let temp_dir = setup_test_dir();
    let config_dir = temp_dir.path().join("config/liftgraph");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[fetch\nstrategy = ").unwrap();

    cli(&temp_dir)
        .arg("compact")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Toml"));
}
