//! Tests for the query command's stdout contract and exit status.
//!
//! Each case fails before the embedding model is needed, so the binary runs
//! offline.

use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Run intent-rag with `dir` as the working directory.
fn run_in(dir: &Path, args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_intent-rag"));
    cmd.current_dir(dir).args(args);
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output().expect("Failed to run intent-rag")
}

fn stdout_json(output: &Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1, "Expected exactly one line, got: {stdout}");
    serde_json::from_str(lines[0]).expect("Invalid JSON")
}

/// Binary index header plus `rows` rows of a 2-dimensional index.
fn index_bytes(rows: u32) -> Vec<u8> {
    let mut bytes = b"IFLT".to_vec();
    for value in [1u32, 2, rows] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    for i in 0..rows * 2 {
        bytes.extend_from_slice(&(i as f32).to_le_bytes());
    }
    bytes
}

fn write_artifacts(dir: &Path, index: &[u8], metadata: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("mental_health.index"), index).unwrap();
    std::fs::write(dir.join("metadata.json"), metadata).unwrap();
}

#[test]
fn test_missing_index_is_soft_and_exits_zero() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_in(temp_dir.path(), &["query", "I feel anxious"], &[]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "{\"error\":\"Index not found\",\"matches\":[]}\n"
    );
}

#[test]
fn test_missing_index_in_context_format_still_reports_json() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_in(
        temp_dir.path(),
        &["query", "hello", "--format", "context"],
        &[],
    );

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_json(&output)["error"], "Index not found");
}

#[test]
fn test_missing_argument_prints_usage() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_in(temp_dir.path(), &["query"], &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn test_corrupt_index_is_hard_failure() {
    let temp_dir = TempDir::new().unwrap();
    write_artifacts(
        &temp_dir.path().join("data/vector_store"),
        b"not an index",
        "[]",
    );

    let output = run_in(temp_dir.path(), &["query", "hello"], &[]);
    assert_eq!(output.status.code(), Some(7));

    let response = stdout_json(&output);
    assert!(response["error"].as_str().unwrap().contains("Corrupted"));
    assert_eq!(response["matches"], Value::Array(vec![]));
}

#[test]
fn test_misaligned_pair_is_hard_failure() {
    let temp_dir = TempDir::new().unwrap();
    write_artifacts(
        &temp_dir.path().join("data/vector_store"),
        &index_bytes(2),
        r#"[{"text":"hello","metadata":{"tag":"greeting","responses":[],"matched_pattern":"hello"}}]"#,
    );

    let output = run_in(temp_dir.path(), &["query", "hello"], &[]);
    assert_eq!(output.status.code(), Some(7));
    let response = stdout_json(&output);
    assert!(response["error"].as_str().unwrap().contains("do not match"));
    assert!(response["matches"].as_array().unwrap().is_empty());
}

#[test]
fn test_unparseable_metadata_is_hard_failure() {
    let temp_dir = TempDir::new().unwrap();
    write_artifacts(
        &temp_dir.path().join("data/vector_store"),
        &index_bytes(1),
        "{ not json",
    );

    let output = run_in(temp_dir.path(), &["query", "hello"], &[]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stdout_json(&output)["error"].is_string());
}

#[test]
fn test_index_dir_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    write_artifacts(&temp_dir.path().join("custom"), b"garbage", "[]");

    // Default location has nothing: soft
    let output = run_in(temp_dir.path(), &["query", "hello"], &[]);
    assert_eq!(output.status.code(), Some(0));

    // Environment points at the corrupt pair: hard
    let output = run_in(
        temp_dir.path(),
        &["query", "hello"],
        &[("IR_INDEX__DIR", "custom")],
    );
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn test_flag_wins_over_environment() {
    let temp_dir = TempDir::new().unwrap();
    write_artifacts(&temp_dir.path().join("custom"), b"garbage", "[]");

    let output = run_in(
        temp_dir.path(),
        &["query", "hello", "--index-dir", "empty"],
        &[("IR_INDEX__DIR", "custom")],
    );
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_json(&output)["error"], "Index not found");
}

#[test]
fn test_invalid_top_k_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_in(temp_dir.path(), &["query", "hello", "-k", "0"], &[]);

    assert_eq!(output.status.code(), Some(6));
    assert!(
        stdout_json(&output)["error"]
            .as_str()
            .unwrap()
            .contains("top_k")
    );
}

#[test]
fn test_settings_file_is_honoured() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_in(temp_dir.path(), &["init"], &[]);
    assert_eq!(output.status.code(), Some(0));
    assert!(temp_dir.path().join(".intent-rag/settings.toml").is_file());

    let settings = std::fs::read_to_string(temp_dir.path().join(".intent-rag/settings.toml"))
        .unwrap()
        .replace("dir = \"data/vector_store\"", "dir = \"custom\"");
    std::fs::write(temp_dir.path().join(".intent-rag/settings.toml"), settings).unwrap();
    write_artifacts(&temp_dir.path().join("custom"), b"garbage", "[]");

    let output = run_in(temp_dir.path(), &["query", "hello"], &[]);
    assert_eq!(output.status.code(), Some(7));

    let output = run_in(temp_dir.path(), &["config"], &[]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("dir = \"custom\""));
}

#[test]
fn test_config_flag_resolves_paths_next_to_settings() {
    let workspace = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let config_dir = workspace.path().join(".intent-rag");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("settings.toml"), "[index]\ndir = \"store\"\n").unwrap();
    write_artifacts(&workspace.path().join("store"), b"garbage", "[]");

    let config = config_dir.join("settings.toml");
    let output = run_in(
        elsewhere.path(),
        &["-c", config.to_str().unwrap(), "query", "hello"],
        &[],
    );
    assert_eq!(output.status.code(), Some(7));
    assert!(stdout_json(&output)["error"].as_str().unwrap().contains("Corrupted"));
    assert!(!elsewhere.path().join("store").exists());
}
