//! Tests for the build command's failure paths.
//!
//! These fail before the embedding model loads. The full build is covered
//! by the ignored test at the end, which downloads the model.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_intent-rag"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to run intent-rag")
}

#[test]
fn test_missing_dataset() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_in(temp_dir.path(), &["build"]);

    assert_eq!(output.status.code(), Some(5));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Dataset not found"));
    assert!(!temp_dir.path().join("data/vector_store").exists());
}

#[test]
fn test_invalid_dataset() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("mental_data.json"), r#"{"intents": 5}"#).unwrap();

    let output = run_in(temp_dir.path(), &["build"]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_empty_corpus() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("intents.json"),
        r#"{"intents": [{"tag": "x", "patterns": [], "responses": ["r"]}]}"#,
    )
    .unwrap();

    let output = run_in(temp_dir.path(), &["build", "--dataset", "intents.json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no documents"));
}

#[test]
fn test_unknown_model() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("mental_data.json"),
        r#"{"intents": [{"tag": "greeting", "patterns": ["hello"], "responses": ["Hi"]}]}"#,
    )
    .unwrap();

    let output = run_in(temp_dir.path(), &["build", "--model", "NoSuchModel"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
#[ignore = "Downloads the embedding model"]
fn test_build_then_query_with_real_model() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("mental_data.json"),
        r#"{"intents": [
            {"tag": "greeting", "patterns": ["hello", "hi there"], "responses": ["Hi! How can I help?"]},
            {"tag": "sleep", "patterns": ["I can't sleep at night"], "responses": ["Let's talk about your evenings."]}
        ]}"#,
    )
    .unwrap();

    let output = run_in(temp_dir.path(), &["build"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(
        temp_dir
            .path()
            .join("data/vector_store/mental_health.index")
            .is_file()
    );

    let output = run_in(temp_dir.path(), &["query", "hello"]);
    assert_eq!(output.status.code(), Some(0));
    let response: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(response["matches"][0]["text"], "hello");
    assert_eq!(response["matches"][0]["metadata"]["tag"], "greeting");
    assert!(response.get("error").is_none());
}
