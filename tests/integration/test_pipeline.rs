//! End-to-end build and query through the library API.
//!
//! Uses a small word-hashing embedder so the pipeline runs without
//! downloading a model.

use intent_rag::{
    EmbeddingGenerator, IndexBuilder, IndexPaths, IndexStore, QueryService, RetrievalError,
    Settings, VectorDimension, VectorError, build_from_dataset, load_documents, runtime,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const DIMENSION: usize = 32;

/// Bag-of-words embedder: each lowercase word bumps one hashed bucket.
struct WordHashEmbedder;

impl EmbeddingGenerator for WordHashEmbedder {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; DIMENSION];
                for word in text.split_whitespace() {
                    let bucket = word
                        .to_lowercase()
                        .bytes()
                        .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
                    vector[bucket % DIMENSION] += 1.0;
                }
                vector
            })
            .collect())
    }

    fn dimension(&self) -> VectorDimension {
        VectorDimension::new(DIMENSION).unwrap()
    }

    fn model_name(&self) -> &str {
        "WordHash"
    }
}

const DATASET: &str = r#"{
  "intents": [
    {
      "tag": "greeting",
      "patterns": ["hello", "hi there"],
      "responses": ["Hi! How can I help?"]
    },
    {
      "tag": "sad",
      "patterns": ["I feel sad today", "everything feels hopeless"],
      "responses": ["I'm sorry you're feeling this way.", "Would you like to talk about it?"]
    },
    {
      "patterns": ["what is your name"]
    }
  ]
}"#;

fn workspace(dataset: &str) -> (TempDir, Settings) {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("mental_data.json"), dataset).unwrap();
    let settings = Settings {
        workspace_root: Some(temp_dir.path().to_path_buf()),
        ..Settings::default()
    };
    (temp_dir, settings)
}

fn service(settings: &Settings) -> QueryService {
    QueryService::new(Arc::new(WordHashEmbedder), settings.index_paths())
}

#[test]
fn test_greeting_dataset_end_to_end() {
    let (_temp_dir, settings) = workspace(
        r#"{"intents":[{"tag":"greeting","patterns":["hello","hi there"],"responses":["Hi! How can I help?"]}]}"#,
    );
    build_from_dataset(&settings, &WordHashEmbedder).unwrap();

    let metadata: serde_json::Value =
        serde_json::from_slice(&std::fs::read(settings.index_paths().metadata_file()).unwrap())
            .unwrap();
    assert_eq!(metadata[0]["text"], "hello");
    assert_eq!(metadata[1]["text"], "hi there");
    assert_eq!(metadata[0]["metadata"]["matched_pattern"], "hello");

    let response = service(&settings).respond("hello", 3);
    assert!(response.error.is_none());
    assert_eq!(response.matches[0].text, "hello");
    assert_eq!(response.matches[0].metadata.tag, "greeting");
    assert_eq!(
        response.matches[0].metadata.responses,
        vec!["Hi! How can I help?"]
    );
}

#[test]
fn test_every_pattern_is_its_own_nearest_match() {
    let (_temp_dir, settings) = workspace(DATASET);
    let summary = build_from_dataset(&settings, &WordHashEmbedder).unwrap();
    let documents = load_documents(&settings.dataset_path()).unwrap();
    assert_eq!(summary.row_count, documents.len());

    let service = service(&settings);
    for document in &documents {
        let matches = service.search(&document.text, 3).unwrap();
        assert!(matches.len() <= 3);
        assert_eq!(matches[0].text, document.text);
        assert_eq!(matches[0].distance, 0.0);
        for pair in matches.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    // Intents without a tag fall back to "general"
    let matches = service.search("what is your name", 1).unwrap();
    assert_eq!(matches[0].metadata.tag, "general");
    assert!(matches[0].metadata.responses.is_empty());
}

#[test]
fn test_query_before_build_is_soft() {
    let (_temp_dir, settings) = workspace(DATASET);
    let response = service(&settings).respond("hello", 3);
    assert!(response.is_soft_failure());
    assert_eq!(
        response.to_json_line(),
        r#"{"error":"Index not found","matches":[]}"#
    );
}

#[test]
fn test_torn_pair_is_detected() {
    let (_temp_dir, settings) = workspace(DATASET);
    let paths = settings.index_paths();
    build_from_dataset(&settings, &WordHashEmbedder).unwrap();
    let old_metadata = std::fs::read(paths.metadata_file()).unwrap();

    // Same row count, different documents
    let mut documents = load_documents(&settings.dataset_path()).unwrap();
    documents.reverse();
    IndexBuilder::new(paths.clone())
        .build_with(&documents, &WordHashEmbedder)
        .unwrap();

    // Simulate a reader landing between the index and metadata renames
    std::fs::write(paths.metadata_file(), &old_metadata).unwrap();

    match IndexStore::new(paths).open() {
        Err(RetrievalError::FormatMismatch { reason }) => assert!(reason.contains("metadata")),
        other => panic!("Expected FormatMismatch, got {other:?}"),
    }
    assert!(service(&settings).respond("hello", 3).is_hard_failure());
}

#[test]
fn test_rebuild_picks_up_dataset_changes() {
    let (temp_dir, settings) = workspace(DATASET);
    let service = service(&settings);
    service.rebuild(&settings).unwrap();
    assert_eq!(service.search("hello", 10).unwrap().len(), 5);

    std::fs::write(
        temp_dir.path().join("mental_data.json"),
        r#"{"intents":[{"tag":"farewell","patterns":["goodbye"],"responses":["Take care."]}]}"#,
    )
    .unwrap();
    service.rebuild(&settings).unwrap();

    let matches = service.search("hello", 10).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].metadata.tag, "farewell");
}

#[test]
fn test_process_runtime() {
    let temp_dir = TempDir::new().unwrap();
    let paths = IndexPaths::new(temp_dir.path(), "test.index", "metadata.json");

    let service = runtime::init_with(paths.clone(), Arc::new(WordHashEmbedder)).unwrap();
    assert!(matches!(
        runtime::init_with(paths, Arc::new(WordHashEmbedder)),
        Err(RetrievalError::AlreadyInitialized)
    ));

    let documents = load_documents(&write_dataset(temp_dir.path())).unwrap();
    runtime::get().unwrap().rebuild_with(&documents).unwrap();
    assert_eq!(service.search("hi there", 1).unwrap()[0].text, "hi there");

    assert!(runtime::shutdown());
    assert!(runtime::get().is_none());
}

fn write_dataset(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("intents.json");
    std::fs::write(&path, DATASET).unwrap();
    path
}
