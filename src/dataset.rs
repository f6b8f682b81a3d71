//! Intent dataset loading and flattening.
//!
//! The chatbot dataset groups example user utterances ("patterns") under an
//! intent tag together with the responses a counsellor would give. Retrieval
//! works on what the user *says*, so every pattern becomes its own document
//! and carries the full response list of its intent as metadata.

use crate::error::{RetrievalError, RetrievalResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root of the dataset file.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct IntentDataset {
    #[serde(default)]
    pub intents: Vec<Intent>,
}

/// One intent: a tag, example user utterances, candidate responses.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Intent {
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub responses: Vec<String>,
}

fn default_tag() -> String {
    "general".to_string()
}

/// A retrievable unit: one pattern plus the context of its intent.
///
/// Documents have no identity beyond their position in the build that
/// produced them; row `i` of the index is `documents[i]`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub tag: String,
    pub responses: Vec<String>,
    pub matched_pattern: String,
}

impl Document {
    fn from_pattern(intent: &Intent, pattern: &str) -> Self {
        Self {
            text: pattern.to_string(),
            metadata: DocumentMetadata {
                tag: intent.tag.clone(),
                responses: intent.responses.clone(),
                matched_pattern: pattern.to_string(),
            },
        }
    }
}

/// Flatten intents into documents.
///
/// Intents keep source order, patterns keep their order within an intent,
/// and empty patterns are skipped.
pub fn flatten_intents(dataset: &IntentDataset) -> Vec<Document> {
    dataset
        .intents
        .iter()
        .flat_map(|intent| {
            intent
                .patterns
                .iter()
                .filter(|pattern| !pattern.is_empty())
                .map(move |pattern| Document::from_pattern(intent, pattern))
        })
        .collect()
}

/// Parse dataset JSON. `path` is only used for error messages.
pub fn parse_dataset(json: &str, path: &Path) -> RetrievalResult<IntentDataset> {
    serde_json::from_str(json).map_err(|e| RetrievalError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Read the dataset at `path` and return its documents in build order.
pub fn load_documents(path: &Path) -> RetrievalResult<Vec<Document>> {
    if !path.is_file() {
        return Err(RetrievalError::DatasetNotFound {
            path: path.to_path_buf(),
        });
    }

    let json = std::fs::read_to_string(path).map_err(|source| RetrievalError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = parse_dataset(&json, path)?;
    let documents = flatten_intents(&dataset);

    tracing::info!(
        "Loaded {} intents, {} documents from {}",
        dataset.intents.len(),
        documents.len(),
        path.display()
    );

    Ok(documents)
}
