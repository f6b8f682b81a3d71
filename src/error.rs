//! Error types for the retrieval pipeline
//!
//! This module provides structured error types using thiserror so that every
//! failure kind in the build and query paths has exactly one typed variant
//! with an actionable message.

use crate::vector::VectorError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for dataset loading, index building and querying
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The configured dataset path does not point at a file
    #[error("Dataset not found at '{path}'")]
    DatasetNotFound { path: PathBuf },

    /// Structurally invalid dataset or metadata JSON
    #[error("Failed to parse '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Dataset produced no documents: every intent has an empty pattern list")]
    EmptyCorpus,

    /// File system errors
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Embedding model could not be initialised
    #[error("Failed to load embedding model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    /// Index, metadata and manifest disagree with each other
    #[error("Index and metadata do not match: {reason}")]
    FormatMismatch { reason: String },

    /// No index has been built yet. Queries report this as a soft failure.
    #[error("Index not found")]
    IndexMissing { path: PathBuf },

    #[error(transparent)]
    Vector(#[from] VectorError),

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Retrieval runtime is already initialized; call shutdown() first")]
    AlreadyInitialized,
}

impl RetrievalError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in logs and JSON
    /// responses for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::DatasetNotFound { .. } => "DATASET_NOT_FOUND",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::EmptyCorpus => "EMPTY_CORPUS",
            Self::FileRead { .. } => "FILE_READ_ERROR",
            Self::FileWrite { .. } => "FILE_WRITE_ERROR",
            Self::ModelLoad { .. } => "MODEL_LOAD_ERROR",
            Self::FormatMismatch { .. } => "FORMAT_MISMATCH",
            Self::IndexMissing { .. } => "INDEX_MISSING",
            Self::Vector(_) => "VECTOR_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
        }
        .to_string()
    }

    /// Whether this condition is reported as a normal outcome to callers.
    #[must_use]
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::IndexMissing { .. })
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::DatasetNotFound { .. } => vec![
                "Set dataset_path in .intent-rag/settings.toml or pass --dataset",
                "IR_DATASET_PATH overrides the configured path",
            ],
            Self::Parse { .. } => vec![
                "The dataset must be an object with an 'intents' array",
                "Each intent needs 'tag', 'patterns' and 'responses' fields",
            ],
            Self::EmptyCorpus => vec!["Add at least one non-empty pattern to the dataset"],
            Self::FileWrite { .. } => vec![
                "Check that the index directory is writable",
                "The previously published index was left untouched",
            ],
            Self::ModelLoad { .. } => vec![
                "Check the embedding.model setting",
                "The first run downloads the model; check network access",
            ],
            Self::FormatMismatch { .. } => vec![
                "Run 'intent-rag build' to regenerate the index",
                "A rebuild may have been in progress; retry the query",
            ],
            Self::IndexMissing { .. } => vec!["Run 'intent-rag build' to create the index"],
            Self::Vector(VectorError::Corrupted(_)) => {
                vec!["Run 'intent-rag build' to regenerate the index"]
            }
            _ => vec![],
        }
    }
}

/// Result type alias for retrieval operations
pub type RetrievalResult<T> = Result<T, RetrievalError>;
