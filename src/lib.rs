//! Semantic retrieval over conversational intent patterns.
//!
//! An intent dataset is flattened into one document per example utterance,
//! embedded, and stored as an exhaustive vector index with a positionally
//! aligned metadata file. Queries return the nearest utterances together
//! with their intent tag and candidate responses.

pub mod config;
pub mod dataset;
pub mod display;
pub mod error;
pub mod index;
pub mod io;
pub mod query;
pub mod runtime;
pub mod vector;

// Explicit exports for better API clarity
pub use config::{Settings, SettingsOverrides};
pub use dataset::{Document, DocumentMetadata, Intent, IntentDataset, load_documents};
pub use error::{RetrievalError, RetrievalResult};
pub use index::{
    BuildSummary, IndexBuilder, IndexManifest, IndexPaths, IndexSnapshot, IndexStore,
    build_from_dataset,
};
pub use io::{ExitCode, QueryResponse};
pub use query::{QueryResult, QueryService};
pub use vector::{EmbeddingGenerator, FastEmbedGenerator, FlatIndex, VectorDimension, VectorError};
