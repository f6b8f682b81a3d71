//! Vector search functionality for intent retrieval.
//!
//! This module provides the embedding seam and the exhaustive flat index the
//! query pipeline searches.
//!
//! # Architecture
//! Every pattern is embedded once at build time into a row of a [`FlatIndex`].
//! Queries are embedded with the same model and compared against every row
//! under squared Euclidean distance. The corpus is small (hundreds of rows),
//! so exact search is cheap and no clustering or quantisation is involved.

mod embedding;
mod flat;
mod types;

// Re-export core types for public API
#[cfg(test)]
pub use embedding::MockEmbeddingGenerator;
pub use embedding::{
    EmbeddingGenerator, FastEmbedGenerator, model_to_string, parse_embedding_model,
};
pub use flat::FlatIndex;
pub(crate) use flat::MappedIndexFile;
pub use types::{Neighbor, VectorDimension, VectorError};
