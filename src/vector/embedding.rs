//! Embedding generation for intent patterns and user queries.
//!
//! This module provides the trait the pipeline embeds text through, and its
//! fastembed-backed implementation. Model initialisation is the expensive
//! part (model download on first use, ONNX session setup), so a generator is
//! meant to be created once and shared behind an `Arc`.

use crate::vector::{VectorDimension, VectorError};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;

/// Trait for generating embeddings from text.
///
/// Implementations must be deterministic for a fixed model version: the same
/// text always maps to the same vector. Rebuilding an unchanged dataset then
/// reproduces the same index.
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate embeddings for multiple texts.
    ///
    /// Returns one embedding per input text, in input order.
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Get the dimension of embeddings produced by this generator.
    #[must_use]
    fn dimension(&self) -> VectorDimension;

    /// Configuration name of the model, recorded in the index manifest.
    fn model_name(&self) -> &str;
}

/// FastEmbed implementation.
///
/// The dimension is probed from the model at construction time, so any
/// supported model can be configured.
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: VectorDimension,
}

impl FastEmbedGenerator {
    /// Create a new FastEmbed generator.
    ///
    /// # Errors
    /// Returns an error if the model fails to initialize or download.
    pub fn new(
        model: EmbeddingModel,
        cache_dir: PathBuf,
        show_download_progress: bool,
    ) -> Result<Self, VectorError> {
        let model_name = model_to_string(&model);
        tracing::debug!(
            "Initializing embedding model {model_name} (cache: {})",
            cache_dir.display()
        );

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| VectorError::EmbeddingFailed(
            format!("Failed to initialize embedding model: {e}. Ensure you have internet connection for first-time model download")
        ))?;

        // Get dimensions by generating a test embedding
        let probe = text_model
            .embed(vec!["test"], None)
            .map_err(|e| VectorError::EmbeddingFailed(e.to_string()))?;
        let width = probe.first().map(Vec::len).unwrap_or_default();
        let dimension = VectorDimension::new(width)?;

        Ok(Self {
            model: Mutex::new(text_model),
            model_name,
            dimension,
        })
    }
}

impl std::fmt::Debug for FastEmbedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedGenerator")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, None)
            .map_err(|e| {
                VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
            })?;

        if embeddings.len() != texts.len() {
            return Err(VectorError::EmbeddingFailed(format!(
                "model returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }
        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Parse a configured model name into a fastembed model.
///
/// Accepts the enum-style names used in settings files, case-insensitively.
#[must_use]
pub fn parse_embedding_model(name: &str) -> Option<EmbeddingModel> {
    match name.to_ascii_lowercase().as_str() {
        "allminilml6v2" => Some(EmbeddingModel::AllMiniLML6V2),
        "allminilml12v2" => Some(EmbeddingModel::AllMiniLML12V2),
        "allmpnetbasev2" => Some(EmbeddingModel::AllMpnetBaseV2),
        "bgesmallenv15" => Some(EmbeddingModel::BGESmallENV15),
        "bgebaseenv15" => Some(EmbeddingModel::BGEBaseENV15),
        _ => None,
    }
}

/// Inverse of [`parse_embedding_model`] for the supported models.
#[must_use]
pub fn model_to_string(model: &EmbeddingModel) -> String {
    match model {
        EmbeddingModel::AllMiniLML6V2 => "AllMiniLML6V2",
        EmbeddingModel::AllMiniLML12V2 => "AllMiniLML12V2",
        EmbeddingModel::AllMpnetBaseV2 => "AllMpnetBaseV2",
        EmbeddingModel::BGESmallENV15 => "BGESmallENV15",
        EmbeddingModel::BGEBaseENV15 => "BGEBaseENV15",
        _ => "Unknown",
    }
    .to_string()
}

/// Mock embedding generator for testing.
///
/// Produces deterministic, unit-length embeddings from hashed character
/// trigrams, so identical texts map to identical vectors and texts sharing
/// words land close together.
#[cfg(test)]
pub struct MockEmbeddingGenerator {
    dimension: VectorDimension,
}

#[cfg(test)]
impl Default for MockEmbeddingGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl MockEmbeddingGenerator {
    /// Create a new mock generator with 64 dimensions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimension: VectorDimension::new(64).unwrap(),
        }
    }

    /// Create a generator with custom dimension for testing.
    #[must_use]
    pub fn with_dimension(dimension: VectorDimension) -> Self {
        Self { dimension }
    }
}

#[cfg(test)]
impl EmbeddingGenerator for MockEmbeddingGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        let dim = self.dimension.get();
        Ok(texts
            .iter()
            .map(|text| {
                let mut embedding = vec![0.0f32; dim];
                let padded: Vec<char> = format!("  {}  ", text.to_lowercase()).chars().collect();
                for window in padded.windows(3) {
                    // FNV-1a over the trigram
                    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
                    for c in window {
                        hash ^= *c as u64;
                        hash = hash.wrapping_mul(0x0100_0000_01b3);
                    }
                    embedding[(hash % dim as u64) as usize] += 1.0;
                }

                let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
                if magnitude > 0.0 {
                    for val in &mut embedding {
                        *val /= magnitude;
                    }
                }
                embedding
            })
            .collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "Mock"
    }
}
