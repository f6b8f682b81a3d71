//! Building and publishing an index pair.
//!
//! A build writes every artifact into a staging directory inside the index
//! directory, verifies the staged pair with the same checks the loader uses,
//! and only then renames the files over the published ones. The manifest is
//! renamed last, so a reader that races a publish sees a fingerprint mismatch
//! rather than a silently misaligned pair. A rename that fails partway rolls
//! the already replaced files back.

use crate::config::Settings;
use crate::dataset::{Document, load_documents};
use crate::error::{RetrievalError, RetrievalResult};
use crate::index::manifest::{IndexManifest, fingerprint, write_synced};
use crate::index::store::{IndexPaths, IndexStore};
use crate::vector::{EmbeddingGenerator, FlatIndex, VectorDimension, VectorError};
use std::path::Path;

const STAGING_PREFIX: &str = ".staging-";

/// What a successful build published.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub row_count: usize,
    pub dimension: usize,
    pub manifest: IndexManifest,
    pub paths: IndexPaths,
}

/// Writer for the index pair at a fixed location.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    paths: IndexPaths,
}

impl IndexBuilder {
    pub fn new(paths: IndexPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    /// Embed `documents` with `generator` and publish the result.
    pub fn build_with(
        &self,
        documents: &[Document],
        generator: &dyn EmbeddingGenerator,
    ) -> RetrievalResult<BuildSummary> {
        if documents.is_empty() {
            return Err(RetrievalError::EmptyCorpus);
        }

        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        tracing::info!(
            "Embedding {} documents with {}",
            texts.len(),
            generator.model_name()
        );
        let embeddings = generator.generate_embeddings(&texts)?;

        self.build(documents, &embeddings, generator.model_name())
    }

    /// Publish a pair from precomputed embeddings.
    ///
    /// `embeddings[i]` must be the embedding of `documents[i]`.
    ///
    /// # Errors
    /// - `EmptyCorpus` when there are no documents
    /// - `FormatMismatch` when the two slices differ in length
    /// - `Vector(DimensionMismatch)` when embeddings are ragged
    /// - `FileWrite` when the index directory cannot be written
    ///
    /// On error the previously published artifacts are left as they were.
    pub fn build(
        &self,
        documents: &[Document],
        embeddings: &[Vec<f32>],
        model_name: &str,
    ) -> RetrievalResult<BuildSummary> {
        if documents.is_empty() {
            return Err(RetrievalError::EmptyCorpus);
        }
        if documents.len() != embeddings.len() {
            return Err(RetrievalError::FormatMismatch {
                reason: format!(
                    "{} documents but {} embeddings",
                    documents.len(),
                    embeddings.len()
                ),
            });
        }

        let dimension = VectorDimension::new(embeddings[0].len())?;
        let mut index = FlatIndex::with_capacity(dimension, embeddings.len());
        for embedding in embeddings {
            index.add(embedding)?;
        }
        let metadata = serialize_metadata(documents)?;

        let dir = self.paths.dir();
        std::fs::create_dir_all(dir).map_err(|source| write_error(dir, source))?;
        sweep_stale_staging(dir);
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(dir)
            .map_err(|source| write_error(dir, source))?;
        let staged = self.paths.relocated(staging.path());

        index
            .save(staged.index_file())
            .map_err(|e| match e {
                VectorError::Storage(source) => write_error(staged.index_file(), source),
                other => other.into(),
            })?;
        write_synced(staged.metadata_file(), &metadata)?;

        let index_bytes =
            std::fs::read(staged.index_file()).map_err(|source| RetrievalError::FileRead {
                path: staged.index_file().to_path_buf(),
                source,
            })?;
        let manifest = IndexManifest::new(
            model_name.to_string(),
            dimension.get(),
            index.row_count(),
            fingerprint(&index_bytes),
            fingerprint(&metadata),
        );
        manifest.save(staged.manifest_file())?;

        // Refuse to publish anything the loader would refuse to read
        IndexStore::new(staged.clone()).open()?;

        publish(
            staging.path(),
            &[
                (staged.index_file(), self.paths.index_file()),
                (staged.metadata_file(), self.paths.metadata_file()),
                (staged.manifest_file(), self.paths.manifest_file()),
            ],
            |from, to| std::fs::rename(from, to),
        )?;

        tracing::info!(
            "Published index with {} rows (dimension {}) to {}",
            index.row_count(),
            dimension,
            dir.display()
        );

        Ok(BuildSummary {
            row_count: index.row_count(),
            dimension: dimension.get(),
            manifest,
            paths: self.paths.clone(),
        })
    }
}

/// Serialise documents as the metadata file: a pretty-printed JSON array.
///
/// Output depends only on the documents, so an unchanged dataset yields a
/// byte-identical file.
pub fn serialize_metadata(documents: &[Document]) -> RetrievalResult<Vec<u8>> {
    serde_json::to_vec_pretty(documents).map_err(|e| RetrievalError::Parse {
        path: "metadata".into(),
        reason: format!("Failed to serialize metadata: {e}"),
    })
}

/// Load the configured dataset, embed it and publish the index.
pub fn build_from_dataset(
    settings: &Settings,
    generator: &dyn EmbeddingGenerator,
) -> RetrievalResult<BuildSummary> {
    let documents = load_documents(&settings.dataset_path())?;
    IndexBuilder::new(settings.index_paths()).build_with(&documents, generator)
}

/// Move staged files over their published targets, in order.
///
/// Each existing target is first hard-linked (or copied) into `backup_dir`.
/// If any move fails, the targets already replaced are restored from those
/// backups, or removed when nothing was published there before.
fn publish(
    backup_dir: &Path,
    moves: &[(&Path, &Path)],
    mut rename: impl FnMut(&Path, &Path) -> std::io::Result<()>,
) -> RetrievalResult<()> {
    let mut backups = Vec::with_capacity(moves.len());
    for (i, (_, target)) in moves.iter().enumerate() {
        if !target.is_file() {
            backups.push(None);
            continue;
        }
        let backup = backup_dir.join(format!("previous-{i}"));
        std::fs::hard_link(target, &backup)
            .or_else(|_| std::fs::copy(target, &backup).map(|_| ()))
            .map_err(|source| write_error(&backup, source))?;
        backups.push(Some(backup));
    }

    for (done, (from, to)) in moves.iter().enumerate() {
        if let Err(source) = rename(*from, *to) {
            tracing::error!("Publishing {} failed, rolling back: {source}", to.display());
            for ((_, target), backup) in moves.iter().zip(&backups).take(done) {
                let restored = match backup {
                    Some(backup) => std::fs::rename(backup, target),
                    None => std::fs::remove_file(target),
                };
                if let Err(e) = restored {
                    tracing::error!("Failed to restore {}: {e}", target.display());
                }
            }
            return Err(write_error(to, source));
        }
    }
    Ok(())
}

/// Remove staging directories left behind by builds that never finished.
fn sweep_stale_staging(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
            continue;
        }
        let path = entry.path();
        match std::fs::remove_dir_all(&path) {
            Ok(()) => tracing::debug!("Removed stale staging directory {}", path.display()),
            Err(e) => tracing::warn!("Cannot remove {}: {e}", path.display()),
        }
    }
}

fn write_error(path: &Path, source: std::io::Error) -> RetrievalError {
    RetrievalError::FileWrite {
        path: path.to_path_buf(),
        source,
    }
}
