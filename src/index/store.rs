//! The persisted index pair and its load/verify contract.
//!
//! An index is published as three files in one directory: the binary flat
//! index, the JSON metadata array, and a manifest. Loading refuses any pair
//! whose row counts differ, and when a manifest is present also any pair
//! whose content fingerprints do not match what the build recorded.

use crate::dataset::Document;
use crate::error::{RetrievalError, RetrievalResult};
use crate::index::manifest::{IndexManifest, fingerprint};
use crate::vector::{FlatIndex, MappedIndexFile, VectorError};
use std::path::{Path, PathBuf};

/// File name of the manifest inside the index directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Locations of the persisted artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    dir: PathBuf,
    index_file: PathBuf,
    metadata_file: PathBuf,
    manifest_file: PathBuf,
}

impl IndexPaths {
    pub fn new(dir: impl Into<PathBuf>, index_name: &str, metadata_name: &str) -> Self {
        let dir = dir.into();
        Self {
            index_file: dir.join(index_name),
            metadata_file: dir.join(metadata_name),
            manifest_file: dir.join(MANIFEST_FILE),
            dir,
        }
    }

    /// The same file names rooted in another directory.
    pub fn relocated(&self, dir: &Path) -> Self {
        let name = |p: &Path| dir.join(p.file_name().unwrap_or_default());
        Self {
            index_file: name(&self.index_file),
            metadata_file: name(&self.metadata_file),
            manifest_file: name(&self.manifest_file),
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_file(&self) -> &Path {
        &self.index_file
    }

    pub fn metadata_file(&self) -> &Path {
        &self.metadata_file
    }

    pub fn manifest_file(&self) -> &Path {
        &self.manifest_file
    }

    /// Whether an index has been published. Only the index file decides.
    pub fn exists(&self) -> bool {
        self.index_file.is_file()
    }
}

/// An immutable, verified index pair held in memory.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    index: FlatIndex,
    documents: Vec<Document>,
    manifest: Option<IndexManifest>,
}

impl IndexSnapshot {
    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn manifest(&self) -> Option<&IndexManifest> {
        self.manifest.as_ref()
    }

    pub fn row_count(&self) -> usize {
        self.index.row_count()
    }

    /// The document stored at `row`, if the row is in range.
    pub fn document(&self, row: usize) -> Option<&Document> {
        self.documents.get(row)
    }
}

/// Reader for a published index.
#[derive(Debug, Clone)]
pub struct IndexStore {
    paths: IndexPaths,
}

impl IndexStore {
    pub fn new(paths: IndexPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn exists(&self) -> bool {
        self.paths.exists()
    }

    /// Load and verify the index pair.
    ///
    /// # Errors
    /// - `IndexMissing` when no index file exists yet
    /// - `FileRead` / `Parse` when an artifact cannot be read
    /// - `Vector(Corrupted)` when the binary index is malformed
    /// - `FormatMismatch` when the artifacts disagree with each other
    pub fn open(&self) -> RetrievalResult<IndexSnapshot> {
        if !self.paths.exists() {
            return Err(RetrievalError::IndexMissing {
                path: self.paths.index_file.clone(),
            });
        }

        let mapped = MappedIndexFile::open(&self.paths.index_file).map_err(|e| match e {
            VectorError::Storage(source) => RetrievalError::FileRead {
                path: self.paths.index_file.clone(),
                source,
            },
            other => other.into(),
        })?;
        let index_sha256 = fingerprint(mapped.bytes());
        let index = mapped.parse()?;

        let metadata_bytes =
            std::fs::read(&self.paths.metadata_file).map_err(|source| RetrievalError::FileRead {
                path: self.paths.metadata_file.clone(),
                source,
            })?;
        let documents: Vec<Document> =
            serde_json::from_slice(&metadata_bytes).map_err(|e| RetrievalError::Parse {
                path: self.paths.metadata_file.clone(),
                reason: e.to_string(),
            })?;

        let manifest = IndexManifest::load(&self.paths.manifest_file)?;

        verify_pair(
            &index,
            &documents,
            manifest.as_ref(),
            &index_sha256,
            &fingerprint(&metadata_bytes),
        )?;

        tracing::debug!(
            "Loaded index with {} rows of dimension {} from {}",
            index.row_count(),
            index.dimension(),
            self.paths.dir.display()
        );

        Ok(IndexSnapshot {
            index,
            documents,
            manifest,
        })
    }
}

fn verify_pair(
    index: &FlatIndex,
    documents: &[Document],
    manifest: Option<&IndexManifest>,
    index_sha256: &str,
    metadata_sha256: &str,
) -> RetrievalResult<()> {
    if index.row_count() != documents.len() {
        return Err(RetrievalError::FormatMismatch {
            reason: format!(
                "index has {} rows but metadata has {} entries",
                index.row_count(),
                documents.len()
            ),
        });
    }

    let Some(manifest) = manifest else {
        tracing::warn!("No index manifest found; only the row count was verified");
        return Ok(());
    };

    if manifest.row_count != index.row_count() {
        return Err(RetrievalError::FormatMismatch {
            reason: format!(
                "manifest records {} rows but index has {}",
                manifest.row_count,
                index.row_count()
            ),
        });
    }
    if manifest.dimension != index.dimension().get() {
        return Err(RetrievalError::FormatMismatch {
            reason: format!(
                "manifest records dimension {} but index has {}",
                manifest.dimension,
                index.dimension()
            ),
        });
    }
    if manifest.index_sha256 != index_sha256 {
        return Err(RetrievalError::FormatMismatch {
            reason: "index file does not match the manifest fingerprint".to_string(),
        });
    }
    if manifest.metadata_sha256 != metadata_sha256 {
        return Err(RetrievalError::FormatMismatch {
            reason: "metadata file does not match the manifest fingerprint".to_string(),
        });
    }

    Ok(())
}
