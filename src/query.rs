//! Query service: embeds a query and resolves its nearest documents.
//!
//! The service owns the embedding generator and the currently loaded index
//! snapshot. Queries clone the snapshot `Arc` under a read lock and run
//! against it without holding any lock, so a rebuild can publish and swap in
//! a new snapshot while earlier queries finish against the old one.

use crate::config::Settings;
use crate::dataset::{Document, DocumentMetadata, load_documents};
use crate::error::RetrievalResult;
use crate::index::{
    BuildSummary, IndexBuilder, IndexManifest, IndexPaths, IndexSnapshot, IndexStore,
};
use crate::io::QueryResponse;
use crate::vector::{EmbeddingGenerator, VectorError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One retrieved document with its distance to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    /// Squared L2 distance; smaller is closer.
    pub distance: f32,
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl QueryResult {
    fn from_document(document: &Document, distance: f32) -> Self {
        Self {
            distance,
            text: document.text.clone(),
            metadata: document.metadata.clone(),
        }
    }
}

pub struct QueryService {
    generator: Arc<dyn EmbeddingGenerator>,
    paths: IndexPaths,
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
    /// Serialises rebuilds; queries never take it.
    build_lock: Mutex<()>,
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("model", &self.generator.model_name())
            .field("paths", &self.paths)
            .field("loaded", &self.snapshot.read().is_some())
            .finish()
    }
}

impl QueryService {
    /// Create a service. The index is loaded lazily on first query.
    pub fn new(generator: Arc<dyn EmbeddingGenerator>, paths: IndexPaths) -> Self {
        Self {
            generator,
            paths,
            snapshot: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    /// Create a service around an already verified snapshot.
    pub fn with_snapshot(
        generator: Arc<dyn EmbeddingGenerator>,
        paths: IndexPaths,
        snapshot: IndexSnapshot,
    ) -> Self {
        let service = Self::new(generator, paths);
        *service.snapshot.write() = Some(Arc::new(snapshot));
        service
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn generator(&self) -> &Arc<dyn EmbeddingGenerator> {
        &self.generator
    }

    /// The snapshot currently held in memory, if one has been loaded.
    pub fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.snapshot.read().clone()
    }

    /// Find up to `k` documents nearest to `query`, nearest first.
    ///
    /// # Errors
    /// - `IndexMissing` when no index has been built
    /// - `Vector(DimensionMismatch)` when the model does not match the index
    /// - any load error from [`IndexStore::open`]
    pub fn search(&self, query: &str, k: usize) -> RetrievalResult<Vec<QueryResult>> {
        let snapshot = self.current()?;

        let vector = self
            .generator
            .generate_embeddings(&[query])?
            .into_iter()
            .next()
            .ok_or_else(|| {
                VectorError::EmbeddingFailed("model returned no embedding for the query".into())
            })?;

        let hits = snapshot.index().search(&vector, k)?;
        let results: Vec<QueryResult> = hits
            .iter()
            .filter_map(|hit| {
                snapshot
                    .document(hit.row)
                    .map(|doc| QueryResult::from_document(doc, hit.distance))
            })
            .collect();

        tracing::debug!(
            "Query matched {} of {} requested neighbours",
            results.len(),
            k
        );
        Ok(results)
    }

    /// Run [`search`](Self::search) and fold the outcome into a response.
    pub fn respond(&self, query: &str, k: usize) -> QueryResponse {
        match self.search(query, k) {
            Ok(matches) => QueryResponse::success(matches),
            Err(e) => {
                if !e.is_soft() {
                    tracing::error!("Query failed: {e}");
                }
                QueryResponse::from_error(&e)
            }
        }
    }

    /// Rebuild from the dataset configured in `settings` and swap it in.
    pub fn rebuild(&self, settings: &Settings) -> RetrievalResult<BuildSummary> {
        let documents = load_documents(&settings.dataset_path())?;
        self.rebuild_with(&documents)
    }

    /// Build and publish an index over `documents`, then swap it in.
    ///
    /// The new snapshot is read back from the published files with full
    /// verification before it replaces the current one.
    pub fn rebuild_with(&self, documents: &[Document]) -> RetrievalResult<BuildSummary> {
        let _guard = self.build_lock.lock();
        let summary =
            IndexBuilder::new(self.paths.clone()).build_with(documents, self.generator.as_ref())?;
        self.swap(IndexStore::new(self.paths.clone()).open()?);
        Ok(summary)
    }

    /// Re-read the published artifacts and swap them in.
    pub fn reload(&self) -> RetrievalResult<Arc<IndexSnapshot>> {
        let _guard = self.build_lock.lock();
        Ok(self.swap(IndexStore::new(self.paths.clone()).open()?))
    }

    /// Reload when the published manifest no longer matches the held snapshot.
    ///
    /// Returns whether a new snapshot was swapped in. Nothing happens before
    /// the first load, or when the published pair has no manifest.
    pub fn refresh_if_changed(&self) -> RetrievalResult<bool> {
        let Some(held) = self.snapshot() else {
            return Ok(false);
        };
        let Some(published) = IndexManifest::load(self.paths.manifest_file())? else {
            return Ok(false);
        };
        let unchanged = held.manifest().is_some_and(|m| {
            m.index_sha256 == published.index_sha256
                && m.metadata_sha256 == published.metadata_sha256
        });
        if unchanged {
            return Ok(false);
        }

        tracing::info!("Published index changed, reloading");
        self.reload()?;
        Ok(true)
    }

    fn swap(&self, snapshot: IndexSnapshot) -> Arc<IndexSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.snapshot.write() = Some(Arc::clone(&snapshot));
        tracing::info!("Swapped in index with {} rows", snapshot.row_count());
        snapshot
    }

    fn current(&self) -> RetrievalResult<Arc<IndexSnapshot>> {
        if let Some(snapshot) = self.snapshot.read().as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        let loaded = Arc::new(IndexStore::new(self.paths.clone()).open()?);
        let mut slot = self.snapshot.write();
        // Another query may have loaded it first
        Ok(Arc::clone(slot.get_or_insert(loaded)))
    }
}
