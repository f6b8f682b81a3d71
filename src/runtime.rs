//! Process-wide query service.
//!
//! Loading the embedding model is the expensive step of a query, so a
//! long-lived process initialises one [`QueryService`] at start-up and
//! reuses it for every request until [`shutdown`].

use crate::config::Settings;
use crate::error::{RetrievalError, RetrievalResult};
use crate::index::IndexPaths;
use crate::query::QueryService;
use crate::vector::{EmbeddingGenerator, FastEmbedGenerator};
use parking_lot::RwLock;
use std::sync::Arc;

static SERVICE: RwLock<Option<Arc<QueryService>>> = RwLock::new(None);

/// Load the configured embedding model and install the process service.
///
/// # Errors
/// - `AlreadyInitialized` when a service is already installed
/// - `ModelLoad` when the model cannot be created
pub fn init(settings: &Settings) -> RetrievalResult<Arc<QueryService>> {
    if SERVICE.read().is_some() {
        return Err(RetrievalError::AlreadyInitialized);
    }
    let generator = load_generator(settings)?;
    init_with(settings.index_paths(), generator)
}

/// Install a service built around an existing generator.
pub fn init_with(
    paths: IndexPaths,
    generator: Arc<dyn EmbeddingGenerator>,
) -> RetrievalResult<Arc<QueryService>> {
    let mut slot = SERVICE.write();
    if slot.is_some() {
        return Err(RetrievalError::AlreadyInitialized);
    }
    let service = Arc::new(QueryService::new(generator, paths));
    *slot = Some(Arc::clone(&service));
    tracing::debug!("Query runtime initialized");
    Ok(service)
}

/// The installed service, if any.
pub fn get() -> Option<Arc<QueryService>> {
    SERVICE.read().clone()
}

/// Remove the installed service. Returns whether one was installed.
///
/// In-flight callers holding an `Arc` finish normally.
pub fn shutdown() -> bool {
    let removed = SERVICE.write().take().is_some();
    if removed {
        tracing::debug!("Query runtime shut down");
    }
    removed
}

/// Create the fastembed generator named in `settings`.
pub fn load_generator(settings: &Settings) -> RetrievalResult<Arc<dyn EmbeddingGenerator>> {
    let model = settings.embedding_model()?;
    let generator = FastEmbedGenerator::new(
        model,
        settings.models_dir(),
        settings.embedding.show_download_progress,
    )
    .map_err(|e| RetrievalError::ModelLoad {
        model: settings.embedding.model.clone(),
        reason: e.to_string(),
    })?;
    Ok(Arc::new(generator))
}
