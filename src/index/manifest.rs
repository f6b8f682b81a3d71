//! Manifest tracking for the persisted index pair.
//!
//! The flat index and the metadata array carry no link to each other beyond
//! row order. The manifest records what a build produced (model, dimension,
//! row count and a SHA-256 of each artifact) so that loading can tell a
//! consistent pair from a torn or mismatched one.

use crate::error::{RetrievalError, RetrievalResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Manifest written next to the index artifacts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    /// Version of the manifest format
    pub version: u32,

    /// Name of the embedding model used
    pub model_name: String,

    /// Dimension of embeddings
    pub dimension: usize,

    /// Number of index rows and metadata entries
    pub row_count: usize,

    /// Hex SHA-256 of the binary index file
    pub index_sha256: String,

    /// Hex SHA-256 of the metadata file
    pub metadata_sha256: String,

    /// Unix timestamp when created
    pub created_at: u64,

    /// Unix timestamp when last updated
    pub updated_at: u64,
}

impl IndexManifest {
    /// Current manifest version
    pub const CURRENT_VERSION: u32 = 1;

    /// Create new manifest with current timestamp
    pub fn new(
        model_name: String,
        dimension: usize,
        row_count: usize,
        index_sha256: String,
        metadata_sha256: String,
    ) -> Self {
        let now = get_utc_timestamp();
        Self {
            version: Self::CURRENT_VERSION,
            model_name,
            dimension,
            row_count,
            index_sha256,
            metadata_sha256,
            created_at: now,
            updated_at: now,
        }
    }

    /// Write the manifest to `path` and fsync it.
    pub fn save(&self, path: &Path) -> RetrievalResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| RetrievalError::Parse {
            path: path.to_path_buf(),
            reason: format!("Failed to serialize manifest: {e}"),
        })?;

        write_synced(path, json.as_bytes())
    }

    /// Load the manifest at `path`.
    ///
    /// Returns `Ok(None)` when no manifest exists.
    pub fn load(path: &Path) -> RetrievalResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(path).map_err(|source| RetrievalError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let manifest: Self = serde_json::from_str(&json).map_err(|e| RetrievalError::Parse {
            path: path.to_path_buf(),
            reason: format!("Failed to parse manifest: {e}"),
        })?;

        // Check version compatibility
        if manifest.version > Self::CURRENT_VERSION {
            return Err(RetrievalError::FormatMismatch {
                reason: format!(
                    "manifest version {} is newer than supported version {}",
                    manifest.version,
                    Self::CURRENT_VERSION
                ),
            });
        }

        Ok(Some(manifest))
    }

    /// Creation time as RFC 3339, for display.
    pub fn created(&self) -> String {
        format_timestamp(self.created_at)
    }
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Write `bytes` to `path` and fsync before returning.
pub(crate) fn write_synced(path: &Path, bytes: &[u8]) -> RetrievalResult<()> {
    use std::io::Write;

    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    };
    write().map_err(|source| RetrievalError::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Current UTC time in unix seconds.
pub fn get_utc_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn format_timestamp(secs: u64) -> String {
    chrono::DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}
