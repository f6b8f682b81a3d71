//! Configuration module for the retrieval pipeline.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! Configuration is resolved once at start-up; nothing probes alternative
//! paths afterwards.
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `IR_` and use double underscores
//! to separate nested levels:
//! - `IR_DATASET_PATH=data/intents.json` sets `dataset_path`
//! - `IR_INDEX__DIR=/var/lib/intent-rag` sets `index.dir`
//! - `IR_QUERY__TOP_K=5` sets `query.top_k`

use crate::error::{RetrievalError, RetrievalResult};
use crate::index::{IndexPaths, MANIFEST_FILE};
use crate::vector::parse_embedding_model;
use fastembed::EmbeddingModel;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-project configuration directory.
pub const CONFIG_DIR: &str = ".intent-rag";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Path to the intent dataset JSON
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Directory containing .intent-rag; relative paths resolve against it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Persisted index location
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Query defaults
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    /// Output directory for the index artifacts
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,

    /// File name of the binary vector index
    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// File name of the JSON metadata array
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Model cache directory (defaults to the user cache dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Show a progress bar while downloading the model
    #[serde(default = "default_false")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueryConfig {
    /// Number of neighbours returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// Values given on the command line. They win over every other layer.
#[derive(Debug, Default, Clone)]
pub struct SettingsOverrides {
    pub dataset_path: Option<PathBuf>,
    pub index_dir: Option<PathBuf>,
    pub model: Option<String>,
    pub top_k: Option<usize>,
    pub debug: bool,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_dataset_path() -> PathBuf {
    PathBuf::from("mental_data.json")
}
fn default_index_dir() -> PathBuf {
    PathBuf::from("data/vector_store")
}
fn default_index_file() -> String {
    "mental_health.index".to_string()
}
fn default_metadata_file() -> String {
    "metadata.json".to_string()
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_top_k() -> usize {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: false,
            dataset_path: default_dataset_path(),
            workspace_root: None,
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            index_file: default_index_file(),
            metadata_file: default_metadata_file(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            cache_dir: None,
            show_download_progress: false,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for .intent-rag directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Self::figment(&config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file
    ///
    /// Relative paths resolve against the directory containing `.intent-rag`
    /// when the file sits inside one, otherwise against the file's directory.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        let path = path.as_ref();
        Self::figment(path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::root_for_config(path);
                }
                settings
            })
    }

    fn root_for_config(path: &Path) -> Option<PathBuf> {
        let parent = path.parent()?;
        let root = if parent.file_name().is_some_and(|name| name == CONFIG_DIR) {
            parent.parent()?
        } else {
            parent
        };
        if root.as_os_str().is_empty() {
            std::env::current_dir().ok()
        } else {
            Some(root.to_path_buf())
        }
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Layer in environment variables with IR_ prefix
            // Use double underscore (__) to separate nested levels
            .merge(Env::prefixed("IR_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".") // Double underscore becomes dot
                    .into()
            }))
    }

    /// Find the workspace config by looking for a .intent-rag directory
    /// from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join("settings.toml"))
    }

    /// Get the workspace root directory (where .intent-rag is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Apply command-line values on top of the loaded layers.
    #[must_use]
    pub fn with_overrides(mut self, overrides: SettingsOverrides) -> Self {
        if let Some(path) = overrides.dataset_path {
            self.dataset_path = path;
        }
        if let Some(dir) = overrides.index_dir {
            self.index.dir = dir;
        }
        if let Some(model) = overrides.model {
            self.embedding.model = model;
        }
        if let Some(k) = overrides.top_k {
            self.query.top_k = k;
        }
        self.debug |= overrides.debug;
        self
    }

    /// Check values that deserialise fine but cannot be used.
    pub fn validate(&self) -> RetrievalResult<()> {
        if self.query.top_k == 0 {
            return Err(RetrievalError::Config {
                reason: "query.top_k must be at least 1".to_string(),
            });
        }
        if self.index.index_file == self.index.metadata_file {
            return Err(RetrievalError::Config {
                reason: "index.index_file and index.metadata_file must differ".to_string(),
            });
        }
        if self.index.index_file == MANIFEST_FILE || self.index.metadata_file == MANIFEST_FILE {
            return Err(RetrievalError::Config {
                reason: format!("{MANIFEST_FILE} is reserved for the index manifest"),
            });
        }
        self.embedding_model()?;
        Ok(())
    }

    /// Resolve a configured path against the workspace root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.resolve(&self.dataset_path)
    }

    /// Locations of the persisted index artifacts.
    pub fn index_paths(&self) -> IndexPaths {
        IndexPaths::new(
            self.resolve(&self.index.dir),
            &self.index.index_file,
            &self.index.metadata_file,
        )
    }

    /// The configured fastembed model.
    pub fn embedding_model(&self) -> RetrievalResult<EmbeddingModel> {
        parse_embedding_model(&self.embedding.model).ok_or_else(|| RetrievalError::ModelLoad {
            model: self.embedding.model.clone(),
            reason: "unsupported model name; expected one of AllMiniLML6V2, AllMiniLML12V2, AllMpnetBaseV2, BGESmallENV15, BGEBaseENV15".to_string(),
        })
    }

    /// Directory where downloaded models are cached.
    pub fn models_dir(&self) -> PathBuf {
        match &self.embedding.cache_dir {
            Some(dir) => self.resolve(dir),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("intent-rag")
                .join("models"),
        }
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = r#"# intent-rag configuration
# Relative paths resolve against the directory containing .intent-rag.
# Every key can be overridden with an IR_ environment variable, e.g.
# IR_INDEX__DIR or IR_QUERY__TOP_K, and with command-line flags.

# Version of the configuration schema
version = 1

# Global debug mode
debug = false

# Intent dataset: {"intents": [{"tag", "patterns", "responses"}]}
dataset_path = "mental_data.json"

[index]
# Output directory for the index artifacts
dir = "data/vector_store"

# Binary vector index and JSON metadata file names
index_file = "mental_health.index"
metadata_file = "metadata.json"

[embedding]
# One of: AllMiniLML6V2, AllMiniLML12V2, AllMpnetBaseV2, BGESmallENV15, BGEBaseENV15
# Changing the model requires rebuilding the index.
model = "AllMiniLML6V2"

# Model cache directory (defaults to the user cache directory)
# cache_dir = ".intent-rag/models"

show_download_progress = false

[query]
# Number of nearest patterns returned per query
top_k = 3
"#;

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}
