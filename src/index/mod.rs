//! Persisted index: building, publishing and loading the index pair.

pub mod builder;
pub mod manifest;
pub mod store;

pub use builder::{BuildSummary, IndexBuilder, build_from_dataset, serialize_metadata};
pub use manifest::{IndexManifest, fingerprint};
pub use store::{IndexPaths, IndexSnapshot, IndexStore, MANIFEST_FILE};
