//! Exhaustive flat vector index with squared-L2 search.
//!
//! The corpus is a few hundred intent patterns, so every query is compared
//! against every stored row. There is no approximation: results are exact.
//!
//! # File Format
//!
//! The index is persisted in a simple little-endian binary layout:
//! - Header (16 bytes): magic, version, dimension, row count
//! - Rows: `row_count * dimension` contiguous f32 values in build order
//!
//! There are no row ids on disk. Row `i` is the `i`-th document of the
//! build that produced it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::{Mmap, MmapOptions};

use crate::vector::types::{Neighbor, VectorDimension, VectorError};

/// Current index format version.
const INDEX_VERSION: u32 = 1;

/// Size of the index header in bytes.
const HEADER_SIZE: usize = 16;

/// Magic bytes to identify flat index files.
const MAGIC_BYTES: &[u8; 4] = b"IFLT";

/// Number of bytes per f32 value.
const BYTES_PER_F32: usize = 4;

/// Row-major exhaustive index over fixed-dimension vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: VectorDimension,
    /// Concatenated rows, each `dimension` long.
    data: Vec<f32>,
}

impl FlatIndex {
    /// Creates an empty index for vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Creates an empty index with room for `rows` vectors.
    #[must_use]
    pub fn with_capacity(dimension: VectorDimension, rows: usize) -> Self {
        Self {
            dimension,
            data: Vec::with_capacity(rows * dimension.get()),
        }
    }

    /// Appends one vector as the next row.
    pub fn add(&mut self, vector: &[f32]) -> Result<(), VectorError> {
        self.dimension.validate_vector(vector)?;
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Returns the vector dimension.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Returns the number of stored rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.data.len() / self.dimension.get()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns row `i`, or `None` when out of range.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        let dim = self.dimension.get();
        let start = i.checked_mul(dim)?;
        self.data.get(start..start + dim)
    }

    /// Finds up to `k` nearest rows to `query`.
    ///
    /// Hits are ordered by non-decreasing squared L2 distance; equal distances
    /// keep the lower row first. Fewer than `k` hits are returned when the
    /// index holds fewer rows.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorError> {
        self.dimension.validate_vector(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let dim = self.dimension.get();
        let mut hits: Vec<Neighbor> = self
            .data
            .chunks_exact(dim)
            .enumerate()
            .map(|(row, stored)| Neighbor {
                row,
                distance: squared_l2(query, stored),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.row.cmp(&b.row))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Writes the index to `path`, replacing any existing file.
    ///
    /// The file is fsynced before returning.
    pub fn save(&self, path: &Path) -> Result<(), VectorError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC_BYTES)?;
        writer.write_all(&INDEX_VERSION.to_le_bytes())?;
        writer.write_all(&(self.dimension.get() as u32).to_le_bytes())?;
        writer.write_all(&(self.row_count() as u32).to_le_bytes())?;
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| VectorError::Storage(e.into_error()))?;
        file.sync_all()?;
        Ok(())
    }

    /// Loads an index previously written by [`FlatIndex::save`].
    ///
    /// Validates magic bytes, version and the exact file length implied by
    /// the header.
    pub fn load(path: &Path) -> Result<Self, VectorError> {
        MappedIndexFile::open(path)?.parse()
    }

    /// Parses the on-disk representation, e.g. from a memory map.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VectorError> {
        if bytes.len() < HEADER_SIZE {
            return Err(VectorError::Corrupted(
                "File too small to contain header".to_string(),
            ));
        }

        if &bytes[0..4] != MAGIC_BYTES {
            return Err(VectorError::Corrupted("Invalid magic bytes".to_string()));
        }

        let version = read_u32(bytes, 4);
        if version != INDEX_VERSION {
            return Err(VectorError::VersionMismatch {
                expected: INDEX_VERSION,
                actual: version,
            });
        }

        let dimension = VectorDimension::new(read_u32(bytes, 8) as usize)
            .map_err(|e| VectorError::Corrupted(e.to_string()))?;
        let rows = read_u32(bytes, 12) as usize;

        let expected = rows
            .checked_mul(dimension.get())
            .and_then(|n| n.checked_mul(BYTES_PER_F32))
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .ok_or_else(|| VectorError::Corrupted("row count overflows".to_string()))?;
        if bytes.len() != expected {
            return Err(VectorError::Corrupted(format!(
                "header declares {rows} rows of dimension {dimension} ({expected} bytes) but file has {} bytes",
                bytes.len()
            )));
        }

        let data = bytes[HEADER_SIZE..]
            .chunks_exact(BYTES_PER_F32)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self { dimension, data })
    }
}

/// Read-only memory map of an index file.
///
/// Lets callers fingerprint the exact bytes they parse.
#[derive(Debug)]
pub(crate) struct MappedIndexFile {
    /// `None` for an empty file, which cannot be mapped.
    mmap: Option<Mmap>,
}

impl MappedIndexFile {
    pub fn open(path: &Path) -> Result<Self, VectorError> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Self { mmap: None });
        }

        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self { mmap: Some(mmap) })
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or_default()
    }

    pub fn parse(&self) -> Result<FlatIndex, VectorError> {
        FlatIndex::from_bytes(self.bytes())
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Squared Euclidean distance.
#[inline]
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
