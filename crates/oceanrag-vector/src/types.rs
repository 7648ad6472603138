//! Common types for oceanrag-vector.

use crate::distance::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Unique identifier for a chunk (one index entry per chunk).
pub type ChunkId = String;

/// Metadata stored alongside every vector, enough to filter and attribute
/// results without a second lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Owning document id.
    pub document_id: String,
    /// Source URI of the owning document.
    pub source_uri: String,
    /// Position of the chunk within its document.
    pub sequence_index: u32,
}

impl EntryMetadata {
    /// Create metadata for a chunk of `document_id`.
    pub fn new(
        document_id: impl Into<String>,
        source_uri: impl Into<String>,
        sequence_index: u32,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            source_uri: source_uri.into(),
            sequence_index,
        }
    }
}

/// A vector to be inserted, keyed by chunk id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Chunk id (globally unique).
    pub chunk_id: ChunkId,
    /// Embedding vector; its length must equal the index dimensions.
    pub vector: Vec<f32>,
    /// Attribution metadata.
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    /// Create a new entry.
    pub fn new(chunk_id: impl Into<ChunkId>, vector: Vec<f32>, metadata: EntryMetadata) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            vector,
            metadata,
        }
    }
}

/// How `insert` treats chunk ids that are already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMode {
    /// Reject the whole batch with `DuplicateKey`.
    #[default]
    Strict,
    /// Replace the existing vector and metadata, keeping its original
    /// insertion position for tie-breaking.
    Overwrite,
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Matched chunk id.
    pub chunk_id: ChunkId,
    /// Similarity score (higher = more similar).
    pub score: f32,
    /// Metadata of the matched entry.
    pub metadata: EntryMetadata,
}

/// Restricts a search to a subset of entries. An unset field matches
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Only entries belonging to one of these documents.
    pub document_ids: Option<HashSet<String>>,
}

impl SearchFilter {
    /// Filter to a set of document ids.
    pub fn documents<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            document_ids: Some(ids.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether an entry with this metadata passes the filter.
    pub fn matches(&self, metadata: &EntryMetadata) -> bool {
        self.document_ids
            .as_ref()
            .is_none_or(|ids| ids.contains(&metadata.document_id))
    }
}

/// Statistics about an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of stored entries.
    pub entry_count: usize,
    /// Dimensionality of vectors.
    pub dimensions: usize,
    /// Similarity metric used.
    pub metric: DistanceMetric,
    /// Approximate memory used by vectors, in bytes.
    pub memory_bytes: usize,
}
