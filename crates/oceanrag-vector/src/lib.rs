//! # oceanrag-vector
//!
//! An embedded vector index for the oceanrag query engine: exact
//! nearest-neighbor search over chunk embeddings, durable writes and
//! checksummed snapshots.
//!
//! ## Features
//!
//! - **Exact search**: every query scores every (filtered) entry, so results
//!   are deterministic with ties broken by insertion order
//! - **Copy-on-write state**: searches read a published version through
//!   `arc-swap` and never observe a half-applied batch
//! - **Durable writes**: a mutation is on disk before it is acknowledged
//! - **Snapshots**: self-describing, checksummed byte streams; restore is
//!   swap-or-nothing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use oceanrag_vector::{EntryMetadata, IndexConfig, IndexEntry, InsertMode, VectorIndex};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), oceanrag_vector::Error> {
//!     let index = VectorIndex::open(IndexConfig::memory(3)).await?;
//!
//!     let meta = EntryMetadata::new("doc1", "file://treaty.txt", 0);
//!     index
//!         .insert(vec![IndexEntry::new("chunk-1", vec![1.0, 0.0, 0.0], meta)], InsertMode::Strict)
//!         .await?;
//!
//!     let hits = index.search(&[1.0, 0.0, 0.0], 5, None)?;
//!     assert_eq!(hits[0].chunk_id, "chunk-1");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       VectorIndex                        │
//! │  ┌──────────────────────┐   ┌─────────────────────────┐  │
//! │  │ ArcSwap<IndexState>  │   │ write gate (Mutex)      │  │
//! │  │  lock-free readers   │   │  one mutation at a time │  │
//! │  └──────────────────────┘   └─────────────────────────┘  │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │ Persistence: metadata.json + vectors.bin (atomic)  │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod distance;
pub mod error;
mod index;
mod persistence;
pub mod snapshot;
pub mod types;

pub use config::IndexConfig;
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use persistence::write_atomic;
pub use snapshot::checksum_hex;
pub use types::{
    ChunkId, EntryMetadata, IndexEntry, IndexStats, InsertMode, SearchFilter, SearchHit,
};

use arc_swap::ArcSwap;
use index::IndexState;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Handle to a vector index.
///
/// Cheap to clone; all clones share the same state.
///
/// # Thread Safety
///
/// Searches load the current `Arc<IndexState>` without locking. Mutations
/// are serialized by an async mutex, build a new state, persist it and only
/// then publish it.
#[derive(Clone)]
pub struct VectorIndex {
    inner: Arc<VectorIndexInner>,
}

struct VectorIndexInner {
    config: IndexConfig,
    state: ArcSwap<IndexState>,
    write_gate: tokio::sync::Mutex<()>,
}

/// A decoded and verified snapshot, ready to be swapped in.
///
/// Produced by [`VectorIndex::prepare_restore`]; committing it is the only
/// step of a restore that changes the index.
pub struct PreparedRestore {
    state: Arc<IndexState>,
}

impl PreparedRestore {
    /// Number of entries the index will hold after commit.
    pub fn entry_count(&self) -> usize {
        self.state.len()
    }
}

impl VectorIndex {
    /// Open or create an index with the given configuration.
    ///
    /// Persistent indexes load any state saved at `data_path`.
    #[instrument(skip(config), fields(dimensions = config.dimensions, metric = %config.metric, persistent = config.data_path.is_some()))]
    pub async fn open(config: IndexConfig) -> Result<Self> {
        config.validate()?;

        let state = match config.data_path {
            Some(ref path) => persistence::load(&config, path).await?,
            None => IndexState::default(),
        };
        info!(entries = state.len(), "Opened vector index");

        Ok(Self {
            inner: Arc::new(VectorIndexInner {
                config,
                state: ArcSwap::from_pointee(state),
                write_gate: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Configured vector dimensionality.
    pub fn dimensions(&self) -> usize {
        self.inner.config.dimensions
    }

    /// Configured similarity metric.
    pub fn metric(&self) -> DistanceMetric {
        self.inner.config.metric
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.state.load().len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `chunk_id` is stored.
    pub fn contains(&self, chunk_id: &str) -> bool {
        self.inner.state.load().contains(chunk_id)
    }

    /// Fetch a stored entry.
    pub fn get(&self, chunk_id: &str) -> Option<IndexEntry> {
        self.inner.state.load().get(chunk_id).map(|e| IndexEntry {
            chunk_id: chunk_id.to_string(),
            vector: e.vector.clone(),
            metadata: e.metadata.clone(),
        })
    }

    /// Index statistics.
    pub fn stats(&self) -> IndexStats {
        let state = self.inner.state.load();
        IndexStats {
            entry_count: state.len(),
            dimensions: self.dimensions(),
            metric: self.metric(),
            memory_bytes: state.memory_bytes(self.dimensions()),
        }
    }

    /// Insert a batch of entries.
    ///
    /// The batch is validated as a whole first: a single bad vector or
    /// duplicate id rejects every entry and leaves the index unchanged.
    ///
    /// # Errors
    ///
    /// - [`Error::DimensionMismatch`] if any vector has the wrong length
    /// - [`Error::InvalidVector`] if any vector has non-finite components
    /// - [`Error::DuplicateKey`] on a repeated or (in strict mode) existing id
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    pub async fn insert(&self, entries: Vec<IndexEntry>, mode: InsertMode) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let _guard = self.inner.write_gate.lock().await;
        let current = self.inner.state.load_full();
        current.check_insert(&entries, self.dimensions(), mode)?;

        let mut next = IndexState::clone(&current);
        let inserted = next.apply_insert(entries);
        self.publish(next).await?;

        debug!(inserted, total = self.len(), "Inserted entries");
        Ok(inserted)
    }

    /// Search for the `k` entries most similar to `query`.
    ///
    /// Returns at most `k` hits ordered by score (descending), ties broken
    /// by insertion order. `k == 0` yields an empty result.
    pub fn search(&self, query: &[f32], k: usize, filter: Option<&SearchFilter>) -> Result<Vec<SearchHit>> {
        index::check_vector(query, self.dimensions())?;
        let state = self.inner.state.load();
        Ok(state.search(self.metric(), query, k, filter))
    }

    /// Delete entries by chunk id. Unknown ids are ignored.
    ///
    /// Returns the number of entries actually removed.
    #[instrument(skip(self, chunk_ids), fields(count = chunk_ids.len()))]
    pub async fn delete(&self, chunk_ids: &[ChunkId]) -> Result<usize> {
        let _guard = self.inner.write_gate.lock().await;
        let current = self.inner.state.load_full();
        if !chunk_ids.iter().any(|id| current.contains(id)) {
            return Ok(0);
        }

        let mut next = IndexState::clone(&current);
        let deleted = next.remove(chunk_ids);
        self.publish(next).await?;

        debug!(deleted, total = self.len(), "Deleted entries");
        Ok(deleted)
    }

    /// Serialize the current state into a self-describing snapshot.
    ///
    /// Runs against a single published version, so concurrent writers
    /// cannot tear it.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let state = self.inner.state.load_full();
        snapshot::encode(&state, self.dimensions(), self.metric())
    }

    /// Decode and verify a snapshot without touching the index.
    pub fn prepare_restore(&self, bytes: &[u8]) -> Result<PreparedRestore> {
        let state = snapshot::decode(bytes, self.dimensions(), self.metric())?;
        Ok(PreparedRestore {
            state: Arc::new(state),
        })
    }

    /// Swap a prepared snapshot in, returning the replaced state so the
    /// caller can roll back by committing it again.
    #[instrument(skip(self, prepared), fields(entries = prepared.entry_count()))]
    pub async fn commit_restore(&self, prepared: PreparedRestore) -> Result<PreparedRestore> {
        let _guard = self.inner.write_gate.lock().await;
        let previous = self.inner.state.load_full();
        self.persist(&prepared.state).await?;
        self.inner.state.store(prepared.state);
        info!(entries = self.len(), "Restored index");
        Ok(PreparedRestore { state: previous })
    }

    /// Replace the whole index with a snapshot.
    ///
    /// # Errors
    ///
    /// [`Error::CorruptSnapshot`] if the bytes fail verification; the index
    /// is left exactly as it was.
    pub async fn restore(&self, bytes: &[u8]) -> Result<()> {
        let prepared = self.prepare_restore(bytes).map_err(|e| {
            warn!(error = %e, "Rejected snapshot");
            e
        })?;
        self.commit_restore(prepared).await.map(|_| ())
    }

    async fn publish(&self, next: IndexState) -> Result<()> {
        let next = Arc::new(next);
        self.persist(&next).await?;
        self.inner.state.store(next);
        Ok(())
    }

    async fn persist(&self, state: &IndexState) -> Result<()> {
        match self.inner.config.data_path {
            Some(ref path) => persistence::save(&self.inner.config, path, state).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry::new(id, vector, EntryMetadata::new("doc1", "file://doc1", 0))
    }

    #[tokio::test]
    async fn test_insert_and_search() {
        let index = VectorIndex::open(IndexConfig::memory(3)).await.unwrap();
        index
            .insert(
                vec![
                    entry("vec1", vec![1.0, 0.0, 0.0]),
                    entry("vec2", vec![0.0, 1.0, 0.0]),
                    entry("vec3", vec![0.9, 0.1, 0.0]),
                ],
                InsertMode::Strict,
            )
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 10, None).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk_id, "vec1");
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_leaves_index_unchanged() {
        let index = VectorIndex::open(IndexConfig::memory(3)).await.unwrap();
        index
            .insert(vec![entry("keep", vec![1.0, 0.0, 0.0])], InsertMode::Strict)
            .await
            .unwrap();
        let before = index.snapshot().unwrap();

        let result = index
            .insert(
                vec![entry("ok", vec![0.0, 1.0, 0.0]), entry("bad", vec![1.0; 4])],
                InsertMode::Strict,
            )
            .await;
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { expected: 3, actual: 4 })
        ));
        assert_eq!(index.len(), 1);
        assert_eq!(index.snapshot().unwrap(), before);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        let index = VectorIndex::open(IndexConfig::memory(3)).await.unwrap();
        assert!(matches!(
            index.search(&[1.0, 0.0], 1, None),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let index = VectorIndex::open(IndexConfig::memory(3)).await.unwrap();
        index
            .insert(vec![entry("c", vec![1.0, 0.0, 0.0])], InsertMode::Strict)
            .await
            .unwrap();

        let ids = vec!["c".to_string()];
        assert_eq!(index.delete(&ids).await.unwrap(), 1);
        assert_eq!(index.delete(&ids).await.unwrap(), 0);
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_restore_round_trip() {
        let index = VectorIndex::open(IndexConfig::memory(3)).await.unwrap();
        index
            .insert(
                vec![entry("a", vec![1.0, 0.0, 0.0]), entry("b", vec![0.5, 0.5, 0.0])],
                InsertMode::Strict,
            )
            .await
            .unwrap();
        let query = [0.8, 0.2, 0.0];
        let expected = index.search(&query, 2, None).unwrap();
        let snapshot = index.snapshot().unwrap();

        let restored = VectorIndex::open(IndexConfig::memory(3)).await.unwrap();
        restored.restore(&snapshot).await.unwrap();
        assert_eq!(restored.search(&query, 2, None).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_corrupt_restore_keeps_state() {
        let index = VectorIndex::open(IndexConfig::memory(3)).await.unwrap();
        index
            .insert(vec![entry("a", vec![1.0, 0.0, 0.0])], InsertMode::Strict)
            .await
            .unwrap();
        let mut snapshot = index.snapshot().unwrap();
        index.delete(&["a".to_string()]).await.unwrap();
        index
            .insert(vec![entry("z", vec![0.0, 0.0, 1.0])], InsertMode::Strict)
            .await
            .unwrap();

        let mid = snapshot.len() / 2 + 20;
        let idx = mid.min(snapshot.len() - 1);
        snapshot[idx] ^= 0xFF;
        assert!(matches!(
            index.restore(&snapshot).await,
            Err(Error::CorruptSnapshot(_))
        ));
        assert!(index.contains("z"));
        assert!(!index.contains("a"));
    }

    #[tokio::test]
    async fn test_commit_restore_returns_previous() {
        let index = VectorIndex::open(IndexConfig::memory(2)).await.unwrap();
        index
            .insert(vec![entry("old", vec![1.0, 0.0])], InsertMode::Strict)
            .await
            .unwrap();
        let empty = VectorIndex::open(IndexConfig::memory(2)).await.unwrap();
        let prepared = index.prepare_restore(&empty.snapshot().unwrap()).unwrap();

        let previous = index.commit_restore(prepared).await.unwrap();
        assert!(index.is_empty());
        index.commit_restore(previous).await.unwrap();
        assert!(index.contains("old"));
    }

    #[tokio::test]
    async fn test_persistent_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = IndexConfig::persistent(temp_dir.path(), 3);
        {
            let index = VectorIndex::open(config.clone()).await.unwrap();
            index
                .insert(vec![entry("durable", vec![0.0, 1.0, 0.0])], InsertMode::Strict)
                .await
                .unwrap();
        }

        let reopened = VectorIndex::open(config).await.unwrap();
        assert!(reopened.contains("durable"));
        let hit = &reopened.search(&[0.0, 1.0, 0.0], 1, None).unwrap()[0];
        assert_eq!(hit.metadata.source_uri, "file://doc1");
    }

    #[tokio::test]
    async fn test_concurrent_searches_see_whole_batches() {
        let index = VectorIndex::open(IndexConfig::memory(2)).await.unwrap();
        let writer = {
            let index = index.clone();
            tokio::spawn(async move {
                for round in 0..20 {
                    let batch = (0..5)
                        .map(|i| entry(&format!("r{round}-{i}"), vec![1.0, i as f32]))
                        .collect();
                    index.insert(batch, InsertMode::Strict).await.unwrap();
                }
            })
        };

        for _ in 0..50 {
            assert_eq!(index.len() % 5, 0);
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        assert_eq!(index.len(), 100);
    }
}
