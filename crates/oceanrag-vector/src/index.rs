//! Exact nearest-neighbor index state.
//!
//! `IndexState` is an immutable value once published: writers clone it,
//! apply a change and swap the new version in, so a search always runs
//! against one complete version of the index.

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::types::{ChunkId, EntryMetadata, IndexEntry, InsertMode, SearchFilter, SearchHit};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

/// A stored vector with its insertion sequence number.
#[derive(Debug)]
pub(crate) struct StoredEntry {
    pub seq: u64,
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// One published version of the index.
#[derive(Debug, Clone, Default)]
pub(crate) struct IndexState {
    entries: HashMap<ChunkId, Arc<StoredEntry>>,
    /// Next insertion sequence number; never decreases, so deleted ids
    /// leave gaps rather than being reused.
    next_seq: u64,
}

impl IndexState {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.entries.contains_key(chunk_id)
    }

    pub fn get(&self, chunk_id: &str) -> Option<&Arc<StoredEntry>> {
        self.entries.get(chunk_id)
    }

    /// Entries in insertion order.
    pub fn ordered(&self) -> Vec<(&ChunkId, &Arc<StoredEntry>)> {
        let mut all: Vec<_> = self.entries.iter().collect();
        all.sort_by_key(|(_, e)| e.seq);
        all
    }

    /// Rebuild a state from persisted parts.
    pub fn from_parts(entries: Vec<(ChunkId, StoredEntry)>, next_seq: u64) -> Self {
        let entries = entries
            .into_iter()
            .map(|(id, e)| (id, Arc::new(e)))
            .collect();
        Self { entries, next_seq }
    }

    pub fn memory_bytes(&self, dimensions: usize) -> usize {
        self.entries.len() * dimensions * std::mem::size_of::<f32>()
    }

    /// Validate a batch against this state without changing anything.
    ///
    /// Insert is all-or-nothing, so every check runs before the first write.
    pub fn check_insert(&self, batch: &[IndexEntry], dimensions: usize, mode: InsertMode) -> Result<()> {
        let mut seen = HashSet::with_capacity(batch.len());
        for entry in batch {
            check_vector(&entry.vector, dimensions)?;
            if entry.chunk_id.is_empty() {
                return Err(Error::InvalidVector("chunk id must not be empty".to_string()));
            }
            if !seen.insert(entry.chunk_id.as_str()) {
                return Err(Error::DuplicateKey(entry.chunk_id.clone()));
            }
            if mode == InsertMode::Strict && self.entries.contains_key(&entry.chunk_id) {
                return Err(Error::DuplicateKey(entry.chunk_id.clone()));
            }
        }
        Ok(())
    }

    /// Apply a batch that already passed `check_insert`.
    pub fn apply_insert(&mut self, batch: Vec<IndexEntry>) -> usize {
        let count = batch.len();
        for entry in batch {
            let seq = match self.entries.get(&entry.chunk_id) {
                Some(existing) => existing.seq,
                None => {
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    seq
                }
            };
            self.entries.insert(
                entry.chunk_id,
                Arc::new(StoredEntry {
                    seq,
                    vector: entry.vector,
                    metadata: entry.metadata,
                }),
            );
        }
        count
    }

    /// Remove ids, returning how many were present.
    pub fn remove(&mut self, chunk_ids: &[ChunkId]) -> usize {
        chunk_ids
            .iter()
            .filter(|id| self.entries.remove(id.as_str()).is_some())
            .count()
    }

    /// Score every matching entry and return the best `k`.
    ///
    /// Ordering is score descending, then insertion sequence ascending.
    pub fn search(
        &self,
        metric: DistanceMetric,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Vec<SearchHit> {
        if k == 0 || self.entries.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<Scored<'_>> = self
            .entries
            .iter()
            .filter(|(_, e)| filter.is_none_or(|f| f.matches(&e.metadata)))
            .map(|(id, e)| (metric.similarity(query, &e.vector), e.seq, id, e.as_ref()))
            .collect();

        trace!(candidates = scored.len(), k, "Scored index entries");

        if scored.len() > k {
            scored.select_nth_unstable_by(k - 1, by_rank);
            scored.truncate(k);
        }
        scored.sort_by(by_rank);

        scored
            .into_iter()
            .map(|(score, _, id, e)| SearchHit {
                chunk_id: id.clone(),
                score,
                metadata: e.metadata.clone(),
            })
            .collect()
    }
}

type Scored<'a> = (f32, u64, &'a ChunkId, &'a StoredEntry);

fn by_rank(a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
    b.0.partial_cmp(&a.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.1.cmp(&b.1))
}

/// Check length and finiteness of a vector.
pub(crate) fn check_vector(vector: &[f32], dimensions: usize) -> Result<()> {
    if vector.len() != dimensions {
        return Err(Error::DimensionMismatch {
            expected: dimensions,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidVector(
            "vector contains NaN or infinite components".to_string(),
        ));
    }
    Ok(())
}
