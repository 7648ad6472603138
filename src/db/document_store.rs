//! Document and chunk text store.
//!
//! Holds the source documents and the text of every chunk. Vectors live in
//! the [`VectorIndex`](oceanrag_vector::VectorIndex); the two are joined by
//! chunk id at query time.
//!
//! Reads load an immutable `Arc<StoreState>` without locking. Mutations are
//! serialized, written to `documents.json` (when persistent) and then
//! published.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::types::{AppError, ChunkRecord, Document, Result};

#[derive(Debug, Clone, Default)]
struct StoreState {
    documents: BTreeMap<String, Document>,
    chunks: HashMap<String, ChunkRecord>,
    /// Chunk ids per document, in sequence order
    by_document: HashMap<String, Vec<String>>,
}

/// On-disk and snapshot form of the store.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    documents: Vec<Document>,
    chunks: Vec<ChunkRecord>,
}

impl StoreState {
    fn insert(&mut self, document: Document, mut chunks: Vec<ChunkRecord>) {
        chunks.sort_by_key(|c| c.sequence_index);
        let ids = chunks.iter().map(|c| c.chunk_id.clone()).collect();
        for chunk in chunks {
            self.chunks.insert(chunk.chunk_id.clone(), chunk);
        }
        self.by_document.insert(document.id.clone(), ids);
        self.documents.insert(document.id.clone(), document);
    }

    fn remove(&mut self, document_id: &str) -> Option<Vec<String>> {
        self.documents.remove(document_id)?;
        let ids = self.by_document.remove(document_id).unwrap_or_default();
        for id in &ids {
            self.chunks.remove(id);
        }
        Some(ids)
    }

    fn to_file(&self) -> StoreFile {
        let documents: Vec<Document> = self.documents.values().cloned().collect();
        let chunks = documents
            .iter()
            .flat_map(|d| self.by_document.get(&d.id).into_iter().flatten())
            .filter_map(|id| self.chunks.get(id).cloned())
            .collect();
        StoreFile { documents, chunks }
    }

    fn from_file(file: StoreFile) -> Result<Self> {
        let mut grouped: HashMap<String, Vec<ChunkRecord>> = HashMap::new();
        let mut seen = std::collections::HashSet::new();
        for chunk in file.chunks {
            if !seen.insert(chunk.chunk_id.clone()) {
                return Err(AppError::CorruptSnapshot(format!(
                    "duplicate chunk id '{}'",
                    chunk.chunk_id
                )));
            }
            grouped
                .entry(chunk.document_id.clone())
                .or_default()
                .push(chunk);
        }

        let mut state = StoreState::default();
        for document in file.documents {
            if state.documents.contains_key(&document.id) {
                return Err(AppError::CorruptSnapshot(format!(
                    "duplicate document id '{}'",
                    document.id
                )));
            }
            let chunks = grouped.remove(&document.id).unwrap_or_default();
            state.insert(document, chunks);
        }

        if let Some(orphan) = grouped.keys().next() {
            return Err(AppError::CorruptSnapshot(format!(
                "chunks reference unknown document '{}'",
                orphan
            )));
        }
        Ok(state)
    }
}

/// A decoded document snapshot, ready to be swapped in.
pub struct PreparedDocuments {
    state: Arc<StoreState>,
}

impl PreparedDocuments {
    pub fn document_count(&self) -> usize {
        self.state.documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.state.chunks.len()
    }

    /// Every chunk id in the snapshot.
    pub fn chunk_ids(&self) -> impl Iterator<Item = &str> {
        self.state.chunks.keys().map(String::as_str)
    }
}

#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: Option<PathBuf>,
    sync_writes: bool,
    state: ArcSwap<StoreState>,
    write_gate: tokio::sync::Mutex<()>,
}

impl DocumentStore {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self::with_state(None, false, StoreState::default())
    }

    /// Open a store persisted at `path`, loading it if the file exists.
    #[instrument]
    pub async fn open(path: &Path, sync_writes: bool) -> Result<Self> {
        let state = match tokio::fs::read(path).await {
            Ok(bytes) => {
                let file: StoreFile = serde_json::from_slice(&bytes).map_err(|e| {
                    AppError::Storage(format!("Failed to parse {}: {}", path.display(), e))
                })?;
                StoreState::from_file(file)
                    .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(e.into()),
        };
        info!(
            documents = state.documents.len(),
            chunks = state.chunks.len(),
            "Opened document store"
        );
        Ok(Self::with_state(Some(path.to_path_buf()), sync_writes, state))
    }

    fn with_state(path: Option<PathBuf>, sync_writes: bool, state: StoreState) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path,
                sync_writes,
                state: ArcSwap::from_pointee(state),
                write_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn get(&self, document_id: &str) -> Result<Document> {
        self.inner
            .state
            .load()
            .documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("document '{}'", document_id)))
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.inner.state.load().documents.contains_key(document_id)
    }

    pub fn get_chunk(&self, chunk_id: &str) -> Option<ChunkRecord> {
        self.inner.state.load().chunks.get(chunk_id).cloned()
    }

    /// Look up a chunk together with its document.
    pub fn chunk_with_document(&self, chunk_id: &str) -> Option<(ChunkRecord, Document)> {
        let state = self.inner.state.load();
        let chunk = state.chunks.get(chunk_id)?;
        let document = state.documents.get(&chunk.document_id)?;
        Some((chunk.clone(), document.clone()))
    }

    /// Chunks of a document in sequence order.
    pub fn chunks_for(&self, document_id: &str) -> Vec<ChunkRecord> {
        let state = self.inner.state.load();
        state
            .by_document
            .get(document_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.chunks.get(id).cloned())
            .collect()
    }

    /// All documents ordered by id.
    pub fn list(&self) -> Vec<Document> {
        self.inner.state.load().documents.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.state.load().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.inner.state.load().chunks.len()
    }

    /// Insert or update a document record, keeping any chunks it already has.
    /// Last write wins.
    #[instrument(skip(self, document), fields(document_id = %document.id))]
    pub async fn put(&self, document: Document) -> Result<()> {
        let _guard = self.inner.write_gate.lock().await;
        let mut next = StoreState::clone(&self.inner.state.load_full());
        next.by_document.entry(document.id.clone()).or_default();
        next.documents.insert(document.id.clone(), document);
        self.publish(next).await
    }

    /// Store a document and its chunks in one step.
    ///
    /// With `replace`, an existing document with the same id is swapped out
    /// and its chunk ids are returned so the caller can drop their vectors.
    /// Without it, an existing id is a [`AppError::DuplicateKey`].
    #[instrument(skip(self, document, chunks), fields(document_id = %document.id, chunks = chunks.len()))]
    pub async fn commit(
        &self,
        document: Document,
        chunks: Vec<ChunkRecord>,
        replace: bool,
    ) -> Result<Vec<String>> {
        if let Some(bad) = chunks.iter().find(|c| c.document_id != document.id) {
            return Err(AppError::Validation(format!(
                "chunk '{}' belongs to '{}', not '{}'",
                bad.chunk_id, bad.document_id, document.id
            )));
        }

        let _guard = self.inner.write_gate.lock().await;
        let current = self.inner.state.load_full();
        if current.documents.contains_key(&document.id) && !replace {
            return Err(AppError::DuplicateKey(format!(
                "document '{}' already exists",
                document.id
            )));
        }
        if let Some(clash) = chunks
            .iter()
            .find(|c| current.chunks.contains_key(&c.chunk_id))
        {
            return Err(AppError::DuplicateKey(format!(
                "chunk '{}' already exists",
                clash.chunk_id
            )));
        }

        let mut next = StoreState::clone(&current);
        let replaced = next.remove(&document.id).unwrap_or_default();
        next.insert(document, chunks);
        self.publish(next).await?;

        debug!(replaced = replaced.len(), "Committed document");
        Ok(replaced)
    }

    /// Remove a document and its chunks, returning the removed chunk ids,
    /// or `None` if the document does not exist.
    #[instrument(skip(self))]
    pub async fn remove_document(&self, document_id: &str) -> Result<Option<Vec<String>>> {
        let _guard = self.inner.write_gate.lock().await;
        let current = self.inner.state.load_full();
        if !current.documents.contains_key(document_id) {
            return Ok(None);
        }

        let mut next = StoreState::clone(&current);
        let removed = next.remove(document_id);
        self.publish(next).await?;
        Ok(removed)
    }

    /// Serialize the current state. Output is deterministic for a given state.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let file = self.inner.state.load().to_file();
        serde_json::to_vec(&file)
            .map_err(|e| AppError::Internal(format!("Failed to serialize documents: {}", e)))
    }

    /// Decode and verify a snapshot without touching the store.
    pub fn prepare_restore(&self, bytes: &[u8]) -> Result<PreparedDocuments> {
        let file: StoreFile = serde_json::from_slice(bytes)
            .map_err(|e| AppError::CorruptSnapshot(format!("document snapshot: {}", e)))?;
        Ok(PreparedDocuments {
            state: Arc::new(StoreState::from_file(file)?),
        })
    }

    /// Swap a prepared snapshot in, returning the replaced state.
    pub async fn commit_restore(&self, prepared: PreparedDocuments) -> Result<PreparedDocuments> {
        let _guard = self.inner.write_gate.lock().await;
        let previous = self.inner.state.load_full();
        self.persist(&prepared.state).await?;
        self.inner.state.store(prepared.state);
        Ok(PreparedDocuments { state: previous })
    }

    async fn publish(&self, next: StoreState) -> Result<()> {
        let next = Arc::new(next);
        self.persist(&next).await?;
        self.inner.state.store(next);
        Ok(())
    }

    async fn persist(&self, state: &StoreState) -> Result<()> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(&state.to_file())
            .map_err(|e| AppError::Internal(format!("Failed to serialize documents: {}", e)))?;
        oceanrag_vector::write_atomic(path, &bytes, self.inner.sync_writes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn document(id: &str) -> Document {
        Document {
            id: id.to_string(),
            source_uri: format!("file://{}.txt", id),
            title: id.to_uppercase(),
            raw_text: "text".to_string(),
            ingested_at: Utc::now(),
        }
    }

    fn chunk(document_id: &str, seq: u32) -> ChunkRecord {
        ChunkRecord {
            chunk_id: format!("{}-{}", document_id, seq),
            document_id: document_id.to_string(),
            sequence_index: seq,
            text: format!("chunk {} of {}", seq, document_id),
            header: None,
        }
    }

    #[tokio::test]
    async fn test_commit_and_lookup() {
        let store = DocumentStore::in_memory();
        store
            .commit(document("a"), vec![chunk("a", 1), chunk("a", 0)], false)
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.chunk_count(), 2);
        let chunks = store.chunks_for("a");
        assert_eq!(chunks[0].sequence_index, 0);
        assert_eq!(chunks[1].sequence_index, 1);
        let (c, d) = store.chunk_with_document("a-1").unwrap();
        assert_eq!(c.sequence_index, 1);
        assert_eq!(d.title, "A");
    }

    #[tokio::test]
    async fn test_put_is_idempotent_upsert() {
        let store = DocumentStore::in_memory();
        store.put(document("a")).await.unwrap();
        store.put(document("a")).await.unwrap();
        assert_eq!(store.len(), 1);

        let mut renamed = document("a");
        renamed.title = "Renamed".to_string();
        store.put(renamed).await.unwrap();
        assert_eq!(store.get("a").unwrap().title, "Renamed");
        assert!(matches!(store.get("missing"), Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_document_rejected() {
        let store = DocumentStore::in_memory();
        store.commit(document("a"), vec![chunk("a", 0)], false).await.unwrap();
        let err = store
            .commit(document("a"), vec![chunk("a", 5)], false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey(_)));
        assert_eq!(store.chunks_for("a").len(), 1);
    }

    #[tokio::test]
    async fn test_replace_returns_old_chunks() {
        let store = DocumentStore::in_memory();
        store
            .commit(document("a"), vec![chunk("a", 0), chunk("a", 1)], false)
            .await
            .unwrap();
        let mut replacement = chunk("a", 0);
        replacement.chunk_id = "a-new".to_string();
        let replaced = store.commit(document("a"), vec![replacement], true).await.unwrap();

        assert_eq!(replaced, vec!["a-0".to_string(), "a-1".to_string()]);
        assert!(store.get_chunk("a-0").is_none());
        assert!(store.get_chunk("a-new").is_some());
    }

    #[tokio::test]
    async fn test_remove_document() {
        let store = DocumentStore::in_memory();
        store.commit(document("a"), vec![chunk("a", 0)], false).await.unwrap();
        assert_eq!(
            store.remove_document("a").await.unwrap(),
            Some(vec!["a-0".to_string()])
        );
        assert_eq!(store.remove_document("a").await.unwrap(), None);
        assert!(store.is_empty());
        assert_eq!(store.chunk_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_restore_and_rollback() {
        let store = DocumentStore::in_memory();
        store.commit(document("a"), vec![chunk("a", 0)], false).await.unwrap();
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot, store.snapshot().unwrap());

        store.commit(document("b"), vec![chunk("b", 0)], false).await.unwrap();
        let prepared = store.prepare_restore(&snapshot).unwrap();
        assert_eq!(prepared.document_count(), 1);

        let previous = store.commit_restore(prepared).await.unwrap();
        assert!(!store.contains("b"));
        assert_eq!(previous.document_count(), 2);

        store.commit_restore(previous).await.unwrap();
        assert!(store.contains("b"));
    }

    #[test]
    fn test_prepare_restore_rejects_garbage() {
        let store = DocumentStore::in_memory();
        assert!(matches!(
            store.prepare_restore(b"not json"),
            Err(AppError::CorruptSnapshot(_))
        ));
        let orphan = serde_json::to_vec(&StoreFile {
            documents: vec![],
            chunks: vec![chunk("ghost", 0)],
        })
        .unwrap();
        assert!(matches!(
            store.prepare_restore(&orphan),
            Err(AppError::CorruptSnapshot(_))
        ));
    }

    #[tokio::test]
    async fn test_persistent_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("documents.json");
        {
            let store = DocumentStore::open(&path, false).await.unwrap();
            store.commit(document("a"), vec![chunk("a", 0)], false).await.unwrap();
        }
        let store = DocumentStore::open(&path, false).await.unwrap();
        assert!(store.contains("a"));
        assert_eq!(store.chunks_for("a").len(), 1);
    }
}
