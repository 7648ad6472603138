//! Document ingestion: chunk, embed, store, index.
//!
//! Ingestion is all-or-nothing per document. Every chunk is embedded before
//! anything is written; the document store commit is rolled back if the
//! index rejects the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use oceanrag_vector::{EntryMetadata, IndexEntry, InsertMode, VectorIndex};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::db::{ConsistencyGate, DocumentStore};
use crate::rag::chunker::{ChunkingPolicy, TextChunker};
use crate::rag::embeddings::{check_batch, EmbeddingProvider};
use crate::types::{
    AppError, ChunkRecord, DeleteResponse, Document, IngestRequest, IngestResponse, Result,
};
use crate::utils::retry::{ProviderKind, RetryPolicy};

pub struct IngestionPipeline {
    index: VectorIndex,
    store: DocumentStore,
    embedder: Arc<dyn EmbeddingProvider>,
    gate: Arc<ConsistencyGate>,
    retry: RetryPolicy,
    batch_size: usize,
}

/// Outcome of a multi-document ingestion run.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub ingested: Vec<IngestResponse>,
    /// `(source_uri, error)` for each document that failed
    pub failed: Vec<(String, String)>,
    /// Set when the run stopped early; later documents were not attempted.
    pub cancelled: bool,
}

impl IngestionPipeline {
    pub fn new(
        index: VectorIndex,
        store: DocumentStore,
        embedder: Arc<dyn EmbeddingProvider>,
        gate: Arc<ConsistencyGate>,
        retry: RetryPolicy,
        batch_size: usize,
    ) -> Self {
        Self {
            index,
            store,
            embedder,
            gate,
            retry,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest one document and return its id and chunk ids in sequence order.
    #[instrument(skip(self, request, policy), fields(source_uri = %request.source_uri))]
    pub async fn ingest(
        &self,
        request: IngestRequest,
        policy: &ChunkingPolicy,
    ) -> Result<IngestResponse> {
        if request.source_uri.trim().is_empty() {
            return Err(AppError::Validation("source_uri must not be empty".into()));
        }
        if request.text.trim().is_empty() {
            return Err(AppError::Validation("document text must not be empty".into()));
        }

        let document_id = match request.document_id {
            Some(ref id) if id.trim().is_empty() => {
                return Err(AppError::Validation("document_id must not be empty".into()))
            }
            Some(ref id) => id.clone(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        if !request.replace && self.store.contains(&document_id) {
            return Err(AppError::DuplicateKey(format!(
                "document '{}' already exists",
                document_id
            )));
        }

        let chunks = TextChunker::new(policy.clone())?.chunk(&request.text)?;
        if chunks.is_empty() {
            return Err(AppError::Validation(
                "document produced no chunks".to_string(),
            ));
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_all(&texts).await?;

        let title = request
            .title
            .clone()
            .unwrap_or_else(|| title_from_uri(&request.source_uri));
        let document = Document {
            id: document_id.clone(),
            source_uri: request.source_uri.clone(),
            title,
            raw_text: request.text,
            ingested_at: Utc::now(),
        };

        let mut records = Vec::with_capacity(chunks.len());
        let mut entries = Vec::with_capacity(chunks.len());
        for (seq, (chunk, vector)) in chunks.into_iter().zip(vectors).enumerate() {
            let chunk_id = uuid::Uuid::new_v4().to_string();
            let sequence_index = seq as u32;
            entries.push(IndexEntry::new(
                chunk_id.clone(),
                vector,
                EntryMetadata::new(&document_id, &request.source_uri, sequence_index),
            ));
            records.push(ChunkRecord {
                chunk_id,
                document_id: document_id.clone(),
                sequence_index,
                text: chunk.text,
                header: chunk.header,
            });
        }
        let chunk_ids: Vec<String> = records.iter().map(|r| r.chunk_id.clone()).collect();

        let _permit = self.gate.mutation().await;

        let previous = if request.replace {
            self.store
                .get(&document_id)
                .ok()
                .map(|doc| (doc, self.store.chunks_for(&document_id)))
        } else {
            None
        };

        let replaced = self.store.commit(document, records, request.replace).await?;

        if let Err(err) = self.index.insert(entries, InsertMode::Strict).await {
            warn!(document_id = %document_id, error = %err, "Index rejected chunks, rolling back");
            let rollback = self.rollback(&document_id, previous).await;
            return Err(rollback_error(err.into(), rollback));
        }

        if !replaced.is_empty() {
            let removed = self
                .index
                .delete(&replaced)
                .await
                .map_err(|e| superseded_error(&document_id, replaced.len(), e.into()))?;
            debug!(removed, "Dropped superseded chunks");
        }

        info!(
            document_id = %document_id,
            chunks = chunk_ids.len(),
            "Ingested document"
        );
        Ok(IngestResponse {
            document_id,
            chunk_ids,
        })
    }

    /// Ingest documents one at a time, stopping before the next document
    /// once `cancel` fires. Failures are recorded and do not stop the run.
    pub async fn ingest_all(
        &self,
        requests: Vec<IngestRequest>,
        policy: &ChunkingPolicy,
        cancel: &CancellationToken,
    ) -> IngestSummary {
        let mut summary = IngestSummary::default();
        for request in requests {
            if cancel.is_cancelled() {
                info!(
                    completed = summary.ingested.len(),
                    "Ingestion cancelled"
                );
                summary.cancelled = true;
                break;
            }
            let source_uri = request.source_uri.clone();
            match self.ingest(request, policy).await {
                Ok(response) => summary.ingested.push(response),
                Err(err) => {
                    warn!(source_uri = %source_uri, error = %err, "Document failed to ingest");
                    summary.failed.push((source_uri, err.to_string()));
                }
            }
        }
        summary
    }

    /// Remove a document, its chunk text and its vectors.
    #[instrument(skip(self))]
    pub async fn delete_document(&self, document_id: &str) -> Result<DeleteResponse> {
        let _permit = self.gate.mutation().await;
        let chunk_ids = self
            .store
            .remove_document(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("document '{}'", document_id)))?;
        let deleted_chunks = self.index.delete(&chunk_ids).await?;
        info!(deleted_chunks, "Deleted document");
        Ok(DeleteResponse {
            document_id: document_id.to_string(),
            deleted_chunks,
        })
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self
                .retry
                .run(ProviderKind::Embedding, "embed_batch", || {
                    self.embedder.embed_batch(batch)
                })
                .await?;
            check_batch(batch.len(), &embedded)?;
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    async fn rollback(
        &self,
        document_id: &str,
        previous: Option<(Document, Vec<ChunkRecord>)>,
    ) -> Result<()> {
        match previous {
            Some((document, chunks)) => self.store.commit(document, chunks, true).await.map(|_| ()),
            None => self.store.remove_document(document_id).await.map(|_| ()),
        }
    }
}

/// The original failure, or both failures when the store could not be put back.
fn rollback_error(err: AppError, rollback: Result<()>) -> AppError {
    match rollback {
        Ok(()) => err,
        Err(rollback) => {
            error!(error = %rollback, "Rollback of document store failed");
            AppError::Storage(format!("{}; rollback failed: {}", err, rollback))
        }
    }
}

fn superseded_error(document_id: &str, count: usize, err: AppError) -> AppError {
    error!(document_id, count, error = %err, "Superseded vectors left in the index");
    AppError::Storage(format!(
        "document '{}' was replaced but {} superseded vectors could not be removed: {}",
        document_id, count, err
    ))
}

fn title_from_uri(source_uri: &str) -> String {
    source_uri
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(source_uri)
        .to_string()
}

// ============= Manifest =============

/// Bulk ingestion manifest:
///
/// ```toml
/// [[documents]]
/// id = "bbnj-draft"
/// title = "Revised draft text of an agreement under UNCLOS"
/// source_uri = "https://undocs.org/A/CONF.232/2020/3"
/// path = "docs/bbnj-draft.txt"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentManifest {
    #[serde(default)]
    pub documents: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub source_uri: Option<String>,
    pub path: PathBuf,
    #[serde(default)]
    pub replace: bool,
}

impl DocumentManifest {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Validation(format!("Invalid manifest: {}", e)))
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Validation(format!("Cannot read manifest {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Read every listed file. Relative paths resolve against `base_dir`.
    pub async fn into_requests(self, base_dir: &Path) -> Result<Vec<IngestRequest>> {
        let mut requests = Vec::with_capacity(self.documents.len());
        for entry in self.documents {
            let path = if entry.path.is_absolute() {
                entry.path.clone()
            } else {
                base_dir.join(&entry.path)
            };
            let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
                AppError::Validation(format!("Cannot read {}: {}", path.display(), e))
            })?;
            requests.push(IngestRequest {
                source_uri: entry
                    .source_uri
                    .unwrap_or_else(|| path.display().to_string()),
                text,
                title: entry.title,
                document_id: entry.id,
                replace: entry.replace,
            });
        }
        Ok(requests)
    }
}
