//! Query-time retrieval: embed, search, filter, re-rank.

use std::sync::Arc;

use chrono::Utc;
use oceanrag_vector::{SearchFilter, VectorIndex};
use tracing::{debug, instrument};

use crate::db::{ConsistencyGate, DocumentStore};
use crate::rag::embeddings::EmbeddingProvider;
use crate::rag::reranker::RerankStrategy;
use crate::types::{AppError, Result, RetrievalResult};
use crate::utils::retry::{ProviderKind, RetryPolicy};

pub struct RetrievalEngine {
    index: VectorIndex,
    store: DocumentStore,
    embedder: Arc<dyn EmbeddingProvider>,
    gate: Arc<ConsistencyGate>,
    reranker: Box<dyn RerankStrategy>,
    retry: RetryPolicy,
    candidate_multiplier: usize,
}

impl RetrievalEngine {
    pub fn new(
        index: VectorIndex,
        store: DocumentStore,
        embedder: Arc<dyn EmbeddingProvider>,
        gate: Arc<ConsistencyGate>,
        reranker: Box<dyn RerankStrategy>,
        retry: RetryPolicy,
        candidate_multiplier: usize,
    ) -> Self {
        Self {
            index,
            store,
            embedder,
            gate,
            reranker,
            retry,
            candidate_multiplier: candidate_multiplier.max(1),
        }
    }

    pub fn reranker_name(&self) -> &'static str {
        self.reranker.name()
    }

    /// Up to `k` passages ordered by score, highest first.
    ///
    /// An empty index, or nothing scoring at least `min_score`, yields an
    /// empty list. `k == 0` returns immediately without embedding the query.
    #[instrument(skip(self, query, document_ids), fields(query_len = query.len()))]
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        min_score: Option<f32>,
        document_ids: Option<&[String]>,
    ) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if query.trim().is_empty() {
            return Err(AppError::Validation("query must not be empty".into()));
        }
        if let Some(score) = min_score {
            if !score.is_finite() {
                return Err(AppError::Validation("min_score must be finite".into()));
            }
        }
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let vector = self
            .retry
            .run(ProviderKind::Embedding, "embed_query", || self.embedder.embed(query))
            .await?;

        let filter = document_ids.map(|ids| SearchFilter::documents(ids.iter().cloned()));
        let candidates = k.saturating_mul(self.candidate_multiplier);

        let mut results = {
            let _permit = self.gate.query().await;
            let hits = self.index.search(&vector, candidates, filter.as_ref())?;
            hits.into_iter()
                .filter(|hit| min_score.is_none_or(|min| hit.score >= min))
                .filter_map(|hit| {
                    let (chunk, document) = self.store.chunk_with_document(&hit.chunk_id)?;
                    Some(RetrievalResult {
                        chunk_id: hit.chunk_id,
                        score: hit.score,
                        text_span: chunk.text,
                        source_uri: document.source_uri,
                        document_id: document.id,
                        document_title: document.title,
                        header: chunk.header,
                        sequence_index: chunk.sequence_index,
                        ingested_at: document.ingested_at,
                    })
                })
                .collect::<Vec<_>>()
        };

        self.reranker.rerank(&mut results, Utc::now());
        // Stable: equal scores keep index order
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(k);

        debug!(
            candidates,
            returned = results.len(),
            reranker = self.reranker.name(),
            "Retrieved passages"
        );
        Ok(results)
    }
}
