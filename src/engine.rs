//! The assembled question-answering engine.
//!
//! [`QueryEngine`] owns one index, one document store and the components
//! that operate on them. The HTTP handlers and the CLI both go through it.

use std::sync::Arc;

use oceanrag_vector::{IndexConfig, VectorIndex};
use tokio_util::sync::CancellationToken;
use chrono::Utc;
use tracing::info;

use crate::backup::{BackupCoordinator, BackupState, DEFAULT_SNAPSHOT_ID};
use crate::db::{ConsistencyGate, DocumentStore, FeedbackLog};
use crate::llm::{GenerationOptions, LLMClient, Provider};
use crate::rag::chunker::ChunkingPolicy;
use crate::rag::embeddings::{build_embedder, CachedEmbedder, EmbeddingProvider};
use crate::rag::ingest::{IngestSummary, IngestionPipeline};
use crate::rag::reranker;
use crate::rag::retrieval::RetrievalEngine;
use crate::rag::synthesis::AnswerSynthesizer;
use crate::types::{
    AppError, ChunkRecord, DeleteResponse, Document, FeedbackRecord, FeedbackRequest,
    FeedbackTag, IngestRequest, IngestResponse, QueryRequest, QueryResponse, Result,
    SnapshotManifest, StatsResponse,
};
use crate::utils::retry::RetryPolicy;
use crate::utils::toml_config::OceanConfig;

/// Largest `k` a single query may ask for.
pub const MAX_K: usize = 100;

pub struct QueryEngine {
    index: VectorIndex,
    store: DocumentStore,
    ingestion: IngestionPipeline,
    retrieval: RetrievalEngine,
    synthesizer: AnswerSynthesizer,
    backups: BackupCoordinator,
    feedback: FeedbackLog,
    query_embedder: Arc<CachedEmbedder>,
    chunking: ChunkingPolicy,
    default_k: usize,
    default_min_score: Option<f32>,
}

impl QueryEngine {
    /// Build the engine with the providers named in the config.
    pub async fn from_config(config: &OceanConfig) -> Result<Self> {
        let embedder = build_embedder(&config.embedding, config.index.dimensions)?;
        let provider = Provider::from_config(&config.generation)?;
        let llm: Arc<dyn LLMClient> =
            Arc::from(provider.create_client(GenerationOptions::from(&config.generation))?);
        info!(
            embedding_model = embedder.model_name(),
            generation_provider = provider.name(),
            generation_model = provider.model(),
            "Providers configured"
        );
        Self::with_components(config, embedder, llm).await
    }

    /// Build the engine around caller-supplied providers.
    pub async fn with_components(
        config: &OceanConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LLMClient>,
    ) -> Result<Self> {
        let index_config = match config.index_path() {
            Some(path) => IndexConfig::persistent(path, config.index.dimensions),
            None => IndexConfig::memory(config.index.dimensions),
        }
        .with_metric(config.index.metric)
        .with_sync_writes(config.storage.sync_writes);
        let index = VectorIndex::open(index_config).await?;

        let store = match config.documents_path() {
            Some(path) => DocumentStore::open(&path, config.storage.sync_writes).await?,
            None => DocumentStore::in_memory(),
        };

        let feedback = match config.feedback_path() {
            Some(path) => FeedbackLog::open(&path),
            None => FeedbackLog::in_memory(),
        };

        let gate = Arc::new(ConsistencyGate::new());
        let retry = RetryPolicy::from(&config.retry);
        let chunking = ChunkingPolicy::from(&config.chunking);
        chunking.validate()?;

        let query_embedder = Arc::new(CachedEmbedder::new(
            Arc::clone(&embedder),
            config.embedding.cache_capacity,
        ));

        let ingestion = IngestionPipeline::new(
            index.clone(),
            store.clone(),
            embedder,
            Arc::clone(&gate),
            retry.clone(),
            config.embedding.batch_size,
        );
        let retrieval = RetrievalEngine::new(
            index.clone(),
            store.clone(),
            query_embedder.clone(),
            Arc::clone(&gate),
            reranker::from_config(&config.retrieval.rerank),
            retry.clone(),
            config.retrieval.candidate_multiplier,
        );
        let synthesizer = AnswerSynthesizer::new(llm, retry, &config.synthesis);
        let backups = BackupCoordinator::new(
            index.clone(),
            store.clone(),
            gate,
            config.storage.backup_dir.clone(),
            config.storage.sync_writes,
        );

        Ok(Self {
            index,
            store,
            ingestion,
            retrieval,
            synthesizer,
            backups,
            feedback,
            query_embedder,
            chunking,
            default_k: config.retrieval.default_k,
            default_min_score: config.retrieval.min_score,
        })
    }

    /// Retrieve passages for a question and synthesize a grounded answer.
    pub async fn ask(&self, request: QueryRequest) -> Result<QueryResponse> {
        let k = request.k.unwrap_or(self.default_k);
        if k > MAX_K {
            return Err(AppError::Validation(format!(
                "k must be at most {}, got {}",
                MAX_K, k
            )));
        }
        let min_score = request.min_score.or(self.default_min_score);

        let passages = self
            .retrieval
            .retrieve(&request.question, k, min_score, request.document_ids.as_deref())
            .await?;
        let answer = self.synthesizer.answer(&request.question, &passages).await?;

        info!(
            question = %request.question,
            answer = %answer.text,
            grounded = answer.grounded,
            citations = ?answer.citations,
            confidence = answer.confidence,
            "Answered query"
        );
        Ok(QueryResponse { answer, passages })
    }

    /// Record a reader's verdict on an answer.
    pub async fn record_feedback(&self, request: FeedbackRequest) -> Result<FeedbackRecord> {
        if request.question.trim().is_empty() || request.answer.trim().is_empty() {
            return Err(AppError::Validation(
                "feedback needs the question and the answer".into(),
            ));
        }
        let mut tags: Vec<FeedbackTag> = Vec::with_capacity(request.tags.len());
        for tag in &request.tags {
            let tag: FeedbackTag = tag.parse()?;
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        let record = FeedbackRecord {
            id: uuid::Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            question: request.question,
            answer: request.answer,
            document_ids: request.document_ids,
            tags,
            comment: request.comment.filter(|c| !c.trim().is_empty()),
            name: request.name.filter(|n| !n.trim().is_empty()),
            model: self.synthesizer.model_name().to_string(),
        };
        self.feedback.append(&record).await?;
        Ok(record)
    }

    pub async fn feedback(&self) -> Result<Vec<FeedbackRecord>> {
        self.feedback.list().await
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResponse> {
        self.ingestion.ingest(request, &self.chunking).await
    }

    pub async fn ingest_all(
        &self,
        requests: Vec<IngestRequest>,
        cancel: &CancellationToken,
    ) -> IngestSummary {
        self.ingestion
            .ingest_all(requests, &self.chunking, cancel)
            .await
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<DeleteResponse> {
        self.ingestion.delete_document(document_id).await
    }

    pub fn document(&self, document_id: &str) -> Result<Document> {
        self.store.get(document_id)
    }

    pub fn chunk(&self, chunk_id: &str) -> Result<ChunkRecord> {
        self.store
            .get_chunk(chunk_id)
            .ok_or_else(|| AppError::NotFound(format!("chunk '{}'", chunk_id)))
    }

    pub fn documents(&self) -> Vec<Document> {
        self.store.list()
    }

    /// Back up under `snapshot_id`, or the default id `"1"`.
    pub async fn backup(&self, snapshot_id: Option<&str>) -> Result<SnapshotManifest> {
        self.backups
            .backup(snapshot_id.unwrap_or(DEFAULT_SNAPSHOT_ID))
            .await
    }

    /// Restore from `snapshot_id`, or the default id `"1"`.
    pub async fn restore(&self, snapshot_id: Option<&str>) -> Result<SnapshotManifest> {
        self.backups
            .restore(snapshot_id.unwrap_or(DEFAULT_SNAPSHOT_ID))
            .await
    }

    pub async fn backups(&self) -> Result<Vec<SnapshotManifest>> {
        self.backups.list().await
    }

    pub fn backup_state(&self) -> BackupState {
        self.backups.state()
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn stats(&self) -> StatsResponse {
        let index = self.index.stats();
        let cache = self.query_embedder.cache_stats();
        StatsResponse {
            documents: self.store.len(),
            chunks: self.store.chunk_count(),
            index_entries: index.entry_count,
            dimensions: index.dimensions,
            metric: index.metric.to_string(),
            backup_state: self.backups.state().to_string(),
            query_cache_hits: cache.hits,
            query_cache_misses: cache.misses,
            reranker: self.retrieval.reranker_name().to_string(),
            model: self.synthesizer.model_name().to_string(),
        }
    }
}
