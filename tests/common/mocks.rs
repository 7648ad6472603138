//! Mock providers and engine builders shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use oceanrag::llm::LLMClient;
use oceanrag::rag::embeddings::{EmbeddingProvider, HashEmbedder};
use oceanrag::types::{AppError, Result};
use oceanrag::utils::toml_config::{ChunkStrategy, OceanConfig};
use oceanrag::QueryEngine;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const DIMENSIONS: usize = 512;

/// Mock LLM client that records every prompt it receives.
pub struct MockLLMClient {
    response: String,
    should_fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockLLMClient {
    /// Create a mock client that returns the given response.
    pub fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: response.to_string(),
            should_fail: false,
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            response: String::new(),
            should_fail: true,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if self.should_fail {
            return Err(AppError::SynthesisProvider("Mock LLM failure".to_string()));
        }
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Hash-based embedder that can be told to fail from a given call onwards.
pub struct MockEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
    fail_from_call: Option<usize>,
}

impl MockEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: HashEmbedder::new(DIMENSIONS),
            calls: AtomicUsize::new(0),
            fail_from_call: None,
        })
    }

    /// Calls numbered `call` and later fail (1-based).
    pub fn failing_from(call: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: HashEmbedder::new(DIMENSIONS),
            calls: AtomicUsize::new(0),
            fail_from_call: Some(call),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_from_call.is_some_and(|n| call >= n) {
            return Err(AppError::EmbeddingProvider(format!(
                "Mock embedding failure on call {}",
                call
            )));
        }
        self.inner.embed_batch(texts).await
    }

    fn model_name(&self) -> &str {
        "mock-embedder"
    }
}

/// A config rooted at `dir` with fast retries and word chunking.
pub fn test_config(dir: &Path) -> OceanConfig {
    let mut config = OceanConfig::default();
    config.storage.data_dir = dir.join("data");
    config.storage.backup_dir = dir.join("backups");
    config.storage.in_memory = false;
    config.storage.sync_writes = false;
    config.index.dimensions = DIMENSIONS;
    config.chunking.strategy = ChunkStrategy::Words;
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 0;
    config.embedding.batch_size = 8;
    config.retry.max_attempts = 2;
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 2;
    config.retry.timeout_secs = 5;
    config
}

pub async fn engine_with(
    config: &OceanConfig,
    embedder: Arc<MockEmbedder>,
    llm: Arc<MockLLMClient>,
) -> QueryEngine {
    QueryEngine::with_components(config, embedder, llm)
        .await
        .expect("engine should build")
}
