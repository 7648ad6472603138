//! Embedding providers
//!
//! Every provider maps a batch of texts to one vector per text, in input
//! order. Ingestion and retrieval only see the [`EmbeddingProvider`] trait:
//!
//! - [`HashEmbedder`] - deterministic hashed bag-of-words, no network
//! - [`OllamaEmbedder`] - `POST {base_url}/api/embed`
//! - [`OpenAIEmbedder`] - `POST {api_base}/embeddings`
//! - `FastEmbedder` - local ONNX models (`local-embeddings` feature)
//! - [`CachedEmbedder`] - LRU cache in front of any of the above

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::llm::client::http_client;
use crate::rag::cache::{CacheStats, EmbeddingCache};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{EmbeddingConfig, EmbeddingProviderConfig};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts. The result has one vector per input text.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::EmbeddingProvider("Provider returned no vectors".into()))
    }

    /// Model identifier, used in cache keys and logs
    fn model_name(&self) -> &str;
}

/// Build the configured embedding provider.
pub fn build_embedder(
    config: &EmbeddingConfig,
    dimensions: usize,
) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match &config.provider {
        EmbeddingProviderConfig::Hash => Arc::new(HashEmbedder::new(dimensions)),
        EmbeddingProviderConfig::Ollama { base_url, model } => {
            Arc::new(OllamaEmbedder::new(base_url.clone(), model.clone())?)
        }
        EmbeddingProviderConfig::OpenAI {
            api_key_env,
            api_base,
            model,
        } => {
            let api_key = std::env::var(api_key_env).map_err(|_| {
                AppError::Configuration(format!(
                    "Environment variable '{}' is not set",
                    api_key_env
                ))
            })?;
            Arc::new(OpenAIEmbedder::new(
                api_key,
                api_base.clone(),
                model.clone(),
            )?)
        }
        #[cfg(feature = "local-embeddings")]
        EmbeddingProviderConfig::FastEmbed { model } => Arc::new(FastEmbedder::new(model)?),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingProviderConfig::FastEmbed { .. } => {
            return Err(AppError::Configuration(
                "fastembed provider requires the 'local-embeddings' feature".to_string(),
            ))
        }
    };
    Ok(provider)
}

pub(crate) fn check_batch(expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        return Err(AppError::EmbeddingProvider(format!(
            "Provider returned {} vectors for {} texts",
            vectors.len(),
            expected
        )));
    }
    Ok(())
}

// ============= Hashed bag-of-words =============

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "how", "its", "may", "who", "did", "does", "from",
    "this", "that", "with", "they", "their", "them", "then", "than", "what", "when", "which",
    "will", "would", "shall", "should", "into", "upon", "such", "these", "those", "there",
    "been", "being", "were", "also", "other", "each",
];

/// Deterministic embedding by feature hashing. Tokens are lowercased
/// alphanumeric runs of three or more characters, minus common stopwords;
/// each lands in a SHA-256-chosen bucket with a hashed sign, weighted by
/// `1 + ln(tf)`, and the result is L2-normalized.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
    name: String,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            name: format!("hash-bow-{}", dimensions),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() >= 3)
            .map(str::to_lowercase)
            .filter(|t| !STOPWORDS.contains(&t.as_str()))
        {
            *counts.entry(token).or_insert(0) += 1;
        }

        let mut vector = vec![0.0f32; self.dimensions];
        for (token, tf) in counts {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign * (1.0 + (tf as f32).ln());
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

// ============= Ollama =============

pub struct OllamaEmbedder {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(base_url: String, model: String) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .post(format!("{}/api/embed", self.base_url))
            .json(&OllamaEmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| AppError::EmbeddingProvider(format!("Ollama error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingProvider(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let parsed: OllamaEmbedResponse = response.json().await.map_err(|e| {
            AppError::EmbeddingProvider(format!("Invalid Ollama response: {}", e))
        })?;
        check_batch(texts.len(), &parsed.embeddings)?;
        Ok(parsed.embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============= OpenAI =============

pub struct OpenAIEmbedder {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

#[derive(Serialize)]
struct OpenAIEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAIEmbedResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    pub fn new(api_key: String, api_base: String, model: String) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .post(format!("{}/embeddings", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&OpenAIEmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| AppError::EmbeddingProvider(format!("OpenAI API error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingProvider(format!(
                "OpenAI API returned {}: {}",
                status, body
            )));
        }

        let mut parsed: OpenAIEmbedResponse = response.json().await.map_err(|e| {
            AppError::EmbeddingProvider(format!("Invalid OpenAI response: {}", e))
        })?;
        parsed.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        check_batch(texts.len(), &vectors)?;
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============= FastEmbed (local) =============

#[cfg(feature = "local-embeddings")]
pub use local::FastEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::*;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use parking_lot::Mutex;

    pub struct FastEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
        name: String,
    }

    impl FastEmbedder {
        pub fn new(model_name: &str) -> Result<Self> {
            let model = match model_name {
                "BAAI/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
                "BAAI/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
                "sentence-transformers/all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
                other => {
                    return Err(AppError::Configuration(format!(
                        "Unsupported fastembed model: {}",
                        other
                    )))
                }
            };

            let embedding =
                TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(true))
                    .map_err(|e| AppError::EmbeddingProvider(e.to_string()))?;

            Ok(Self {
                model: Arc::new(Mutex::new(embedding)),
                name: model_name.to_string(),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FastEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();
            let expected = texts.len();

            let vectors = tokio::task::spawn_blocking(move || model.lock().embed(texts, None))
                .await
                .map_err(|e| AppError::Internal(format!("Embedding task failed: {}", e)))?
                .map_err(|e| AppError::EmbeddingProvider(e.to_string()))?;

            check_batch(expected, &vectors)?;
            Ok(vectors)
        }

        fn model_name(&self) -> &str {
            &self.name
        }
    }
}

// ============= Caching wrapper =============

/// Caches single-text embeddings (queries) in an LRU map. Batch calls pass
/// through to the inner provider.
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        Self {
            inner,
            cache: EmbeddingCache::new(capacity),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.inner.embed_batch(texts).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = EmbeddingCache::compute_key(text, self.inner.model_name());
        if let Some(vector) = self.cache.get(&key) {
            return Ok(vector);
        }
        let vector = self.inner.embed(text).await?;
        self.cache.put(key, vector.clone());
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
