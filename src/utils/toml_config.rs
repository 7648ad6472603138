//! TOML-based configuration for oceanrag
//!
//! This module provides declarative configuration for storage, the vector
//! index, chunking, the embedding and generation providers, retrieval and
//! synthesis via a TOML file (`oceanrag.toml`).
//!
//! Secrets are never written in the file; providers name the environment
//! variable that holds their API key.
//!
//! # Hot Reloading
//!
//! `ConfigManager::start_watching` re-reads the file when it changes. The
//! running server picks up the query defaults (`retrieval.default_k`,
//! `retrieval.min_score`); storage, index shape and providers are fixed at
//! startup.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use oceanrag_vector::DistanceMetric;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Root configuration structure loaded from oceanrag.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OceanConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub synthesis: SynthesisConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Largest accepted request body (documents are posted inline).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

// ============= Storage Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the index and document store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Keep the index and documents in memory only (backups still go to disk)
    #[serde(default)]
    pub in_memory: bool,

    /// fsync persisted files before acknowledging writes
    #[serde(default = "default_true")]
    pub sync_writes: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("./backups")
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backup_dir: default_backup_dir(),
            in_memory: false,
            sync_writes: true,
        }
    }
}

// ============= Index Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Embedding dimension; must match the embedding provider's output.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default)]
    pub metric: DistanceMetric,
}

fn default_dimensions() -> usize {
    384
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            metric: DistanceMetric::default(),
        }
    }
}

// ============= Chunking Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Fixed windows of words.
    #[default]
    Words,
    /// Character windows, split on natural boundaries.
    Characters,
    /// Header-aware sections, split on paragraphs when too long.
    Sections,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default)]
    pub strategy: ChunkStrategy,

    /// Window size, in words (or characters for `characters`).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    200
}

fn default_chunk_overlap() -> usize {
    20
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::default(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmbeddingProviderConfig {
    /// Deterministic hashed bag-of-words vectors; no network.
    Hash,
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        model: String,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        model: String,
    },
    /// Local ONNX models (requires the `local-embeddings` feature)
    FastEmbed {
        #[serde(default = "default_fastembed_model")]
        model: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GenerationProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        model: String,
    },
    OpenAI {
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        model: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_fastembed_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(flatten)]
    pub provider: EmbeddingProviderConfig,

    /// Texts per provider call during ingestion
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Cached query embeddings (0 disables the cache)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_batch_size() -> usize {
    32
}

fn default_cache_capacity() -> usize {
    1024
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderConfig::Hash,
            batch_size: default_batch_size(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(flatten)]
    pub provider: GenerationProviderConfig,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.3
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProviderConfig::Ollama {
                base_url: default_ollama_url(),
                model: "llama3.2".to_string(),
            },
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

// ============= Retrieval & Synthesis Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RerankKind {
    /// Keep similarity order.
    #[default]
    None,
    /// Boost recently ingested documents.
    Recency,
    /// Penalize repeated passages from one source.
    SourceDiversity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    #[serde(default)]
    pub strategy: RerankKind,

    /// Maximum relative boost for a brand-new document
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f32,

    #[serde(default = "default_half_life_days")]
    pub half_life_days: f32,

    /// Score reduction per repeated source, in [0, 1)
    #[serde(default = "default_diversity_penalty")]
    pub diversity_penalty: f32,
}

fn default_recency_weight() -> f32 {
    0.1
}

fn default_half_life_days() -> f32 {
    365.0
}

fn default_diversity_penalty() -> f32 {
    0.15
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            strategy: RerankKind::default(),
            recency_weight: default_recency_weight(),
            half_life_days: default_half_life_days(),
            diversity_penalty: default_diversity_penalty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,

    #[serde(default)]
    pub min_score: Option<f32>,

    /// Candidates fetched per requested result, before filtering and re-ranking
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    #[serde(default)]
    pub rerank: RerankConfig,
}

fn default_k() -> usize {
    8
}

fn default_candidate_multiplier() -> usize {
    4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            min_score: None,
            candidate_multiplier: default_candidate_multiplier(),
            rerank: RerankConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Prompt budget for retrieved passages, in estimated tokens
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Returned instead of calling the provider when nothing was retrieved
    #[serde(default = "default_no_context_answer")]
    pub no_context_answer: String,
}

fn default_max_context_tokens() -> usize {
    3000
}

fn default_system_prompt() -> String {
    "You are a helpful policy analyst working to understand the UN agreement on \
     marine Biodiversity Beyond National Jurisdiction (BBNJ) and related ocean policy documents."
        .to_string()
}

fn default_no_context_answer() -> String {
    "I could not find any passages in the indexed documents that address this question."
        .to_string()
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            system_prompt: default_system_prompt(),
            no_context_answer: default_no_context_answer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-attempt timeout for provider calls
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    4000
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(err: ConfigError) -> Self {
        crate::types::AppError::Configuration(err.to_string())
    }
}

impl OceanConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: OceanConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "index.dimensions must be greater than zero".to_string(),
            ));
        }

        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be greater than zero".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "retry.timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.retrieval.candidate_multiplier == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.candidate_multiplier must be at least 1".to_string(),
            ));
        }
        let penalty = self.retrieval.rerank.diversity_penalty;
        if !(0.0..1.0).contains(&penalty) {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.rerank.diversity_penalty must be in [0, 1), got {}",
                penalty
            )));
        }
        if self.retrieval.rerank.half_life_days <= 0.0 {
            return Err(ConfigError::ValidationError(
                "retrieval.rerank.half_life_days must be positive".to_string(),
            ));
        }

        if self.synthesis.max_context_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "synthesis.max_context_tokens must be greater than zero".to_string(),
            ));
        }

        if !matches!(self.server.log_format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "server.log_format must be 'pretty' or 'json', got '{}'",
                self.server.log_format
            )));
        }

        if let EmbeddingProviderConfig::OpenAI { api_key_env, .. } = &self.embedding.provider {
            self.validate_env_var(api_key_env)?;
        }
        if let GenerationProviderConfig::OpenAI { api_key_env, .. } = &self.generation.provider {
            self.validate_env_var(api_key_env)?;
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Path of the index directory, when persistent
    pub fn index_path(&self) -> Option<PathBuf> {
        (!self.storage.in_memory).then(|| self.storage.data_dir.join("index"))
    }

    /// Path of the document store file, when persistent
    pub fn documents_path(&self) -> Option<PathBuf> {
        (!self.storage.in_memory).then(|| self.storage.data_dir.join("documents.json"))
    }

    pub fn feedback_path(&self) -> Option<PathBuf> {
        (!self.storage.in_memory).then(|| self.storage.data_dir.join("feedback.jsonl"))
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct ConfigManager {
    config: Arc<ArcSwap<OceanConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
}

impl ConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = OceanConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
        })
    }

    /// Create a config manager directly from a config (useful for testing)
    /// This won't have file watching capabilities.
    pub fn from_config(config: OceanConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("oceanrag.toml"),
            watcher: RwLock::new(None),
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<OceanConfig> {
        self.config.load_full()
    }

    /// Path the configuration was loaded from
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Reload from disk. Only `[retrieval]` defaults apply to a running
    /// server; other changed sections are logged as needing a restart.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let new_config = OceanConfig::load(&self.config_path)?;
        publish(&self.config, new_config);
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);
        let file_name = self.config_path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if ours && (event.kind.is_modify() || event.kind.is_create()) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let debounce = Duration::from_millis(300);
            while rx.recv().await.is_some() {
                // Collapse a burst of events into one reload
                tokio::time::sleep(debounce).await;
                while rx.try_recv().is_ok() {}

                match OceanConfig::load(&config_path) {
                    Ok(new_config) => publish(&config_arc, new_config),
                    Err(e) => warn!(error = %e, "Ignoring invalid config change"),
                }
            }
        });

        info!(path = ?self.config_path, "Watching configuration");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
    }
}

fn publish(current: &ArcSwap<OceanConfig>, new_config: OceanConfig) {
    let old = current.load_full();
    let stale = restart_sections(&old, &new_config);
    if !stale.is_empty() {
        warn!(sections = ?stale, "Changed sections take effect after a restart");
    }
    info!(
        default_k = new_config.retrieval.default_k,
        min_score = ?new_config.retrieval.min_score,
        "Configuration reloaded"
    );
    current.store(Arc::new(new_config));
}

/// Sections that differ between `old` and `new` and are only read at startup.
fn restart_sections(old: &OceanConfig, new: &OceanConfig) -> Vec<&'static str> {
    fn differs<T: Serialize>(a: &T, b: &T) -> bool {
        serde_json::to_value(a).ok() != serde_json::to_value(b).ok()
    }

    let mut sections = Vec::new();
    let mut check = |name, changed| {
        if changed {
            sections.push(name);
        }
    };
    check("server", differs(&old.server, &new.server));
    check("storage", differs(&old.storage, &new.storage));
    check("index", differs(&old.index, &new.index));
    check("chunking", differs(&old.chunking, &new.chunking));
    check("embedding", differs(&old.embedding, &new.embedding));
    check("generation", differs(&old.generation, &new.generation));
    check("synthesis", differs(&old.synthesis, &new.synthesis));
    check("retry", differs(&old.retry, &new.retry));
    check(
        "retrieval.rerank",
        differs(&old.retrieval.rerank, &new.retrieval.rerank),
    );
    sections
}

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_config() -> String {
        r#"
[server]
host = "0.0.0.0"
port = 8080
log_format = "json"

[storage]
data_dir = "./data/test"
backup_dir = "./backups/test"

[index]
dimensions = 256
metric = "dot_product"

[chunking]
strategy = "sections"
chunk_size = 200
chunk_overlap = 0

[embedding]
type = "ollama"
model = "nomic-embed-text"
batch_size = 16

[generation]
type = "ollama"
model = "llama3.2"
temperature = 0.2

[retrieval]
default_k = 5
min_score = 0.25

[retrieval.rerank]
strategy = "source-diversity"
diversity_penalty = 0.2

[synthesis]
max_context_tokens = 1500
"#
        .to_string()
    }

    #[test]
    fn test_parse_full_config() {
        let config: OceanConfig = toml::from_str(&create_test_config()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.index.dimensions, 256);
        assert_eq!(config.index.metric, DistanceMetric::DotProduct);
        assert_eq!(config.chunking.strategy, ChunkStrategy::Sections);
        assert_eq!(config.embedding.batch_size, 16);
        assert!(matches!(
            config.embedding.provider,
            EmbeddingProviderConfig::Ollama { ref base_url, .. } if base_url == "http://localhost:11434"
        ));
        assert_eq!(config.retrieval.min_score, Some(0.25));
        assert_eq!(config.retrieval.rerank.strategy, RerankKind::SourceDiversity);
        assert_eq!(config.synthesis.max_context_tokens, 1500);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: OceanConfig = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert!(matches!(config.embedding.provider, EmbeddingProviderConfig::Hash));
        assert_eq!(config.synthesis.max_context_tokens, 3000);
        assert_eq!(config.index_path(), Some(PathBuf::from("./data/index")));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = OceanConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = OceanConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_api_key_env() {
        let mut config = OceanConfig::default();
        config.generation.provider = GenerationProviderConfig::OpenAI {
            api_key_env: "OCEANRAG_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            api_base: default_openai_base(),
            model: "gpt-4o-mini".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            OceanConfig::load("/definitely/not/here/oceanrag.toml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_manager_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oceanrag.toml");
        fs::write(&path, create_test_config()).unwrap();

        let manager = ConfigManager::new(&path).unwrap();
        assert_eq!(manager.config().retrieval.default_k, 5);

        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "\n[retry]\nmax_attempts = 7").unwrap();
        manager.reload().unwrap();
        assert_eq!(manager.config().retry.max_attempts, 7);
    }

    #[test]
    fn test_restart_sections() {
        let old = OceanConfig::default();
        let mut new = OceanConfig::default();
        new.retrieval.default_k = 3;
        new.retrieval.min_score = Some(0.4);
        assert!(restart_sections(&old, &new).is_empty());

        new.index.dimensions = 1024;
        new.retry.max_attempts = 9;
        assert_eq!(restart_sections(&old, &new), vec!["index", "retry"]);
    }
}
