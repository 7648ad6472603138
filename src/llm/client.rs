//! LLM client abstraction and provider selection
//!
//! Answer synthesis talks to a completion model through [`LLMClient`]:
//! - **OpenAI**: any OpenAI-compatible `/chat/completions` endpoint
//! - **Ollama**: a local Ollama server via `/api/chat`

use crate::types::{AppError, Result};
use crate::utils::toml_config::{GenerationConfig, GenerationProviderConfig};
use async_trait::async_trait;

/// A completion model. Implementations map every provider failure to
/// [`AppError::SynthesisProvider`].
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Reported in `/api/stats`.
    fn model_name(&self) -> &str;
}

/// Sampling options passed with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: None,
        }
    }
}

impl From<&GenerationConfig> for GenerationOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// A resolved `[generation]` provider, with its API key read from the
/// environment.
#[derive(Debug, Clone)]
pub enum Provider {
    /// Any OpenAI-compatible `/chat/completions` API.
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
    },

    Ollama { base_url: String, model: String },
}

impl Provider {
    /// Build a provider from the `[generation]` config section, resolving
    /// the API key from the environment.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        match &config.provider {
            GenerationProviderConfig::Ollama { base_url, model } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model: model.clone(),
            }),
            GenerationProviderConfig::OpenAI {
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
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: api_base.clone(),
                    model: model.clone(),
                })
            }
        }
    }

    pub fn create_client(&self, options: GenerationOptions) -> Result<Box<dyn LLMClient>> {
        match self {
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                options,
            )?)),
            Provider::Ollama { base_url, model } => Ok(Box::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone(), options)?,
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }
}

/// Shared HTTP client builder for provider requests.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("oceanrag/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))
}
