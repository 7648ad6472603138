//! LLM Provider Clients
//!
//! Answer synthesis calls a completion model through the [`LLMClient`] trait.
//! Providers are selected at runtime from the `[generation]` section of
//! `oceanrag.toml`:
//!
//! - [`Provider::OpenAI`] - OpenAI or any compatible `/chat/completions` API
//! - [`Provider::Ollama`] - Local Ollama server
//!
//! # Example
//!
//! ```ignore
//! use oceanrag::llm::{GenerationOptions, Provider};
//!
//! let provider = Provider::Ollama {
//!     base_url: "http://localhost:11434".to_string(),
//!     model: "llama3.2".to_string(),
//! };
//! let client = provider.create_client(GenerationOptions::default())?;
//! let text = client.generate("What is the high seas treaty?").await?;
//! ```

/// Core LLM client trait and provider selection.
pub mod client;
pub mod ollama;
pub mod openai;

pub use client::{GenerationOptions, LLMClient, Provider};
