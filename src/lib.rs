//! # oceanrag
//!
//! Retrieval-augmented question answering over ocean policy documents:
//! draft agreements, negotiation reports and statements by the parties.
//!
//! ## Overview
//!
//! oceanrag can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `oceanrag-server` binary
//! 2. **As a library** - Build a [`QueryEngine`] and call it directly
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use oceanrag::{OceanConfig, QueryEngine};
//! use oceanrag::types::{IngestRequest, QueryRequest};
//!
//! let config = OceanConfig::load("oceanrag.toml")?;
//! let engine = QueryEngine::from_config(&config).await?;
//!
//! engine.ingest(IngestRequest {
//!     source_uri: "https://example.org/bbnj-draft.txt".into(),
//!     text: std::fs::read_to_string("bbnj-draft.txt")?,
//!     title: Some("BBNJ draft agreement".into()),
//!     document_id: None,
//!     replace: false,
//! }).await?;
//!
//! let response = engine.ask(QueryRequest {
//!     question: "How are marine protected areas designated?".into(),
//!     k: Some(5),
//!     min_score: None,
//!     document_ids: None,
//! }).await?;
//! println!("{}", response.answer.text);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `local-embeddings` | Local ONNX embedding models via fastembed |
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`backup`] - Live snapshot and restore
//! - [`cli`] - Command-line parsing and output
//! - [`db`] - Document store and the consistency gate
//! - [`engine`] - The assembled query engine
//! - [`llm`] - Completion model clients
//! - [`rag`] - Chunking, embeddings, ingestion, retrieval and synthesis
//! - [`types`] - Common types and error handling
//! - [`utils`] - Configuration and retry policy
//!
//! Vector storage lives in the `oceanrag-vector` workspace crate.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Snapshot and restore of the index and document store.
pub mod backup;
/// Command-line interface.
pub mod cli;
/// Document store and consistency gate.
pub mod db;
/// The assembled query engine.
pub mod engine;
/// LLM provider clients and abstractions.
pub mod llm;
/// Retrieval Augmented Generation (RAG) components.
pub mod rag;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration and retry utilities.
pub mod utils;

// Re-export commonly used types
pub use engine::QueryEngine;
pub use llm::{LLMClient, Provider};
pub use rag::embeddings::EmbeddingProvider;
pub use types::{AppError, Result};
pub use utils::toml_config::{ConfigManager, OceanConfig};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration with hot-reload support
    pub config_manager: Arc<ConfigManager>,
    /// Index, document store and the components built on them
    pub engine: Arc<QueryEngine>,
}
