//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! The components that turn policy documents into grounded answers.
//!
//! # Module Structure
//!
//! - [`rag::chunker`](crate::rag::chunker) - Text chunking (words, characters, header-aware sections)
//! - [`rag::embeddings`](crate::rag::embeddings) - Embedding providers and the query cache
//! - [`rag::cache`](crate::rag::cache) - LRU cache for query embeddings
//! - [`rag::ingest`](crate::rag::ingest) - Chunk, embed and commit documents
//! - [`rag::retrieval`](crate::rag::retrieval) - Embed a query and search the index
//! - [`rag::reranker`](crate::rag::reranker) - Score adjustment strategies
//! - [`rag::synthesis`](crate::rag::synthesis) - Prompt assembly and answer generation
//!
//! # RAG Pipeline
//!
//! 1. **Ingestion** - Documents are chunked and embedded; chunk text goes to the
//!    document store and vectors to the index
//! 2. **Retrieval** - The query is embedded and the nearest chunks are joined
//!    with their document
//! 3. **Reranking** - An optional strategy adjusts scores
//! 4. **Synthesis** - The top passages are packed into a prompt under a token
//!    budget and sent to the completion model

pub mod cache;
pub mod chunker;
pub mod embeddings;
pub mod ingest;
pub mod reranker;
pub mod retrieval;
pub mod synthesis;
