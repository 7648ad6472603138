//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Snapshot and restore handlers.
pub mod backups;
/// Document ingestion and management handlers.
pub mod documents;
/// Answer feedback handlers.
pub mod feedback;
/// Liveness and statistics handlers.
pub mod health;
/// Question answering handler.
pub mod query;
