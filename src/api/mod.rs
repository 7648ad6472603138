//! HTTP API Handlers and Routes
//!
//! The REST surface of the query engine, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Health
//! - `GET /health` - Liveness check
//!
//! ## Query (`/api/query`)
//! - `POST /api/query` - Answer a question from the indexed corpus
//!
//! ## Documents (`/api/documents`)
//! - `POST /api/documents` - Ingest a document
//! - `GET /api/documents` - List documents
//! - `GET /api/documents/{id}` - Get a document
//! - `DELETE /api/documents/{id}` - Delete a document and its chunks
//!
//! ## Backups (`/api/backups`)
//! - `GET /api/backups` - List snapshots
//! - `POST /api/backups` - Take a snapshot
//! - `POST /api/backups/{id}/restore` - Restore a snapshot
//!
//! ## Stats (`/api/stats`)
//! - `GET /api/stats` - Index, store and cache counters
//!
//! Errors are returned as `{"error": "..."}` with a status code derived from
//! the [`AppError`](crate::types::AppError) kind.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
