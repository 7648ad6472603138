//! Storage for documents and chunk text, the gate that keeps it consistent
//! with the vector index across backups and restores, and the feedback log.
//!
//! Vectors themselves are stored by the `oceanrag-vector` crate.

pub mod document_store;
pub mod feedback;
pub mod gate;

pub use document_store::{DocumentStore, PreparedDocuments};
pub use feedback::FeedbackLog;
pub use gate::ConsistencyGate;
