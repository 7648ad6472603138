//! Document ingestion and management endpoints.

use crate::{
    types::{ChunkRecord, DeleteResponse, Document, IngestRequest, IngestResponse, Result},
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::time::Instant;

/// Ingest a document: chunk, embed and index it.
pub async fn ingest_document(
    State(state): State<AppState>,
    Json(payload): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>)> {
    let start = Instant::now();
    let source_uri = payload.source_uri.clone();
    let response = state.engine.ingest(payload).await?;

    tracing::info!(
        document_id = %response.document_id,
        source_uri = %source_uri,
        chunks = response.chunk_ids.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Document ingested"
    );
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_documents(State(state): State<AppState>) -> Json<Vec<Document>> {
    Json(state.engine.documents())
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>> {
    Ok(Json(state.engine.document(&id)?))
}

/// Delete a document and every chunk derived from it.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    Ok(Json(state.engine.delete_document(&id).await?))
}

/// Full text of one cited chunk.
pub async fn get_chunk(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChunkRecord>> {
    Ok(Json(state.engine.chunk(&id)?))
}
