//! Snapshot endpoints.
//!
//! Backups run while queries continue; a restore briefly blocks both
//! queries and ingestion. Only one backup or restore runs at a time and a
//! second request gets `409 Conflict`.

use crate::{
    types::{BackupRequest, RestoreResponse, Result, SnapshotManifest},
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

pub async fn list_backups(State(state): State<AppState>) -> Result<Json<Vec<SnapshotManifest>>> {
    Ok(Json(state.engine.backups().await?))
}

/// Take a snapshot. The body is optional; without a `snapshot_id` the
/// default id `"1"` is used.
pub async fn create_backup(
    State(state): State<AppState>,
    payload: Option<Json<BackupRequest>>,
) -> Result<(StatusCode, Json<SnapshotManifest>)> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let manifest = state.engine.backup(request.snapshot_id.as_deref()).await?;

    tracing::info!(
        snapshot_id = %manifest.snapshot_id,
        entries = manifest.entry_count,
        documents = manifest.document_count,
        "Backup created"
    );
    Ok((StatusCode::CREATED, Json(manifest)))
}

pub async fn restore_backup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RestoreResponse>> {
    let manifest = state.engine.restore(Some(&id)).await?;

    tracing::info!(
        snapshot_id = %manifest.snapshot_id,
        entries = manifest.entry_count,
        "Backup restored"
    );
    Ok(Json(RestoreResponse {
        snapshot_id: manifest.snapshot_id,
        restored: true,
    }))
}
