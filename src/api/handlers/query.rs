use crate::{
    types::{QueryRequest, QueryResponse, Result},
    AppState,
};
use axum::{extract::State, Json};
use std::time::Instant;

/// Answer a question from the indexed corpus.
///
/// Returns the synthesized answer together with the passages it was
/// grounded on. Missing `k` and `min_score` come from the live
/// `[retrieval]` config.
pub async fn ask(
    State(state): State<AppState>,
    Json(mut payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();

    let config = state.config_manager.config();
    payload.k = payload.k.or(Some(config.retrieval.default_k));
    payload.min_score = payload.min_score.or(config.retrieval.min_score);

    let response = state.engine.ask(payload).await?;

    tracing::debug!(
        passages = response.passages.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Query handled"
    );
    Ok(Json(response))
}
