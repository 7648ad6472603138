use crate::{
    types::{FeedbackRecord, FeedbackRequest, Result},
    AppState,
};
use axum::{extract::State, http::StatusCode, Json};

/// Store feedback on an answer. Tags must be one of `good`, `wrong`,
/// `biased` or `unhelpful` (any case).
pub async fn record_feedback(
    State(state): State<AppState>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<FeedbackRecord>)> {
    let record = state.engine.record_feedback(payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_feedback(State(state): State<AppState>) -> Result<Json<Vec<FeedbackRecord>>> {
    Ok(Json(state.engine.feedback().await?))
}
