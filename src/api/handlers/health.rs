use crate::{types::StatsResponse, AppState};
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "oceanrag",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /api/stats`
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.engine.stats())
}
