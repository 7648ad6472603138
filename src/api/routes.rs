use crate::api::handlers::{backups, documents, feedback, health, query};
use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Build the application router with tracing, CORS and a body size limit.
pub fn create_router(state: AppState) -> Router {
    let max_body_bytes = state.config_manager.config().server.max_body_bytes;

    let api_routes = Router::new()
        .route("/query", post(query::ask))
        .route(
            "/feedback",
            get(feedback::list_feedback).post(feedback::record_feedback),
        )
        .route(
            "/documents",
            get(documents::list_documents).post(documents::ingest_document),
        )
        .route(
            "/documents/{id}",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/chunks/{id}", get(documents::get_chunk))
        .route(
            "/backups",
            get(backups::list_backups).post(backups::create_backup),
        )
        .route("/backups/{id}/restore", post(backups::restore_backup))
        .route("/stats", get(health::stats));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
