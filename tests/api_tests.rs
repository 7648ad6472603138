//! HTTP API tests against the full router with mock providers.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::mocks::{engine_with, test_config, MockEmbedder, MockLLMClient};
use oceanrag::api::routes::create_router;
use oceanrag::types::{
    ChunkRecord, DeleteResponse, Document, FeedbackRecord, FeedbackTag, IngestResponse,
    QueryResponse, RestoreResponse, SnapshotManifest, StatsResponse,
};
use oceanrag::{AppState, ConfigManager};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

async fn test_server(dir: &TempDir, llm: Arc<MockLLMClient>) -> TestServer {
    let config = test_config(dir.path());
    let engine = engine_with(&config, MockEmbedder::new(), llm).await;
    let state = AppState {
        config_manager: Arc::new(ConfigManager::from_config(config)),
        engine: Arc::new(engine),
    };
    TestServer::new(create_router(state)).expect("Failed to create test server")
}

async fn ingest(server: &TestServer, id: &str, text: &str) -> IngestResponse {
    let response = server
        .post("/api/documents")
        .json(&json!({
            "source_uri": format!("https://example.org/{}", id),
            "document_id": id,
            "text": text,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn test_health_check() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir, MockLLMClient::new("unused")).await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_document_lifecycle() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir, MockLLMClient::new("unused")).await;

    let created = ingest(&server, "bbnj", "Marine genetic resources and benefit sharing.").await;
    assert_eq!(created.document_id, "bbnj");
    assert_eq!(created.chunk_ids.len(), 1);

    let document: Document = server.get("/api/documents/bbnj").await.json();
    assert_eq!(document.source_uri, "https://example.org/bbnj");

    let listed: Vec<Document> = server.get("/api/documents").await.json();
    assert_eq!(listed.len(), 1);

    let chunk: ChunkRecord = server
        .get(&format!("/api/chunks/{}", created.chunk_ids[0]))
        .await
        .json();
    assert_eq!(chunk.document_id, "bbnj");
    assert_eq!(chunk.text, "Marine genetic resources and benefit sharing.");

    let response = server.delete("/api/documents/bbnj").await;
    response.assert_status_ok();
    let deleted: DeleteResponse = response.json();
    assert_eq!(deleted.deleted_chunks, 1);

    server
        .get("/api/documents/bbnj")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete("/api/documents/bbnj")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get(&format!("/api/chunks/{}", created.chunk_ids[0]))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_document_conflicts() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir, MockLLMClient::new("unused")).await;

    ingest(&server, "doc", "coastal zone management").await;
    let response = server
        .post("/api/documents")
        .json(&json!({
            "source_uri": "https://example.org/doc",
            "document_id": "doc",
            "text": "coastal zone management, revised",
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("doc"));
}

#[tokio::test]
async fn test_query_returns_cited_answer() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir, MockLLMClient::new("Acidification slows calcification.")).await;

    ingest(&server, "doc1", "Ocean acidification reduces coral calcification rates.").await;

    let response = server
        .post("/api/query")
        .json(&json!({ "question": "coral calcification acidification" }))
        .await;

    response.assert_status_ok();
    let body: QueryResponse = response.json();
    assert_eq!(body.answer.text, "Acidification slows calcification.");
    assert!(body.answer.grounded);
    assert_eq!(body.answer.citations, vec!["https://example.org/doc1".to_string()]);
    assert_eq!(body.passages[0].document_id, "doc1");
}

#[tokio::test]
async fn test_query_validation_errors() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir, MockLLMClient::new("unused")).await;

    server
        .post("/api/query")
        .json(&json!({ "question": "  " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/api/query")
        .json(&json!({ "question": "ocean", "k": 10_000 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_synthesis_failure_maps_to_bad_gateway() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir, MockLLMClient::failing()).await;

    ingest(&server, "doc1", "fisheries subsidies agreement").await;
    server
        .post("/api/query")
        .json(&json!({ "question": "fisheries subsidies" }))
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_backup_and_restore_endpoints() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir, MockLLMClient::new("unused")).await;

    ingest(&server, "keep", "ballast water convention").await;

    let response = server.post("/api/backups").await;
    response.assert_status(StatusCode::CREATED);
    let manifest: SnapshotManifest = response.json();
    assert_eq!(manifest.snapshot_id, "1");
    assert_eq!(manifest.document_count, 1);

    let response = server
        .post("/api/backups")
        .json(&json!({ "snapshot_id": "1" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    ingest(&server, "later", "underwater noise guidelines").await;

    let listed: Vec<SnapshotManifest> = server.get("/api/backups").await.json();
    assert_eq!(listed.len(), 1);

    let response = server.post("/api/backups/1/restore").await;
    response.assert_status_ok();
    let restored: RestoreResponse = response.json();
    assert!(restored.restored);

    let stats: StatsResponse = server.get("/api/stats").await.json();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.index_entries, 1);
    assert_eq!(stats.backup_state, "idle");

    server
        .post("/api/backups/missing/restore")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_feedback_is_recorded() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir, MockLLMClient::new("unused")).await;

    let response = server
        .post("/api/feedback")
        .json(&json!({
            "question": "Who may access marine genetic resources?",
            "answer": "All parties.",
            "tags": ["Good", "good", "Unhelpful"],
            "comment": "Too short",
            "name": "  ",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let record: FeedbackRecord = response.json();
    assert_eq!(record.tags, vec![FeedbackTag::Good, FeedbackTag::Unhelpful]);
    assert_eq!(record.comment.as_deref(), Some("Too short"));
    assert_eq!(record.name, None);
    assert_eq!(record.model, "mock-model");

    let listed: Vec<FeedbackRecord> = server.get("/api/feedback").await.json();
    assert_eq!(listed, vec![record]);
    assert!(dir.path().join("data").join("feedback.jsonl").exists());
}

#[tokio::test]
async fn test_feedback_validation() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir, MockLLMClient::new("unused")).await;

    let response = server
        .post("/api/feedback")
        .json(&json!({ "question": "q", "answer": "a", "tags": ["excellent"] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("excellent"));

    server
        .post("/api/feedback")
        .json(&json!({ "question": " ", "answer": "a" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let listed: Vec<FeedbackRecord> = server.get("/api/feedback").await.json();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_stats_reports_configuration() {
    let dir = TempDir::new().unwrap();
    let server = test_server(&dir, MockLLMClient::new("unused")).await;

    let stats: StatsResponse = server.get("/api/stats").await.json();
    assert_eq!(stats.documents, 0);
    assert_eq!(stats.dimensions, common::mocks::DIMENSIONS);
    assert_eq!(stats.model, "mock-model");
    assert_eq!(stats.reranker, "none");
}
