//! Backup and restore through the assembled engine.

mod common;

use common::mocks::{engine_with, test_config, MockEmbedder, MockLLMClient};
use oceanrag::backup::BackupState;
use oceanrag::types::{AppError, IngestRequest, QueryRequest};
use oceanrag::QueryEngine;
use std::sync::Arc;
use tempfile::TempDir;

fn request(id: &str, text: &str) -> IngestRequest {
    IngestRequest {
        source_uri: format!("https://example.org/{}", id),
        text: text.to_string(),
        title: None,
        document_id: Some(id.to_string()),
        replace: false,
    }
}

async fn seeded(dir: &TempDir) -> QueryEngine {
    let engine = engine_with(
        &test_config(dir.path()),
        MockEmbedder::new(),
        MockLLMClient::new("answer"),
    )
    .await;
    engine
        .ingest(request("reefs", "coral reef restoration and bleaching monitoring"))
        .await
        .unwrap();
    engine
        .ingest(request("fish", "straddling fish stocks and regional fisheries bodies"))
        .await
        .unwrap();
    engine
}

async fn passage_ids(engine: &QueryEngine, question: &str) -> Vec<(String, f32)> {
    engine
        .ask(QueryRequest {
            question: question.to_string(),
            k: Some(5),
            min_score: None,
            document_ids: None,
        })
        .await
        .unwrap()
        .passages
        .into_iter()
        .map(|p| (p.chunk_id, p.score))
        .collect()
}

#[tokio::test]
async fn test_backup_restore_round_trip() {
    let dir = TempDir::new().unwrap();
    let engine = seeded(&dir).await;

    let queries = ["coral bleaching", "fisheries bodies", "restoration stocks"];
    let mut before = Vec::new();
    for q in queries {
        before.push(passage_ids(&engine, q).await);
    }

    let manifest = engine.backup(None).await.unwrap();
    assert_eq!(manifest.snapshot_id, "1");
    assert_eq!(manifest.entry_count, 2);
    assert_eq!(manifest.document_count, 2);

    // Diverge from the snapshot
    engine.delete_document("reefs").await.unwrap();
    engine
        .ingest(request("mining", "polymetallic nodules exploration contracts"))
        .await
        .unwrap();

    engine.restore(None).await.unwrap();
    assert_eq!(engine.backup_state(), BackupState::Idle);
    assert!(engine.document("reefs").is_ok());
    assert!(matches!(
        engine.document("mining"),
        Err(AppError::NotFound(_))
    ));

    for (q, expected) in queries.iter().zip(before) {
        assert_eq!(passage_ids(&engine, q).await, expected);
    }
}

#[tokio::test]
async fn test_corrupt_archive_rejected_and_state_kept() {
    let dir = TempDir::new().unwrap();
    let engine = seeded(&dir).await;
    engine.backup(Some("nightly")).await.unwrap();

    let archive = dir.path().join("backups").join("nightly").join("archive.bin");
    let mut bytes = std::fs::read(&archive).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&archive, bytes).unwrap();

    engine.delete_document("fish").await.unwrap();
    let err = engine.restore(Some("nightly")).await.unwrap_err();

    assert!(matches!(err, AppError::CorruptSnapshot(_)));
    assert_eq!(engine.stats().documents, 1);
    assert_eq!(engine.stats().index_entries, 1);
    assert_eq!(engine.backup_state(), BackupState::Idle);
}

#[tokio::test]
async fn test_duplicate_and_missing_snapshots() {
    let dir = TempDir::new().unwrap();
    let engine = seeded(&dir).await;

    engine.backup(Some("weekly")).await.unwrap();
    let err = engine.backup(Some("weekly")).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicateKey(_)));

    let err = engine.restore(Some("absent")).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = engine.backup(Some("../escape")).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_list_backups_oldest_first() {
    let dir = TempDir::new().unwrap();
    let engine = seeded(&dir).await;

    engine.backup(Some("a")).await.unwrap();
    engine
        .ingest(request("extra", "ocean governance capacity building"))
        .await
        .unwrap();
    engine.backup(Some("b")).await.unwrap();

    let listed = engine.backups().await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|m| m.snapshot_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(listed[0].document_count, 2);
    assert_eq!(listed[1].document_count, 3);
}

#[tokio::test]
async fn test_backup_during_ingestion_is_consistent() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(seeded(&dir).await);

    let writer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for i in 0..20 {
                engine
                    .ingest(request(
                        &format!("bulk-{}", i),
                        &format!("environmental impact assessment number {}", i),
                    ))
                    .await
                    .unwrap();
            }
        })
    };

    let manifest = engine.backup(Some("live")).await.unwrap();
    writer.await.unwrap();

    // Every chunk in the snapshot has its vector and vice versa
    assert_eq!(manifest.entry_count, manifest.chunk_count);

    engine.restore(Some("live")).await.unwrap();
    let stats = engine.stats();
    assert_eq!(stats.index_entries, manifest.entry_count);
    assert_eq!(stats.chunks, manifest.chunk_count);
    assert_eq!(stats.documents, manifest.document_count);
}
