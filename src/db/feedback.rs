//! Append-only log of answer feedback.
//!
//! Persistent logs write one JSON record per line to `feedback.jsonl`;
//! a line that fails to parse is skipped when reading back.

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::types::{AppError, FeedbackRecord, Result};

pub struct FeedbackLog {
    path: Option<PathBuf>,
    memory: parking_lot::Mutex<Vec<FeedbackRecord>>,
    write_gate: tokio::sync::Mutex<()>,
}

impl FeedbackLog {
    pub fn in_memory() -> Self {
        Self::with_path(None)
    }

    pub fn open(path: &Path) -> Self {
        Self::with_path(Some(path.to_path_buf()))
    }

    fn with_path(path: Option<PathBuf>) -> Self {
        Self {
            path,
            memory: parking_lot::Mutex::new(Vec::new()),
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn append(&self, record: &FeedbackRecord) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            self.memory.lock().push(record.clone());
            return Ok(());
        };

        let _guard = self.write_gate.lock().await;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(record)
            .map_err(|e| AppError::Internal(format!("Failed to encode feedback: {}", e)))?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        info!(feedback_id = %record.id, tags = ?record.tags, "Recorded feedback");
        Ok(())
    }

    /// All records, oldest first.
    pub async fn list(&self) -> Result<Vec<FeedbackRecord>> {
        let Some(path) = self.path.as_deref() else {
            return Ok(self.memory.lock().clone());
        };

        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable feedback line");
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeedbackTag;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(id: &str) -> FeedbackRecord {
        FeedbackRecord {
            id: id.to_string(),
            recorded_at: Utc::now(),
            question: "Who funds capacity building?".to_string(),
            answer: "A voluntary trust fund.".to_string(),
            document_ids: Vec::new(),
            tags: vec![FeedbackTag::Good],
            comment: None,
            name: Some("reviewer".to_string()),
            model: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_append_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("feedback.jsonl");

        let log = FeedbackLog::open(&path);
        log.append(&record("a")).await.unwrap();
        log.append(&record("b")).await.unwrap();

        let reopened = FeedbackLog::open(&path);
        let ids: Vec<String> = reopened
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_corrupt_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feedback.jsonl");
        let log = FeedbackLog::open(&path);
        log.append(&record("a")).await.unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).await.unwrap();
        file.write_all(b"{not json\n").await.unwrap();
        file.flush().await.unwrap();
        log.append(&record("b")).await.unwrap();

        assert_eq!(log.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_log() {
        let log = FeedbackLog::in_memory();
        assert!(log.list().await.unwrap().is_empty());
        log.append(&record("a")).await.unwrap();
        assert_eq!(log.list().await.unwrap()[0].tags, vec![FeedbackTag::Good]);
    }
}
