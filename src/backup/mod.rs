//! Live backup and restore of the index and document store.
//!
//! A backup is a directory under the backup root:
//!
//! ```text
//! {backup_dir}/{snapshot_id}/archive.bin     postcard: index snapshot + documents
//! {backup_dir}/{snapshot_id}/manifest.json   SnapshotManifest, checksum of archive.bin
//! ```
//!
//! Backups quiesce ingestion only for the instant of capture. Restores are
//! exclusive: no query sees a mix of old and new state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use oceanrag_vector::{checksum_hex, VectorIndex};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::db::{ConsistencyGate, DocumentStore};
use crate::types::{AppError, Result, SnapshotManifest};

pub const DEFAULT_SNAPSHOT_ID: &str = "1";
pub const ARCHIVE_VERSION: u32 = 1;

const ARCHIVE_FILE: &str = "archive.bin";
const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupState {
    Idle,
    Snapshotting,
    Restoring,
    /// A restore could not be rolled back. New operations are still accepted.
    Failed,
}

impl fmt::Display for BackupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackupState::Idle => "idle",
            BackupState::Snapshotting => "snapshotting",
            BackupState::Restoring => "restoring",
            BackupState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize)]
struct Archive {
    version: u32,
    index: Vec<u8>,
    documents: Vec<u8>,
}

pub struct BackupCoordinator {
    index: VectorIndex,
    store: DocumentStore,
    gate: Arc<ConsistencyGate>,
    backup_dir: PathBuf,
    sync_writes: bool,
    state: Mutex<BackupState>,
}

/// Returns the coordinator to `Idle` when dropped, unless marked failed.
struct Operation<'a> {
    state: &'a Mutex<BackupState>,
    failed: bool,
}

impl Operation<'_> {
    fn fail(mut self) {
        self.failed = true;
    }
}

impl Drop for Operation<'_> {
    fn drop(&mut self) {
        *self.state.lock() = if self.failed {
            BackupState::Failed
        } else {
            BackupState::Idle
        };
    }
}

impl BackupCoordinator {
    pub fn new(
        index: VectorIndex,
        store: DocumentStore,
        gate: Arc<ConsistencyGate>,
        backup_dir: impl Into<PathBuf>,
        sync_writes: bool,
    ) -> Self {
        Self {
            index,
            store,
            gate,
            backup_dir: backup_dir.into(),
            sync_writes,
            state: Mutex::new(BackupState::Idle),
        }
    }

    pub fn state(&self) -> BackupState {
        *self.state.lock()
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn begin(&self, next: BackupState) -> Result<Operation<'_>> {
        let mut state = self.state.lock();
        match *state {
            BackupState::Idle | BackupState::Failed => {
                *state = next;
                Ok(Operation {
                    state: &self.state,
                    failed: false,
                })
            }
            current => Err(AppError::Busy(format!("backup coordinator is {}", current))),
        }
    }

    /// Write a backup of the current state under `snapshot_id`.
    #[instrument(skip(self))]
    pub async fn backup(&self, snapshot_id: &str) -> Result<SnapshotManifest> {
        validate_id(snapshot_id)?;
        let _op = self.begin(BackupState::Snapshotting)?;

        let target = self.backup_dir.join(snapshot_id);
        if tokio::fs::try_exists(&target).await? {
            return Err(AppError::DuplicateKey(format!(
                "backup '{}' already exists",
                snapshot_id
            )));
        }

        let (archive, entry_count, document_count, chunk_count) = {
            let _quiesced = self.gate.quiesce().await;
            let archive = Archive {
                version: ARCHIVE_VERSION,
                index: self.index.snapshot()?,
                documents: self.store.snapshot()?,
            };
            (
                archive,
                self.index.len(),
                self.store.len(),
                self.store.chunk_count(),
            )
        };

        let bytes = postcard::to_allocvec(&archive)
            .map_err(|e| AppError::Internal(format!("Failed to encode archive: {}", e)))?;
        let manifest = SnapshotManifest {
            snapshot_id: snapshot_id.to_string(),
            created_at: Utc::now(),
            entry_count,
            document_count,
            chunk_count,
            dimensions: self.index.dimensions(),
            metric: self.index.metric().to_string(),
            format_version: ARCHIVE_VERSION,
            checksum: checksum_hex(&bytes),
        };

        // Written to a staging directory and renamed so a crash never leaves
        // a half-written backup under the real id
        let staging = self
            .backup_dir
            .join(format!(".{}.{}", snapshot_id, uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&staging).await?;
        let written = self.write_backup(&staging, &bytes, &manifest).await;
        if let Err(err) = written {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(err);
        }
        if let Err(err) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(err.into());
        }

        info!(
            snapshot_id,
            entries = manifest.entry_count,
            documents = manifest.document_count,
            bytes = bytes.len(),
            "Backup written"
        );
        Ok(manifest)
    }

    async fn write_backup(
        &self,
        dir: &Path,
        archive: &[u8],
        manifest: &SnapshotManifest,
    ) -> Result<()> {
        oceanrag_vector::write_atomic(&dir.join(ARCHIVE_FILE), archive, self.sync_writes).await?;
        let manifest_json = serde_json::to_vec_pretty(manifest)
            .map_err(|e| AppError::Internal(format!("Failed to encode manifest: {}", e)))?;
        oceanrag_vector::write_atomic(&dir.join(MANIFEST_FILE), &manifest_json, self.sync_writes)
            .await?;
        Ok(())
    }

    /// Replace the whole index and document store with backup `snapshot_id`.
    ///
    /// The archive is verified and decoded before anything changes; a
    /// corrupt backup leaves the current state untouched.
    #[instrument(skip(self))]
    pub async fn restore(&self, snapshot_id: &str) -> Result<SnapshotManifest> {
        validate_id(snapshot_id)?;
        let op = self.begin(BackupState::Restoring)?;

        let dir = self.backup_dir.join(snapshot_id);
        let manifest = read_manifest(&dir).await?;
        let bytes = tokio::fs::read(dir.join(ARCHIVE_FILE)).await.map_err(|e| {
            AppError::CorruptSnapshot(format!("cannot read {}: {}", ARCHIVE_FILE, e))
        })?;

        let actual = checksum_hex(&bytes);
        if actual != manifest.checksum {
            warn!(snapshot_id, expected = %manifest.checksum, actual = %actual, "Checksum mismatch");
            return Err(AppError::CorruptSnapshot(format!(
                "checksum mismatch for backup '{}'",
                snapshot_id
            )));
        }

        let archive: Archive = postcard::from_bytes(&bytes)
            .map_err(|e| AppError::CorruptSnapshot(format!("archive: {}", e)))?;
        if archive.version != ARCHIVE_VERSION {
            return Err(AppError::CorruptSnapshot(format!(
                "unsupported archive version {}",
                archive.version
            )));
        }

        let prepared_index = self.index.prepare_restore(&archive.index)?;
        let prepared_documents = self.store.prepare_restore(&archive.documents)?;
        if prepared_index.entry_count() != prepared_documents.chunk_count() {
            return Err(AppError::CorruptSnapshot(format!(
                "index holds {} entries but documents reference {} chunks",
                prepared_index.entry_count(),
                prepared_documents.chunk_count()
            )));
        }

        let _exclusive = self.gate.exclusive().await;

        let previous_index = self
            .index
            .commit_restore(prepared_index)
            .await
            .map_err(|e| AppError::RestoreFailure(format!("index: {}", e)))?;

        if let Err(err) = self.store.commit_restore(prepared_documents).await {
            error!(error = %err, "Document restore failed, rolling back index");
            if let Err(rollback) = self.index.commit_restore(previous_index).await {
                error!(error = %rollback, "Index rollback failed");
                op.fail();
                return Err(AppError::RestoreFailure(format!(
                    "documents: {}; rollback failed: {}",
                    err, rollback
                )));
            }
            return Err(AppError::RestoreFailure(format!("documents: {}", err)));
        }

        info!(
            snapshot_id,
            entries = self.index.len(),
            documents = self.store.len(),
            "Restore complete"
        );
        Ok(manifest)
    }

    /// Manifests of all backups, oldest first.
    pub async fn list(&self) -> Result<Vec<SnapshotManifest>> {
        let mut manifests = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.backup_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(manifests),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') || !entry.file_type().await?.is_dir() {
                continue;
            }
            match read_manifest(&entry.path()).await {
                Ok(manifest) => manifests.push(manifest),
                Err(err) => warn!(path = ?entry.path(), error = %err, "Skipping unreadable backup"),
            }
        }

        manifests.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.snapshot_id.cmp(&b.snapshot_id))
        });
        Ok(manifests)
    }
}

async fn read_manifest(dir: &Path) -> Result<SnapshotManifest> {
    let path = dir.join(MANIFEST_FILE);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("backup at {}", dir.display())))
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::CorruptSnapshot(format!("{}: {}", MANIFEST_FILE, e)))
}

/// Snapshot ids become directory names.
fn validate_id(snapshot_id: &str) -> Result<()> {
    let valid = !snapshot_id.is_empty()
        && snapshot_id.len() <= 128
        && !snapshot_id.starts_with('.')
        && snapshot_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "invalid snapshot id '{}': use letters, digits, '-', '_' or '.'",
            snapshot_id
        )))
    }
}
