//! Persistence layer for oceanrag-vector.
//!
//! Layout under the configured data path:
//! - `{data_path}/metadata.json` - index shape and bookkeeping
//! - `{data_path}/vectors.bin` - checksummed snapshot of all entries
//!
//! Both files are written to a temporary sibling and renamed into place, so a
//! crash leaves either the previous or the new version on disk.

use crate::config::IndexConfig;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::index::IndexState;
use crate::snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const METADATA_FILE: &str = "metadata.json";
const VECTORS_FILE: &str = "vectors.bin";

/// Index metadata stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexMetadata {
    dimensions: usize,
    metric: String,
    entry_count: usize,
    format_version: u32,
    saved_at: DateTime<Utc>,
}

/// Write the full state to disk.
pub(crate) async fn save(config: &IndexConfig, base_path: &Path, state: &IndexState) -> Result<()> {
    tokio::fs::create_dir_all(base_path).await?;

    let bytes = snapshot::encode(state, config.dimensions, config.metric)?;
    write_atomic(&base_path.join(VECTORS_FILE), &bytes, config.sync_writes).await?;

    let metadata = IndexMetadata {
        dimensions: config.dimensions,
        metric: config.metric.name().to_string(),
        entry_count: state.len(),
        format_version: snapshot::FORMAT_VERSION,
        saved_at: Utc::now(),
    };
    let metadata_json = serde_json::to_vec_pretty(&metadata)
        .map_err(|e| Error::Persistence(format!("Failed to serialize metadata: {}", e)))?;
    write_atomic(&base_path.join(METADATA_FILE), &metadata_json, config.sync_writes).await?;

    debug!(path = ?base_path, entries = state.len(), "Saved index");
    Ok(())
}

/// Load persisted state, or an empty state when nothing has been saved yet.
pub(crate) async fn load(config: &IndexConfig, base_path: &Path) -> Result<IndexState> {
    let metadata_path = base_path.join(METADATA_FILE);
    if tokio::fs::try_exists(&metadata_path).await? {
        let metadata_json = tokio::fs::read(&metadata_path).await?;
        let metadata: IndexMetadata = serde_json::from_slice(&metadata_json)
            .map_err(|e| Error::Persistence(format!("Failed to parse metadata: {}", e)))?;

        if metadata.dimensions != config.dimensions {
            return Err(Error::Configuration(format!(
                "index at {:?} has {} dimensions, configuration asks for {}",
                base_path, metadata.dimensions, config.dimensions
            )));
        }
        let metric: DistanceMetric = metadata.metric.parse().map_err(Error::Persistence)?;
        if metric != config.metric {
            return Err(Error::Configuration(format!(
                "index at {:?} uses metric {}, configuration asks for {}",
                base_path, metric, config.metric
            )));
        }
    }

    let vectors_path = base_path.join(VECTORS_FILE);
    if !tokio::fs::try_exists(&vectors_path).await? {
        debug!(path = ?base_path, "No persisted vectors, starting empty");
        return Ok(IndexState::default());
    }

    let bytes = tokio::fs::read(&vectors_path).await?;
    let state = snapshot::decode(&bytes, config.dimensions, config.metric)?;
    info!(path = ?base_path, entries = state.len(), "Loaded index");
    Ok(state)
}

/// Write `bytes` to `path` through a temporary file and rename.
pub async fn write_atomic(path: &Path, bytes: &[u8], sync: bool) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    if sync {
        file.sync_all().await?;
    }
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
