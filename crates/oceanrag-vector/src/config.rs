//! Configuration for oceanrag-vector.

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a vector index.
///
/// The dimensionality and metric are fixed for the lifetime of the index
/// (and of anything persisted from it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Dimensionality of every stored vector.
    pub dimensions: usize,

    /// Similarity metric used for search.
    pub metric: DistanceMetric,

    /// Path to store data on disk. If None, data is kept in memory only.
    pub data_path: Option<PathBuf>,

    /// Call `fsync` on persisted files before acknowledging a write.
    pub sync_writes: bool,
}

impl IndexConfig {
    /// Create an in-memory configuration.
    ///
    /// Data will not be persisted and will be lost when the process exits.
    pub fn memory(dimensions: usize) -> Self {
        Self {
            dimensions,
            metric: DistanceMetric::default(),
            data_path: None,
            sync_writes: false,
        }
    }

    /// Create a persistent configuration.
    ///
    /// Data will be stored at the specified path and loaded on open.
    pub fn persistent<P: Into<PathBuf>>(path: P, dimensions: usize) -> Self {
        Self {
            data_path: Some(path.into()),
            sync_writes: true,
            ..Self::memory(dimensions)
        }
    }

    /// Set the similarity metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Enable or disable `fsync` on writes.
    pub fn with_sync_writes(mut self, enabled: bool) -> Self {
        self.sync_writes = enabled;
        self
    }

    /// Check the configuration before opening an index.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(Error::Configuration(
                "dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
