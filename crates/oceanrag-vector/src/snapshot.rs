//! Self-describing snapshot encoding.
//!
//! Layout:
//!
//! ```text
//! ┌──────────┬─────────────┬──────────────────┬──────────────────────┐
//! │ magic(8) │ version(u32)│ sha256(body)(32) │ body (postcard)      │
//! └──────────┴─────────────┴──────────────────┴──────────────────────┘
//! ```
//!
//! The same encoding backs `vectors.bin` on disk, so a file truncated by a
//! crash is detected on open the same way a damaged backup is on restore.

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::index::{IndexState, StoredEntry};
use crate::types::{ChunkId, EntryMetadata};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const MAGIC: &[u8; 8] = b"OCNVIDX\0";

/// Current snapshot format version.
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = MAGIC.len() + 4 + 32;

#[derive(Serialize, Deserialize)]
struct SnapshotBody {
    dimensions: usize,
    metric: DistanceMetric,
    next_seq: u64,
    entries: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    chunk_id: ChunkId,
    seq: u64,
    vector: Vec<f32>,
    metadata: EntryMetadata,
}

/// Encode a state. Entries are written in insertion order, so equal states
/// produce byte-identical snapshots.
pub(crate) fn encode(state: &IndexState, dimensions: usize, metric: DistanceMetric) -> Result<Vec<u8>> {
    let body = SnapshotBody {
        dimensions,
        metric,
        next_seq: state.next_seq(),
        entries: state
            .ordered()
            .into_iter()
            .map(|(id, e)| SnapshotEntry {
                chunk_id: id.clone(),
                seq: e.seq,
                vector: e.vector.clone(),
                metadata: e.metadata.clone(),
            })
            .collect(),
    };

    let body = postcard::to_allocvec(&body)
        .map_err(|e| Error::Persistence(format!("Failed to encode snapshot: {}", e)))?;

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&Sha256::digest(&body));
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode and verify snapshot bytes for an index of the given shape.
pub(crate) fn decode(bytes: &[u8], dimensions: usize, metric: DistanceMetric) -> Result<IndexState> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::CorruptSnapshot(format!(
            "snapshot is {} bytes, shorter than its header",
            bytes.len()
        )));
    }

    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(Error::CorruptSnapshot("bad magic".to_string()));
    }

    let (version, rest) = rest.split_at(4);
    let mut version_bytes = [0u8; 4];
    version_bytes.copy_from_slice(version);
    let version = u32::from_le_bytes(version_bytes);
    if version != FORMAT_VERSION {
        return Err(Error::CorruptSnapshot(format!(
            "unsupported format version {}",
            version
        )));
    }

    let (expected, body) = rest.split_at(32);
    let actual = Sha256::digest(body);
    if actual.as_slice() != expected {
        return Err(Error::CorruptSnapshot(format!(
            "checksum mismatch: header {}, payload {}",
            hex::encode(expected),
            hex::encode(actual)
        )));
    }

    let body: SnapshotBody = postcard::from_bytes(body)
        .map_err(|e| Error::CorruptSnapshot(format!("Failed to decode snapshot body: {}", e)))?;

    if body.dimensions != dimensions {
        return Err(Error::DimensionMismatch {
            expected: dimensions,
            actual: body.dimensions,
        });
    }
    if body.metric != metric {
        return Err(Error::Configuration(format!(
            "snapshot uses metric {}, index uses {}",
            body.metric, metric
        )));
    }

    let mut entries = Vec::with_capacity(body.entries.len());
    for entry in body.entries {
        crate::index::check_vector(&entry.vector, dimensions)
            .map_err(|e| Error::CorruptSnapshot(format!("entry '{}': {}", entry.chunk_id, e)))?;
        if entry.seq >= body.next_seq {
            return Err(Error::CorruptSnapshot(format!(
                "entry '{}' has sequence {} past the recorded end {}",
                entry.chunk_id, entry.seq, body.next_seq
            )));
        }
        entries.push((
            entry.chunk_id,
            StoredEntry {
                seq: entry.seq,
                vector: entry.vector,
                metadata: entry.metadata,
            },
        ));
    }

    let count = entries.len();
    let state = IndexState::from_parts(entries, body.next_seq);
    if state.len() != count {
        return Err(Error::CorruptSnapshot("duplicate chunk ids in snapshot".to_string()));
    }
    Ok(state)
}

/// SHA-256 of arbitrary bytes as lowercase hex.
pub fn checksum_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
