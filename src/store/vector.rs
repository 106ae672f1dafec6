use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::RagError;

/// A stored vector entry, keyed by the chunk id shared with the relational
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    chunk_id: i64,
    vector: Vec<f32>,
}

/// In-memory flat vector index with disk persistence and L2 search.
pub struct VectorIndex {
    entries: RwLock<Vec<VectorEntry>>,
    persist_path: PathBuf,
}

impl VectorIndex {
    pub fn open(persist_path: &Path) -> Result<Self, RagError> {
        let entries = if persist_path.exists() {
            let data = std::fs::read_to_string(persist_path).map_err(|e| {
                RagError::BackendUnavailable(format!(
                    "failed to read vector index {}: {e}",
                    persist_path.display()
                ))
            })?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path: persist_path.to_path_buf(),
        })
    }

    /// Insert or replace the vector for a chunk id. Replacing keeps the
    /// one-entry-per-chunk invariant across ingestion retries.
    pub fn add(&self, chunk_id: i64, vector: Vec<f32>) {
        {
            let mut entries = self.entries.write();
            entries.retain(|e| e.chunk_id != chunk_id);
            entries.push(VectorEntry { chunk_id, vector });
        }
        self.persist();
    }

    /// Nearest neighbors of `query` by Euclidean distance, ascending.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(i64, f32)> {
        let entries = self.entries.read();

        let mut scored: Vec<(i64, f32)> = entries
            .iter()
            .filter(|e| e.vector.len() == query.len())
            .map(|e| (e.chunk_id, l2_distance(query, &e.vector)))
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every entry.
    pub fn reset(&self) {
        self.entries.write().clear();
        self.persist();
    }

    /// Persist entries to disk (atomic write via temp file + rename).
    /// Persistence failures are logged, not propagated: the in-memory
    /// index remains authoritative for the running process.
    fn persist(&self) {
        let entries = self.entries.read();
        match serde_json::to_string(&*entries) {
            Ok(data) => {
                let tmp_path = self.persist_path.with_extension("json.tmp");
                if let Err(e) = std::fs::write(&tmp_path, &data)
                    .and_then(|_| std::fs::rename(&tmp_path, &self.persist_path))
                {
                    tracing::error!("Failed to persist vector index: {e}");
                }
            }
            Err(e) => tracing::error!("Failed to serialize vector index: {e}"),
        }
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
