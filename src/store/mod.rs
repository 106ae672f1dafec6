//! The paired vector index + relational chunk store.
//!
//! Both halves are keyed by the same chunk id, which is the single join
//! point between them. Ingestion writes the relational row strictly before
//! the vector entry: a crash between the two leaves a chunk reachable by
//! lexical search only, which is acceptable, while the reverse order would
//! leave a vector with no retrievable text.

mod relational;
mod vector;

use std::collections::HashMap;
use std::path::Path;

use crate::error::RagError;
use relational::ChunkStore;
use vector::VectorIndex;

pub struct IndexStore {
    chunks: ChunkStore,
    vectors: VectorIndex,
}

impl IndexStore {
    /// Open (or create) both stores under `data_dir`. Open failures are
    /// fatal to the caller; every other backend error downstream degrades
    /// to an empty result.
    pub fn open(data_dir: &Path) -> Result<Self, RagError> {
        std::fs::create_dir_all(data_dir).map_err(|e| {
            RagError::BackendUnavailable(format!(
                "failed to create data dir {}: {e}",
                data_dir.display()
            ))
        })?;

        Ok(Self {
            chunks: ChunkStore::open(&data_dir.join("chunks.json"))?,
            vectors: VectorIndex::open(&data_dir.join("vectors.json"))?,
        })
    }

    pub fn insert_document(&self, title: &str) -> i64 {
        self.chunks.insert_document(title)
    }

    pub fn insert_chunk(&self, text: &str, document_id: i64) -> Result<i64, RagError> {
        self.chunks.insert_chunk(text, document_id)
    }

    /// Store the vector for a chunk. Re-adding the same chunk id replaces
    /// the previous entry.
    pub fn add_vector(&self, chunk_id: i64, vector: Vec<f32>) {
        self.vectors.add(chunk_id, vector);
    }

    /// Nearest chunks to `query_vector` as `(chunk_id, distance)` pairs,
    /// ascending by Euclidean distance.
    pub fn search_vectors(&self, query_vector: &[f32], k: usize) -> Vec<(i64, f32)> {
        self.vectors.search(query_vector, k)
    }

    /// Chunks whose text contains any keyword (case-sensitive substring),
    /// up to `k` rows per keyword, deduplicated by id.
    pub fn search_lexical(&self, keywords: &[String], k: usize) -> Vec<(i64, String)> {
        self.chunks.search_lexical(keywords, k)
    }

    /// Texts for the given chunk ids; missing ids are silently absent.
    pub fn fetch_texts(&self, chunk_ids: &[i64]) -> HashMap<i64, String> {
        self.chunks.fetch_texts(chunk_ids)
    }

    pub fn document_count(&self) -> usize {
        self.chunks.document_count()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.chunk_count()
    }

    pub fn vector_count(&self) -> usize {
        self.vectors.len()
    }

    /// Full cleanup: delete all documents, chunks and vectors.
    pub fn reset(&self) {
        self.chunks.reset();
        self.vectors.reset();
        tracing::info!("Index store has been reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        assert!(IndexStore::open(&nested).is_ok());
        assert!(nested.exists());
    }

    #[test]
    fn test_ids_join_both_stores() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::open(dir.path()).unwrap();

        let doc = store.insert_document("doc.txt");
        let chunk = store.insert_chunk("cat sat mat", doc).unwrap();
        store.add_vector(chunk, vec![1.0, 0.0]);

        let hits = store.search_vectors(&[1.0, 0.0], 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, chunk);

        let texts = store.fetch_texts(&[hits[0].0]);
        assert_eq!(texts[&chunk], "cat sat mat");
    }

    #[test]
    fn test_chunk_without_vector_is_lexical_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::open(dir.path()).unwrap();

        let doc = store.insert_document("doc.txt");
        let chunk = store.insert_chunk("orphaned row", doc).unwrap();

        assert!(store.search_vectors(&[1.0, 0.0], 5).is_empty());
        let lexical = store.search_lexical(&["orphaned".to_string()], 5);
        assert_eq!(lexical.len(), 1);
        assert_eq!(lexical[0].0, chunk);
    }

    #[test]
    fn test_reset_clears_both_stores() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::open(dir.path()).unwrap();

        let doc = store.insert_document("doc.txt");
        let chunk = store.insert_chunk("some text", doc).unwrap();
        store.add_vector(chunk, vec![1.0]);

        store.reset();
        assert_eq!(store.document_count(), 0);
        assert_eq!(store.chunk_count(), 0);
        assert_eq!(store.vector_count(), 0);
    }
}
