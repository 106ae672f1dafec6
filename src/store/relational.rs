use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::RagError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentRow {
    id: i64,
    title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChunkRow {
    id: i64,
    document_id: i64,
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Tables {
    next_document_id: i64,
    next_chunk_id: i64,
    documents: Vec<DocumentRow>,
    chunks: Vec<ChunkRow>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            next_document_id: 1,
            next_chunk_id: 1,
            documents: Vec::new(),
            chunks: Vec::new(),
        }
    }
}

/// Relational half of the index store: document and chunk rows with
/// autoincrement ids, persisted as JSON.
pub struct ChunkStore {
    tables: RwLock<Tables>,
    persist_path: PathBuf,
}

impl ChunkStore {
    pub fn open(persist_path: &Path) -> Result<Self, RagError> {
        let tables = if persist_path.exists() {
            let data = std::fs::read_to_string(persist_path).map_err(|e| {
                RagError::BackendUnavailable(format!(
                    "failed to read chunk store {}: {e}",
                    persist_path.display()
                ))
            })?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Tables::default()
        };

        Ok(Self {
            tables: RwLock::new(tables),
            persist_path: persist_path.to_path_buf(),
        })
    }

    /// Insert a document row and return its id.
    pub fn insert_document(&self, title: &str) -> i64 {
        let id = {
            let mut tables = self.tables.write();
            let id = tables.next_document_id;
            tables.next_document_id += 1;
            tables.documents.push(DocumentRow {
                id,
                title: title.to_string(),
            });
            id
        };
        self.persist();
        tracing::debug!("Inserted document {id} ({title})");
        id
    }

    /// Insert a chunk row referencing an existing document.
    pub fn insert_chunk(&self, text: &str, document_id: i64) -> Result<i64, RagError> {
        let id = {
            let mut tables = self.tables.write();
            if !tables.documents.iter().any(|d| d.id == document_id) {
                return Err(RagError::NotFound(format!(
                    "document {document_id} does not exist"
                )));
            }
            let id = tables.next_chunk_id;
            tables.next_chunk_id += 1;
            tables.chunks.push(ChunkRow {
                id,
                document_id,
                text: text.to_string(),
            });
            id
        };
        self.persist();
        Ok(id)
    }

    /// Case-sensitive substring search, up to `k` rows per keyword,
    /// deduplicated by chunk id across keywords. The combined result may
    /// therefore exceed `k`.
    pub fn search_lexical(&self, keywords: &[String], k: usize) -> Vec<(i64, String)> {
        let tables = self.tables.read();
        let mut seen: HashSet<i64> = HashSet::new();
        let mut results = Vec::new();

        for keyword in keywords {
            for row in tables
                .chunks
                .iter()
                .filter(|c| c.text.contains(keyword.as_str()))
                .take(k)
            {
                if seen.insert(row.id) {
                    results.push((row.id, row.text.clone()));
                }
            }
        }
        results
    }

    /// Fetch chunk texts by id. Input ids are deduplicated; ids with no row
    /// are silently absent from the result.
    pub fn fetch_texts(&self, chunk_ids: &[i64]) -> HashMap<i64, String> {
        if chunk_ids.is_empty() {
            tracing::warn!("Empty chunk id list provided to fetch_texts");
            return HashMap::new();
        }

        let unique: HashSet<i64> = chunk_ids.iter().copied().collect();
        let tables = self.tables.read();
        tables
            .chunks
            .iter()
            .filter(|c| unique.contains(&c.id))
            .map(|c| (c.id, c.text.clone()))
            .collect()
    }

    pub fn document_count(&self) -> usize {
        self.tables.read().documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.tables.read().chunks.len()
    }

    /// Delete all documents and chunks. Id counters keep advancing so stale
    /// external references can never alias a new row.
    pub fn reset(&self) {
        {
            let mut tables = self.tables.write();
            tables.documents.clear();
            tables.chunks.clear();
        }
        self.persist();
    }

    fn persist(&self) {
        let tables = self.tables.read();
        match serde_json::to_string(&*tables) {
            Ok(data) => {
                let tmp_path = self.persist_path.with_extension("json.tmp");
                if let Err(e) = std::fs::write(&tmp_path, &data)
                    .and_then(|_| std::fs::rename(&tmp_path, &self.persist_path))
                {
                    tracing::error!("Failed to persist chunk store: {e}");
                }
            }
            Err(e) => tracing::error!("Failed to serialize chunk store: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store(dir: &Path) -> ChunkStore {
        ChunkStore::open(&dir.join("chunks.json")).unwrap()
    }

    #[test]
    fn test_insert_document_assigns_sequential_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        let a = store.insert_document("a.txt");
        let b = store.insert_document("b.txt");
        assert_eq!(b, a + 1);
    }

    #[test]
    fn test_insert_chunk_requires_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        assert!(matches!(
            store.insert_chunk("orphan", 99),
            Err(RagError::NotFound(_))
        ));

        let doc = store.insert_document("doc.txt");
        assert!(store.insert_chunk("hello", doc).is_ok());
    }

    #[test]
    fn test_lexical_search_is_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        let doc = store.insert_document("doc.txt");
        store.insert_chunk("The Cat sat", doc).unwrap();

        assert_eq!(store.search_lexical(&["Cat".to_string()], 5).len(), 1);
        assert!(store.search_lexical(&["cat".to_string()], 5).is_empty());
    }

    #[test]
    fn test_lexical_search_limit_is_per_keyword() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        let doc = store.insert_document("doc.txt");
        for i in 0..5 {
            store.insert_chunk(&format!("apple {i}"), doc).unwrap();
            store.insert_chunk(&format!("orange {i}"), doc).unwrap();
        }

        // 2 rows per keyword, 2 keywords -> up to 4 combined results
        let results =
            store.search_lexical(&["apple".to_string(), "orange".to_string()], 2);
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_lexical_search_dedups_across_keywords() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        let doc = store.insert_document("doc.txt");
        let id = store.insert_chunk("apple orange", doc).unwrap();

        let results =
            store.search_lexical(&["apple".to_string(), "orange".to_string()], 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, id);
    }

    #[test]
    fn test_fetch_texts_dedups_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        let doc = store.insert_document("doc.txt");
        let id = store.insert_chunk("hello", doc).unwrap();

        let map = store.fetch_texts(&[id, id, 9999]);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&id], "hello");

        assert!(store.fetch_texts(&[]).is_empty());
    }

    #[test]
    fn test_reset_clears_rows_but_keeps_counters() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        let doc = store.insert_document("doc.txt");
        let chunk = store.insert_chunk("text", doc).unwrap();

        store.reset();
        assert_eq!(store.document_count(), 0);
        assert_eq!(store.chunk_count(), 0);

        let doc2 = store.insert_document("new.txt");
        let chunk2 = store.insert_chunk("more", doc2).unwrap();
        assert!(doc2 > doc);
        assert!(chunk2 > chunk);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.json");
        let id = {
            let store = ChunkStore::open(&path).unwrap();
            let doc = store.insert_document("doc.txt");
            store.insert_chunk("persisted text", doc).unwrap()
        };
        let reopened = ChunkStore::open(&path).unwrap();
        assert_eq!(reopened.fetch_texts(&[id])[&id], "persisted text");
    }
}
