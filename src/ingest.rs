//! Document ingestion: walk files, extract text, chunk, vectorize, store.
//!
//! Per chunk the relational row is written strictly before its vector, so
//! an interrupted run can only leave rows without vectors (reachable via
//! lexical search), never vectors without text.

use std::path::Path;
use std::sync::Arc;

use walkdir::WalkDir;

use crate::chunk::chunk;
use crate::error::RagError;
use crate::extract::{DocFormat, TextExtractor};
use crate::store::IndexStore;
use crate::vectorize::ContextVectorizer;

pub struct DocumentIndexer {
    store: Arc<IndexStore>,
    extractor: Arc<dyn TextExtractor>,
    vectorizer: ContextVectorizer,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentIndexer {
    pub fn new(
        store: Arc<IndexStore>,
        extractor: Arc<dyn TextExtractor>,
        vectorizer: ContextVectorizer,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            store,
            extractor,
            vectorizer,
            chunk_size,
            chunk_overlap,
        }
    }

    /// Recursively index every supported file under `folder`. Returns the
    /// total number of chunks written.
    pub async fn index_folder(&self, folder: &Path) -> Result<usize, RagError> {
        if !folder.is_dir() {
            return Err(RagError::NotFound(format!(
                "folder {} does not exist",
                folder.display()
            )));
        }

        tracing::info!("Indexing folder {}", folder.display());
        let mut files = Vec::new();
        for entry in WalkDir::new(folder).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();

        let mut total = 0;
        for path in &files {
            total += self.index_file(path).await?;
        }
        Ok(total)
    }

    /// Index an explicit list of files. Returns the total number of chunks
    /// written.
    pub async fn index_files(&self, paths: &[impl AsRef<Path>]) -> Result<usize, RagError> {
        let mut total = 0;
        for path in paths {
            total += self.index_file(path.as_ref()).await?;
        }
        Ok(total)
    }

    /// Index one file. Unsupported formats and extraction failures are
    /// skipped with a warning; chunking configuration errors propagate
    /// because they fail every file the same way.
    async fn index_file(&self, path: &Path) -> Result<usize, RagError> {
        let Some(format) = DocFormat::from_path(path) else {
            tracing::warn!("Skipping unsupported file {}", path.display());
            return Ok(0);
        };

        let text = match self.extractor.extract(path, format) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Skipping {}: {e}", path.display());
                return Ok(0);
            }
        };

        let chunks = chunk(&text, self.chunk_size, self.chunk_overlap)?;
        if chunks.is_empty() {
            tracing::warn!("No content extracted from {}", path.display());
            return Ok(0);
        }

        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let document_id = self.store.insert_document(&title);

        // Vectorization failure degrades to lexical-only rows
        let vectors = match self.vectorizer.embed_with_context(&chunks, 1).await {
            Ok(vectors) => Some(vectors),
            Err(e) => {
                tracing::warn!(
                    "Vectorization failed for {}, indexing text only: {e}",
                    path.display()
                );
                None
            }
        };

        for (i, text) in chunks.iter().enumerate() {
            let chunk_id = self.store.insert_chunk(text, document_id)?;
            match vectors.as_ref().and_then(|v| v.get(i)) {
                Some(vector) => self.store.add_vector(chunk_id, vector.clone()),
                None if vectors.is_some() => {
                    tracing::warn!(
                        "Backend returned no vector for chunk {i} of {}, \
                         indexing that chunk as text only",
                        path.display()
                    );
                }
                None => {}
            }
        }

        tracing::info!("Indexed {} as {} chunks", path.display(), chunks.len());
        Ok(chunks.len())
    }
}
