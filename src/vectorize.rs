//! Context-weighted vectorization.
//!
//! Naive per-chunk embeddings lose topical continuity at chunk boundaries.
//! [`ContextVectorizer::embed_with_context`] embeds each chunk together with
//! its neighbors, then blends the result with the neighbor vectors using
//! similarity-derived weights, so a chunk that closely tracks its neighbors
//! is smoothed toward them while a topically distinct chunk stays dominant.

use std::sync::Arc;

use crate::error::RagError;
use crate::llm::embeddings::Embedder;

/// Cosine similarity between two vectors. Returns 0 when either vector has
/// zero norm (or the lengths differ) so downstream ordering stays stable.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[derive(Clone)]
pub struct ContextVectorizer {
    embedder: Arc<dyn Embedder>,
}

impl ContextVectorizer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Embed a single text (a query, or a chunk without context).
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.embedder.embed(text).await
    }

    /// Produce one context-weighted vector per input chunk, in chunk order.
    ///
    /// Pass 1 embeds each chunk concatenated with up to `window` neighbors
    /// on each side. Pass 2 blends each contextual vector with its left and
    /// right neighbors: with `ls`/`rs` the cosine similarities to the
    /// neighbors and `total = ls + rs + 1`, the weights are `1/total`,
    /// `ls/total` and `rs/total`. At the sequence edges the missing
    /// neighbor collapses to the nearest valid position (itself for a
    /// single-chunk input), which keeps `total >= 1` and division safe.
    pub async fn embed_with_context(
        &self,
        chunks: &[String],
        window: usize,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        // Pass 1: raw contextual vectors from neighbor-window concatenation
        let window_texts: Vec<String> = (0..chunks.len())
            .map(|i| {
                let start = i.saturating_sub(window);
                let end = (i + window + 1).min(chunks.len());
                chunks[start..end].join(" ")
            })
            .collect();
        let contextual = self.embedder.embed_batch(&window_texts).await?;

        // Pass 2: similarity-weighted blend with neighbor vectors
        let n = contextual.len();
        let mut enhanced = Vec::with_capacity(n);
        for i in 0..n {
            let central = &contextual[i];
            let left = &contextual[i.saturating_sub(1)];
            let right = &contextual[(i + 1).min(n - 1)];

            // A neighbor of a different dimension contributes nothing
            // (its similarity is already 0) and must not be indexed
            let ls = cosine_similarity(central, left);
            let rs = cosine_similarity(central, right);
            let total = ls + rs + 1.0;

            let mut blended = Vec::with_capacity(central.len());
            for d in 0..central.len() {
                let mut value = central[d] / total;
                if left.len() == central.len() {
                    value += ls * left[d] / total;
                }
                if right.len() == central.len() {
                    value += rs * right[d] / total;
                }
                blended.push(value);
            }
            enhanced.push(blended);
        }

        Ok(enhanced)
    }
}
