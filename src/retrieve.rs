//! Hybrid retrieval: vector similarity fused with lexical keyword matching,
//! followed by a direct-similarity rerank.
//!
//! The public entry point over-fetches by an expansion factor before the
//! rerank: fusion scores (distance-derived and flat lexical weights) are
//! not comparable across the two retrieval modes, so a wider candidate pool
//! is cut down by one consistent criterion: cosine similarity of each
//! candidate's own embedding against the prompt vector.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::models::RetrievalResult;
use crate::store::IndexStore;
use crate::vectorize::{cosine_similarity, ContextVectorizer};

/// Flat fusion score for chunks found only by lexical search.
const LEXICAL_SCORE: f32 = 0.5;

pub struct HybridRetriever {
    store: Arc<IndexStore>,
    vectorizer: ContextVectorizer,
    use_hybrid: bool,
    max_keywords: usize,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<IndexStore>,
        vectorizer: ContextVectorizer,
        use_hybrid: bool,
        max_keywords: usize,
    ) -> Self {
        if use_hybrid {
            tracing::info!("Using hybrid search for document retrieval");
        }
        Self {
            store,
            vectorizer,
            use_hybrid,
            max_keywords,
        }
    }

    /// Retrieve the `top_n` most relevant chunk texts for a prompt.
    ///
    /// Retrieval failures never block an answer: backend errors degrade to
    /// an empty result with a warning.
    pub async fn retrieve(&self, prompt: &str, top_n: usize) -> Vec<String> {
        self.retrieve_with_expansion(prompt, top_n, 3).await
    }

    pub async fn retrieve_with_expansion(
        &self,
        prompt: &str,
        top_n: usize,
        expansion_factor: usize,
    ) -> Vec<String> {
        tracing::info!("Retrieving documents for prompt");

        let prompt_vector = match self.vectorizer.embed(prompt).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Prompt embedding failed, returning no documents: {e}");
                return Vec::new();
            }
        };

        let pool = top_n * expansion_factor;
        let candidates = if self.use_hybrid {
            self.hybrid_search(prompt, &prompt_vector, pool)
        } else {
            self.search_in_index(&prompt_vector, pool)
        };

        self.rerank(candidates, &prompt_vector, top_n).await
    }

    /// Vector-only search: nearest neighbors joined with their texts.
    fn search_in_index(&self, prompt_vector: &[f32], top_n: usize) -> Vec<RetrievalResult> {
        let hits = self.store.search_vectors(prompt_vector, top_n);
        if hits.is_empty() {
            tracing::warn!("No similar chunks found in the vector index");
            return Vec::new();
        }

        let ids: Vec<i64> = hits.iter().map(|(id, _)| *id).collect();
        let texts = self.store.fetch_texts(&ids);
        if texts.len() < hits.len() {
            tracing::warn!(
                "Vector index returned {} ids but only {} have stored text",
                hits.len(),
                texts.len()
            );
        }

        hits.into_iter()
            .filter_map(|(id, distance)| {
                texts.get(&id).map(|text| RetrievalResult {
                    chunk_id: id,
                    text: text.clone(),
                    score: 1.0 / (1.0 + distance),
                })
            })
            .collect()
    }

    /// Hybrid search: vector and lexical results fused into one ranking.
    fn hybrid_search(
        &self,
        prompt: &str,
        prompt_vector: &[f32],
        top_n: usize,
    ) -> Vec<RetrievalResult> {
        tracing::info!("Performing hybrid search");

        let keywords = self.extract_keywords(prompt);
        tracing::debug!("Extracted keywords: {keywords:?}");

        // The two searches have no ordering dependency on each other;
        // fusion below is the synchronization point.
        let vector_hits = self.store.search_vectors(prompt_vector, top_n);
        let lexical_hits = self.store.search_lexical(&keywords, top_n);

        tracing::info!(
            "Found {} vector hits and {} lexical hits",
            vector_hits.len(),
            lexical_hits.len()
        );

        let vector_ids: Vec<i64> = vector_hits.iter().map(|(id, _)| *id).collect();
        let texts = self.store.fetch_texts(&vector_ids);

        fuse_results(&vector_hits, &lexical_hits, &texts, top_n)
    }

    /// Extract discriminative keywords from a prompt: lowercase tokens,
    /// minus stop-words and short tokens, noun-like words only, ordered
    /// rarest-first by their frequency in the prompt.
    pub fn extract_keywords(&self, prompt: &str) -> Vec<String> {
        let lowered = prompt.to_lowercase();
        let filtered: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty() && w.chars().count() > 2 && !is_stop_word(w))
            .collect();

        let mut freq: HashMap<&str, usize> = HashMap::new();
        for word in &filtered {
            *freq.entry(word).or_insert(0) += 1;
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut unique: Vec<&str> = Vec::new();
        for word in &filtered {
            if is_probable_noun(word) && seen.insert(word) {
                unique.push(word);
            }
        }

        // Stable sort keeps first-occurrence order among equal frequencies
        unique.sort_by_key(|w| freq[w]);
        unique.truncate(self.max_keywords);
        unique.into_iter().map(|w| w.to_string()).collect()
    }

    /// Rerank candidates by direct similarity of their own embedding to the
    /// prompt vector; return the top `top_n` texts, highest first.
    async fn rerank(
        &self,
        candidates: Vec<RetrievalResult>,
        prompt_vector: &[f32],
        top_n: usize,
    ) -> Vec<String> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<RetrievalResult> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.vectorizer.embed(&candidate.text).await {
                Ok(vector) => scored.push(RetrievalResult {
                    score: cosine_similarity(prompt_vector, &vector),
                    ..candidate
                }),
                Err(e) => {
                    tracing::warn!(
                        "Skipping chunk {} during rerank, embedding failed: {e}",
                        candidate.chunk_id
                    );
                }
            }
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let ids: Vec<i64> = scored.iter().take(top_n).map(|r| r.chunk_id).collect();
        tracing::info!("Reranking completed, top chunk ids: {ids:?}");

        scored.into_iter().take(top_n).map(|r| r.text).collect()
    }
}

/// Fuse vector and lexical hits into one ranking keyed by chunk id.
/// Vector hits score `1/(1+distance)`; lexical-only hits get the flat
/// lexical weight; a chunk found by both keeps the higher of the two.
fn fuse_results(
    vector_hits: &[(i64, f32)],
    lexical_hits: &[(i64, String)],
    texts: &HashMap<i64, String>,
    limit: usize,
) -> Vec<RetrievalResult> {
    let mut combined: HashMap<i64, RetrievalResult> = HashMap::new();

    for (chunk_id, distance) in vector_hits {
        combined.insert(
            *chunk_id,
            RetrievalResult {
                chunk_id: *chunk_id,
                text: texts.get(chunk_id).cloned().unwrap_or_default(),
                score: 1.0 / (1.0 + distance),
            },
        );
    }

    for (chunk_id, text) in lexical_hits {
        combined
            .entry(*chunk_id)
            .and_modify(|r| r.score = r.score.max(LEXICAL_SCORE))
            .or_insert_with(|| RetrievalResult {
                chunk_id: *chunk_id,
                text: text.clone(),
                score: LEXICAL_SCORE,
            });
    }

    let mut results: Vec<RetrievalResult> = combined.into_values().collect();
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    results
}

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS_EN.contains(&word) || STOP_WORDS_FR.contains(&word)
}

/// Noun-only filter without a POS tagger: closed-class words are already
/// removed by the stop list, so this excludes the remaining obvious
/// non-nouns (adverbs in -ly, a handful of auxiliaries).
fn is_probable_noun(word: &str) -> bool {
    !word.ends_with("ly") && !NON_NOUNS.contains(&word)
}

const NON_NOUNS: &[&str] = &[
    "also", "always", "anyway", "else", "ever", "never", "often", "perhaps", "quite", "rather",
    "sometimes", "somewhat", "soon", "still", "though", "thus", "together", "yet",
];

const STOP_WORDS_EN: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "cannot", "could", "couldn", "did", "didn", "do", "does", "doesn",
    "doing", "don", "down", "during", "each", "few", "for", "from", "further", "had", "hadn",
    "has", "hasn", "have", "haven", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "isn", "it", "its", "itself", "just",
    "me", "might", "more", "most", "must", "mustn", "my", "myself", "no", "nor", "not", "now",
    "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over",
    "own", "same", "shall", "she", "should", "shouldn", "so", "some", "such", "than", "that",
    "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this",
    "those", "through", "to", "too", "under", "until", "up", "very", "was", "wasn", "we", "were",
    "weren", "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with",
    "won", "would", "wouldn", "you", "your", "yours", "yourself", "yourselves",
];

const STOP_WORDS_FR: &[&str] = &[
    "ai", "aie", "aient", "aies", "ait", "alors", "au", "aux", "avec", "avez", "avons", "avait",
    "avaient", "ce", "ces", "cet", "cette", "chez", "comme", "dans", "de", "des", "donc", "du",
    "elle", "elles", "en", "est", "et", "etaient", "etait", "etes", "eu", "il", "ils", "je",
    "la", "le", "les", "leur", "leurs", "lui", "ma", "mais", "me", "mes", "moi", "mon", "ne",
    "nos", "notre", "nous", "on", "ont", "ou", "par", "pas", "pour", "qu", "que", "qui", "sa",
    "se", "ses", "soit", "son", "sont", "suis", "sur", "ta", "te", "tes", "toi", "ton", "tu",
    "un", "une", "vos", "votre", "vous",
];
