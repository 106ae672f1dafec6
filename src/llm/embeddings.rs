use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::RagError;

/// Maximum characters to send per text to the embedding API.
/// Keeps dense inputs safely under the context window of small embedding
/// models such as all-minilm.
const MAX_EMBED_CHARS: usize = 3_000;

/// The embedding backend seam. Implementations must be deterministic for
/// identical input so retrieval stays reproducible.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::BackendUnavailable("no embedding returned".to_string()))
    }
}

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// HTTP embedding client for Ollama or OpenAI-compatible APIs.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<String> = texts
            .iter()
            .map(|t| truncate_for_embedding(t).to_string())
            .collect();

        let embeddings = match self.config.provider.as_str() {
            "ollama" => embed_ollama(&self.client, &self.config, &truncated).await?,
            "openai" => embed_openai(&self.client, &self.config, &truncated).await?,
            other => {
                return Err(RagError::InvalidArgument(format!(
                    "unknown LLM provider: {other}"
                )))
            }
        };

        check_dimension(&embeddings, self.config.embedding_dim)?;
        Ok(embeddings)
    }
}

/// Reject vectors whose dimension disagrees with the configured one; a
/// mismatch means the configured model and the running backend disagree,
/// and mixed-dimension vectors would silently drop out of index searches.
fn check_dimension(embeddings: &[Vec<f32>], expected: usize) -> Result<(), RagError> {
    for e in embeddings {
        if e.len() != expected {
            return Err(RagError::BackendUnavailable(format!(
                "embedding backend returned dimension {} but {expected} is configured",
                e.len()
            )));
        }
    }
    Ok(())
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    /// Ask Ollama to silently truncate inputs that exceed the model's
    /// context length instead of returning a 400 error.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, RagError> {
    let url = format!("{}/api/embed", config.base_url);

    let batch_size = 32;
    let mut all_embeddings = Vec::new();

    for batch in texts.chunks(batch_size) {
        let req = OllamaEmbedRequest {
            model: config.embedding_model.clone(),
            input: batch.to_vec(),
            truncate: true,
        };

        let resp = client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| RagError::BackendUnavailable(format!("Ollama embed API: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RagError::BackendUnavailable(format!(
                "Ollama embed API returned {status}: {body}"
            )));
        }

        let body: OllamaEmbedResponse = resp.json().await.map_err(|e| {
            RagError::BackendUnavailable(format!("failed to parse Ollama embed response: {e}"))
        })?;

        all_embeddings.extend(body.embeddings);
    }

    Ok(all_embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, RagError> {
    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let batch_size = 64;
    let mut all_embeddings = Vec::new();

    for batch in texts.chunks(batch_size) {
        let req = OpenAiEmbedRequest {
            model: config.embedding_model.clone(),
            input: batch.to_vec(),
        };

        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&req)
            .send()
            .await
            .map_err(|e| RagError::BackendUnavailable(format!("OpenAI embed API: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RagError::BackendUnavailable(format!(
                "OpenAI embed API returned {status}: {body}"
            )));
        }

        let body: OpenAiEmbedResponse = resp.json().await.map_err(|e| {
            RagError::BackendUnavailable(format!("failed to parse OpenAI embed response: {e}"))
        })?;

        let mut embeddings: Vec<Vec<f32>> = body.data.into_iter().map(|d| d.embedding).collect();
        all_embeddings.append(&mut embeddings);
    }

    Ok(all_embeddings)
}
