use serde::{Deserialize, Serialize};

/// A retrieved passage, produced per query and never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub chunk_id: i64,
    pub text: String,
    pub score: f32,
}

/// Numeric options forwarded to the generation backend.
///
/// Values arrive from the caller unchecked; the orchestrator clamps them
/// with [`GenerationOptions::clamped`] before dispatch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub num_ctx: u32,
    pub temperature: f32,
    pub repeat_last_n: u32,
    pub repeat_penalty: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            num_ctx: 2048,
            temperature: 0.8,
            repeat_last_n: 64,
            repeat_penalty: 1.1,
        }
    }
}

impl GenerationOptions {
    /// Clamp every option into the range the backend accepts.
    pub fn clamped(self) -> Self {
        Self {
            num_ctx: self.num_ctx.clamp(1, 4096),
            temperature: self.temperature.clamp(0.0, 2.0),
            repeat_last_n: self.repeat_last_n.clamp(1, 1024),
            repeat_penalty: self.repeat_penalty.clamp(1.0, 2.0),
        }
    }
}

/// Generation request body.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
    pub top_n: Option<usize>,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_repeat_last_n")]
    pub repeat_last_n: u32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
}

impl PromptRequest {
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            num_ctx: self.num_ctx,
            temperature: self.temperature,
            repeat_last_n: self.repeat_last_n,
            repeat_penalty: self.repeat_penalty,
        }
    }
}

fn default_num_ctx() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.8
}

fn default_repeat_last_n() -> u32 {
    64
}

fn default_repeat_penalty() -> f32 {
    1.1
}

/// Ingestion request: a folder to walk recursively, or explicit file paths.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexRequest {
    pub folder: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexResponse {
    pub indexed_chunks: usize,
}

/// Retrieval request (the `/api/search` entry point).
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub prompt: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize {
    3
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleRagRequest {
    pub enable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemPromptRequest {
    pub system_prompt: Option<String>,
}
