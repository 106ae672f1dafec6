use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the chunk store and vector index are persisted
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// LLM backend configuration (generation + embeddings)
    pub llm: LlmConfig,
    /// Retrieval tuning
    pub retrieval: RetrievalConfig,
    /// Tokens per chunk during ingestion
    pub chunk_size: usize,
    /// Token overlap between consecutive chunks
    pub chunk_overlap: usize,
    /// Master prompt prepended to every generation request
    pub master_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for generation
    pub generation_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Combine lexical keyword search with vector search
    pub use_hybrid_search: bool,
    /// Maximum keywords used by the lexical half of hybrid search
    pub max_keywords: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:8000".to_string(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            chunk_size: 500,
            chunk_overlap: 50,
            master_prompt: "You are a helpful assistant. Answer the user's question, \
                            using the provided context documents when they are relevant."
                .to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            generation_model: "llama3.2".to_string(),
            embedding_model: "all-minilm".to_string(),
            api_key: None,
            embedding_dim: 384,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            use_hybrid_search: true,
            max_keywords: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("DOC_RAG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("DOC_RAG_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_GENERATION_MODEL") {
            config.llm.generation_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }
        if let Ok(val) = std::env::var("DOC_RAG_USE_HYBRID_SEARCH") {
            if let Ok(v) = val.parse() {
                config.retrieval.use_hybrid_search = v;
            }
        }
        if let Ok(val) = std::env::var("DOC_RAG_MAX_KEYWORDS") {
            if let Ok(v) = val.parse() {
                config.retrieval.max_keywords = v;
            }
        }
        if let Ok(val) = std::env::var("DOC_RAG_CHUNK_SIZE") {
            if let Ok(v) = val.parse() {
                config.chunk_size = v;
            }
        }
        if let Ok(val) = std::env::var("DOC_RAG_CHUNK_OVERLAP") {
            if let Ok(v) = val.parse() {
                config.chunk_overlap = v;
            }
        }
        if let Ok(prompt) = std::env::var("DOC_RAG_MASTER_PROMPT") {
            config.master_prompt = prompt;
        }

        config
    }
}
