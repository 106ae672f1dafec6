//! Clients for the external LLM backends: embedding and streamed generation.

pub mod embeddings;
pub mod generate;
