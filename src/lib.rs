//! Document retrieval-augmented generation service.
//!
//! Pipeline, roughly in request order:
//! - [`extract`] and [`chunk`] turn documents into overlapping token chunks
//! - [`vectorize`] produces context-weighted embeddings via [`llm`]
//! - [`store`] persists chunk rows and their vectors, joined by chunk id
//! - [`retrieve`] runs hybrid (vector + lexical) search with a rerank
//! - [`generate`] streams answers from the LLM backend with cancellation
//! - [`api`] exposes the whole thing over HTTP

pub mod api;
pub mod chunk;
pub mod config;
pub mod error;
pub mod extract;
pub mod generate;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod retrieve;
pub mod state;
pub mod store;
pub mod vectorize;
