use std::path::PathBuf;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::models::{IndexRequest, IndexResponse, SearchRequest, SearchResponse};
use crate::state::AppState;

use super::{bad_request, error_response};

/// POST /api/index: ingest a folder and/or an explicit list of files.
pub async fn index(
    State(state): State<AppState>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, (StatusCode, Json<serde_json::Value>)> {
    if req.folder.is_none() && req.files.is_empty() {
        return Err(bad_request("provide a folder or a list of files"));
    }

    let mut indexed_chunks = 0;
    if let Some(folder) = &req.folder {
        indexed_chunks += state
            .indexer
            .index_folder(&PathBuf::from(folder))
            .await
            .map_err(error_response)?;
    }
    if !req.files.is_empty() {
        indexed_chunks += state
            .indexer
            .index_files(&req.files)
            .await
            .map_err(error_response)?;
    }

    tracing::info!("Indexing request completed, {indexed_chunks} chunks written");
    Ok(Json(IndexResponse { indexed_chunks }))
}

/// POST /api/search: retrieve relevant chunk texts without generating.
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, Json<serde_json::Value>)> {
    if req.prompt.trim().is_empty() {
        return Err(bad_request("prompt must not be empty"));
    }

    let top_n = req.top_n.clamp(1, 10);
    let documents = state.retriever.retrieve(&req.prompt, top_n).await;
    Ok(Json(SearchResponse { documents }))
}
