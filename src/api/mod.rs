//! HTTP surface: request validation, status mapping and response shaping
//! over the ingestion, retrieval and generation pipelines.

pub mod admin;
pub mod generate;
pub mod index;

use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::error::RagError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api/generate", post(generate::generate))
        .route("/api/generate/stop", post(generate::stop))
        .route("/api/index", post(index::index))
        .route("/api/search", post(index::search))
        .route("/api/rag", post(admin::toggle_rag))
        .route("/api/system-prompt", post(admin::set_system_prompt))
        .route("/api/reset", post(admin::reset))
        .with_state(state)
}

async fn home() -> Html<&'static str> {
    Html(
        "<!DOCTYPE html><html><head><title>doc-rag</title></head>\
         <body><h1>doc-rag</h1>\
         <p>POST /api/index, /api/search, /api/generate</p></body></html>",
    )
}

/// Map pipeline errors onto HTTP statuses.
pub(crate) fn error_response(err: RagError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        RagError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        RagError::NotFound(_) => StatusCode::NOT_FOUND,
        RagError::Busy => StatusCode::CONFLICT,
        RagError::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
        RagError::NotInitialized => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() })))
}

pub(crate) fn bad_request(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message })),
    )
}
