use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::json;

use crate::models::PromptRequest;
use crate::state::AppState;

use super::{bad_request, error_response};

/// POST /api/generate: stream a (possibly retrieval-augmented) answer as
/// plain text chunks.
pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<PromptRequest>,
) -> Response {
    if req.prompt.trim().is_empty() {
        return bad_request("prompt must not be empty").into_response();
    }

    let use_rag = *state.rag_enabled.read();
    let top_n = req.top_n.unwrap_or(3);
    tracing::info!("Generation request (rag={use_rag}, top_n={top_n})");

    match state
        .orchestrator
        .stream_answer(&req.prompt, top_n, req.options(), use_rag)
        .await
    {
        Ok(stream) => {
            let body =
                Body::from_stream(stream.map(|text| Ok::<Bytes, Infallible>(Bytes::from(text))));
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(body)
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => error_response(e).into_response(),
    }
}

/// POST /api/generate/stop: request cancellation of the active generation.
pub async fn stop(State(state): State<AppState>) -> Json<serde_json::Value> {
    let message = if state.session.request_cancel() {
        "Generation cancellation requested"
    } else {
        "No generation in progress"
    };
    Json(json!({ "message": message }))
}
