use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::models::{SystemPromptRequest, ToggleRagRequest};
use crate::state::AppState;

use super::bad_request;

/// POST /api/rag: enable or disable retrieval augmentation. A request that
/// matches the current state is rejected so clients notice stale toggles.
pub async fn toggle_rag(
    State(state): State<AppState>,
    Json(req): Json<ToggleRagRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let mut enabled = state.rag_enabled.write();
    if *enabled == req.enable {
        let current = if *enabled { "enabled" } else { "disabled" };
        return Err(bad_request(&format!("RAG is already {current}")));
    }

    *enabled = req.enable;
    let now = if req.enable { "enabled" } else { "disabled" };
    tracing::info!("RAG {now}");
    Ok(Json(json!({ "message": format!("RAG {now}") })))
}

/// POST /api/system-prompt: set or clear the runtime system prompt.
pub async fn set_system_prompt(
    State(state): State<AppState>,
    Json(req): Json<SystemPromptRequest>,
) -> Json<serde_json::Value> {
    let message = match &req.system_prompt {
        Some(_) => "System prompt updated",
        None => "System prompt cleared",
    };
    state.orchestrator.set_system_prompt(req.system_prompt);
    Json(json!({ "message": message }))
}

/// POST /api/reset: delete every indexed document, chunk and vector.
pub async fn reset(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.store.reset();
    Json(json!({ "message": "Index has been reset" }))
}
