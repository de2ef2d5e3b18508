//! REST API handlers for the public chat surface.

use super::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::sessions::{now_millis, HistorySnapshot};

// ── Request / response bodies ───────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub message: Option<String>,
    pub conversation_id: Option<String>,
    pub user_id: Option<String>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    pub conversation_id: String,
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub conversation_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearBody {
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearReply {
    pub success: bool,
}

fn reject(rejection: JsonRejection) -> ApiError {
    ApiError::validation(format!("Invalid JSON body: {rejection}"))
}

// ── Handlers ────────────────────────────────────────────────────

/// POST /api/chat — run one chat cycle.
pub async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(body) = payload.map_err(reject)?;

    let outcome = state
        .router
        .chat(
            body.message.as_deref(),
            body.conversation_id.as_deref(),
            body.user_id.as_deref(),
            body.system_prompt.as_deref(),
        )
        .await?;

    Ok(Json(ChatReply {
        response: outcome.response,
        conversation_id: outcome.conversation_id,
        timestamp: outcome.timestamp,
    }))
}

/// GET /api/history — recent turns plus metadata, passed through unchanged.
pub async fn handle_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistorySnapshot>, ApiError> {
    let snapshot = state
        .router
        .history(query.conversation_id.as_deref(), query.limit)
        .await?;
    Ok(Json(snapshot))
}

/// POST /api/clear — empty one conversation's message log.
pub async fn handle_clear(
    State(state): State<AppState>,
    payload: Result<Json<ClearBody>, JsonRejection>,
) -> Result<Json<ClearReply>, ApiError> {
    let Json(body) = payload.map_err(reject)?;
    state.router.clear(body.conversation_id.as_deref()).await?;
    Ok(Json(ClearReply { success: true }))
}

/// GET /api/health — fixed liveness payload, no dependencies.
pub async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": now_millis(),
    }))
}

/// Fallback for unknown routes.
pub async fn handle_not_found() -> ApiError {
    ApiError::not_found("Not found")
}
