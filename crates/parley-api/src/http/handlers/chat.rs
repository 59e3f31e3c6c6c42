//! Chat turn handlers.
//!
//! - POST /api/chat -> `{ response, conversation }`
//! - POST /chat     -> `{ reply }`

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};

use parley_core::chat::ChatTurn;
use parley_types::message::Message;

use crate::http::error::AppError;
use crate::state::AppState;

/// Both fields are optional here so that missing ones surface as validation
/// errors rather than JSON rejections.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "sessionId", alias = "session_id")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct LegacyChatResponse {
    pub reply: String,
}

async fn run_turn(
    state: &AppState,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<ChatTurn, AppError> {
    let Json(request) = payload?;
    let turn = state
        .chat
        .handle(request.message.as_deref(), request.session_id.as_deref())
        .await?;
    Ok(turn)
}

/// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let turn = run_turn(&state, payload).await?;
    Ok(Json(ChatResponse {
        response: turn.reply,
        conversation: turn.conversation,
    }))
}

/// POST /chat
pub async fn chat_legacy(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<LegacyChatResponse>, AppError> {
    let turn = run_turn(&state, payload).await?;
    Ok(Json(LegacyChatResponse { reply: turn.reply }))
}
