//! Conversation inspection and management handlers.
//!
//! - GET    /conversation/{sessionId}        - read-through load
//! - DELETE /conversation/{sessionId}        - clear memory and store
//! - GET    /conversation/{sessionId}/stats  - per-role message counts
//! - GET    /conversations                   - every in-memory conversation
//! - GET    /conversations/raw               - raw store records

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::warn;

use parley_types::conversation::{ConversationRecord, ConversationStats};
use parley_types::error::SyncError;
use parley_types::message::{Message, SessionId};

use crate::http::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub session_id: SessionId,
    pub conversation: Vec<Message>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub success: bool,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub count: usize,
    pub conversations: BTreeMap<String, Vec<Message>>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    Store,
    Memory,
}

#[derive(Debug, Serialize)]
pub struct RawRecordsResponse {
    pub source: RecordSource,
    pub count: usize,
    pub records: Vec<ConversationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawQuery {
    #[serde(default = "default_raw_limit")]
    pub limit: i64,
}

fn default_raw_limit() -> i64 {
    100
}

/// GET /conversation/{sessionId}
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let session_id = SessionId::parse(&session_id)?;
    let conversation = state.chat.conversation(&session_id).await;
    Ok(Json(ConversationResponse {
        session_id,
        conversation,
    }))
}

/// DELETE /conversation/{sessionId}
///
/// Always succeeds. A blank id names no conversation, so there is nothing
/// to clear.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<ClearResponse> {
    let session_id = match SessionId::parse(&session_id) {
        Ok(id) => {
            state.chat.clear(&id).await;
            id.as_str().to_string()
        }
        Err(_) => session_id,
    };
    Json(ClearResponse {
        success: true,
        session_id,
    })
}

/// GET /conversation/{sessionId}/stats
pub async fn conversation_stats(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ConversationStats>, AppError> {
    let session_id = SessionId::parse(&session_id)?;
    Ok(Json(state.chat.stats(&session_id).await))
}

/// GET /conversations
pub async fn list_conversations(State(state): State<AppState>) -> Json<ConversationListResponse> {
    let conversations = state.chat.list_all();
    Json(ConversationListResponse {
        count: conversations.len(),
        conversations,
    })
}

/// GET /conversations/raw
///
/// Store records when a store is configured and reachable; otherwise the
/// in-memory conversations shaped as records.
pub async fn raw_conversations(
    State(state): State<AppState>,
    Query(query): Query<RawQuery>,
) -> Json<RawRecordsResponse> {
    let (source, records, error) = match state.chat.raw_records(Some(query.limit)).await {
        Ok(records) => (RecordSource::Store, records, None),
        Err(SyncError::Disabled) => (RecordSource::Memory, memory_records(&state), None),
        Err(e) => {
            warn!(error = %e, "Listing store records failed; serving memory");
            (RecordSource::Memory, memory_records(&state), Some(e.to_string()))
        }
    };

    Json(RawRecordsResponse {
        source,
        count: records.len(),
        records,
        error,
    })
}

fn memory_records(state: &AppState) -> Vec<ConversationRecord> {
    state
        .chat
        .list_all()
        .into_iter()
        .map(|(id, messages)| ConversationRecord::new(id, messages))
        .collect()
}
