//! GET /health

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub openai_key_set: bool,
    pub store_configured: bool,
    pub store_backend: String,
    pub model: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let sync = state.chat.sync();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        openai_key_set: state.settings.completion.has_api_key(),
        store_configured: sync.is_enabled(),
        store_backend: sync.backend_name().unwrap_or("memory").to_string(),
        model: state.chat.model().to_string(),
    })
}
