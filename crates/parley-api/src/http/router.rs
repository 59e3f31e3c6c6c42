//! Axum router configuration with middleware.
//!
//! Routes are served both at the root and under `/api`. The only difference
//! is `POST /chat`: the root variant answers `{ reply }`, the `/api` variant
//! `{ response, conversation }`.
//! Middleware: permissive CORS, request tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

fn shared_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/conversation/{session_id}",
            get(handlers::conversation::get_conversation)
                .delete(handlers::conversation::delete_conversation),
        )
        .route(
            "/conversation/{session_id}/stats",
            get(handlers::conversation::conversation_stats),
        )
        .route(
            "/conversations",
            get(handlers::conversation::list_conversations),
        )
        .route(
            "/conversations/raw",
            get(handlers::conversation::raw_conversations),
        )
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = shared_routes().route("/chat", post(handlers::chat::chat));
    let root_routes = shared_routes().route("/chat", post(handlers::chat::chat_legacy));

    Router::new()
        .merge(root_routes)
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
