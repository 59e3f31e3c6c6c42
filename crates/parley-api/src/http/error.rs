//! Application error type mapping to HTTP status codes and JSON bodies.
//!
//! - 400 `{ error, details }` for bad input, including malformed JSON.
//! - 500 `{ error, details, category }` for completion API failures, where
//!   `error` is the user-facing text for the failure category.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use parley_types::error::{ChatError, UpstreamError, ValidationError};

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Upstream(UpstreamError),
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::Validation(e)
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Validation(v) => AppError::Validation(v),
            ChatError::Upstream(u) => AppError::Upstream(u),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Validation(ValidationError::MalformedBody(e.body_text()))
    }
}

fn validation_summary(e: &ValidationError) -> &'static str {
    match e {
        ValidationError::MissingMessage | ValidationError::MissingSessionId => {
            "Message and sessionId are required."
        }
        ValidationError::UnknownRole(_) => "Unknown message role.",
        ValidationError::MalformedBody(_) => "Request body is not valid JSON.",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": validation_summary(e),
                    "details": e.to_string(),
                }),
            ),
            AppError::Upstream(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": e.user_message(),
                    "details": e.to_string(),
                    "category": e.category.as_str(),
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
