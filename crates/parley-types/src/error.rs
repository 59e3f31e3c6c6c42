use thiserror::Error;

use std::fmt;

/// Client-caused input errors (HTTP 400).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message is required")]
    MissingMessage,

    #[error("sessionId is required")]
    MissingSessionId,

    #[error("invalid message role: '{0}'")]
    UnknownRole(String),

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

/// Coarse classification of a completion API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamCategory {
    Auth,
    RateLimit,
    Network,
    Other,
}

impl UpstreamCategory {
    /// Classify an HTTP status returned by the completion API.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => UpstreamCategory::Auth,
            429 => UpstreamCategory::RateLimit,
            _ => UpstreamCategory::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamCategory::Auth => "auth",
            UpstreamCategory::RateLimit => "rate-limit",
            UpstreamCategory::Network => "network",
            UpstreamCategory::Other => "other",
        }
    }
}

impl fmt::Display for UpstreamCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call to the completion API. Never retried.
#[derive(Debug, Clone)]
pub struct UpstreamError {
    pub category: UpstreamCategory,
    pub status: Option<u16>,
    pub message: String,
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error from completion API", self.category)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {status})")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for UpstreamError {}

impl UpstreamError {
    pub fn new(category: UpstreamCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            status: None,
            message: message.into(),
        }
    }

    /// Build from a non-success HTTP status and the response body.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            category: UpstreamCategory::from_status(status),
            status: Some(status),
            message: body.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(UpstreamCategory::Network, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(UpstreamCategory::Other, message)
    }

    /// Text shown to the end user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self.category {
            UpstreamCategory::Auth => {
                "OpenAI API key is invalid. Please check your configuration."
            }
            UpstreamCategory::RateLimit => {
                "Rate limit exceeded. Please wait a moment and try again."
            }
            UpstreamCategory::Network => {
                "Could not reach the AI service. Please check your connection and try again."
            }
            UpstreamCategory::Other => "Sorry, I encountered an error. Please try again.",
        }
    }
}

/// Errors from repository operations (used by trait definitions in parley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// External-store synchronization failures. Logged, never surfaced to callers.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no external store configured")]
    Disabled,

    #[error("store {operation} timed out after {millis}ms")]
    Timeout { operation: &'static str, millis: u64 },

    #[error("failed to read conversation: {0}")]
    Read(RepositoryError),

    #[error("failed to write conversation: {0}")]
    Write(RepositoryError),

    #[error("failed to delete conversation: {0}")]
    Delete(RepositoryError),

    #[error("failed to list conversations: {0}")]
    List(RepositoryError),
}

/// Errors that end a chat turn.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
