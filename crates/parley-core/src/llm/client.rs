//! CompletionClient trait definition.
//!
//! The one seam between a chat turn and the external completion API.

use parley_types::error::UpstreamError;
use parley_types::llm::{CompletionRequest, CompletionResponse};

/// A backend that turns an assembled prompt into a reply.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in parley-infra (e.g., `OpenAiClient`). A single
/// failed call is terminal for the request; implementations do not retry.
pub trait CompletionClient: Send + Sync {
    /// Human-readable backend name (e.g., "openai").
    fn name(&self) -> &str;

    /// Send one completion request and wait for the full reply.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, UpstreamError>> + Send;
}
