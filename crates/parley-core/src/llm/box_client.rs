//! BoxCompletionClient -- object-safe dynamic dispatch wrapper for CompletionClient.
//!
//! 1. Define an object-safe `CompletionClientDyn` trait with boxed futures
//! 2. Blanket-impl `CompletionClientDyn` for all `T: CompletionClient`
//! 3. `BoxCompletionClient` wraps `Box<dyn CompletionClientDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use parley_types::error::UpstreamError;
use parley_types::llm::{CompletionRequest, CompletionResponse};

use super::client::CompletionClient;

/// Object-safe version of [`CompletionClient`] with boxed futures.
pub trait CompletionClientDyn: Send + Sync {
    fn name(&self) -> &str;

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, UpstreamError>> + Send + 'a>>;
}

impl<T: CompletionClient> CompletionClientDyn for T {
    fn name(&self) -> &str {
        CompletionClient::name(self)
    }

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, UpstreamError>> + Send + 'a>> {
        Box::pin(self.complete(request))
    }
}

/// Type-erased completion client.
///
/// Lets the application pick the concrete backend at startup (a real API
/// client, or one that fails every call when no key is configured) while
/// the handler stays generic.
pub struct BoxCompletionClient {
    inner: Box<dyn CompletionClientDyn>,
}

impl BoxCompletionClient {
    pub fn new<T: CompletionClient + 'static>(client: T) -> Self {
        Self {
            inner: Box::new(client),
        }
    }
}

impl CompletionClient for BoxCompletionClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, UpstreamError> {
        self.inner.complete_boxed(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::llm::Usage;

    struct Echo;

    impl CompletionClient for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, UpstreamError> {
            let last = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(CompletionResponse {
                id: "echo-1".to_string(),
                content: last,
                model: request.model.clone(),
                usage: Usage::default(),
            })
        }
    }

    #[tokio::test]
    async fn boxed_client_delegates() {
        let client = BoxCompletionClient::new(Echo);
        assert_eq!(CompletionClient::name(&client), "echo");

        let request = CompletionRequest {
            model: "m".to_string(),
            messages: vec![parley_types::llm::PromptMessage::new(
                parley_types::message::MessageRole::User,
                "ping",
            )],
            temperature: None,
            max_tokens: None,
        };
        let response = client.complete(&request).await.unwrap();
        assert_eq!(response.content, "ping");
    }
}
