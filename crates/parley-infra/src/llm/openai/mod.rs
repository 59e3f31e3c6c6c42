//! OpenAiClient -- [`CompletionClient`] for the OpenAI chat-completions API.
//!
//! Posts to `{base_url}/chat/completions` with a bearer key and maps HTTP
//! status codes onto [`UpstreamCategory`]. Any OpenAI-compatible endpoint
//! works through `with_base_url`.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and only exposed when
//! building the `Authorization` header.

pub mod types;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use parley_core::llm::client::CompletionClient;
use parley_types::error::UpstreamError;
use parley_types::llm::{CompletionRequest, CompletionResponse, Usage};

use self::types::{ApiErrorBody, ChatCompletionRequest, ChatCompletionResponse, ChatMessage};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat-completions client. Never retries.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl OpenAiClient {
    /// Create a client with the given request timeout.
    pub fn new(api_key: SecretString, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Override the base URL (proxies, compatible providers, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn to_wire_request(request: &CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

/// Pull the human-readable message out of an error body, if it has one.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string())
}

impl CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, UpstreamError> {
        let body = Self::to_wire_request(request);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::network(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::from_status(
                status.as_u16(),
                error_detail(&error_body),
            ));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::other(format!("failed to parse response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| UpstreamError::other("response contained no choices"))?;

        let usage = parsed
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: parsed.id,
            content,
            model: parsed.model,
            usage,
        })
    }
}
