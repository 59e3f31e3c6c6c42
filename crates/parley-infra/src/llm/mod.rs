//! Completion client implementations.
//!
//! [`create_client`] picks the concrete client from [`CompletionSettings`]:
//! the OpenAI client when a key is configured, otherwise
//! [`MissingKeyClient`], which fails every call with an auth error so the
//! server can still start and report its state on `/health`.

pub mod openai;

use std::time::Duration;

use secrecy::SecretString;
use tracing::warn;

use parley_core::llm::box_client::BoxCompletionClient;
use parley_core::llm::client::CompletionClient;
use parley_types::config::CompletionSettings;
use parley_types::error::{UpstreamCategory, UpstreamError};
use parley_types::llm::{CompletionRequest, CompletionResponse};

use self::openai::OpenAiClient;

/// Stand-in client used when no API key is configured.
pub struct MissingKeyClient;

impl CompletionClient for MissingKeyClient {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn complete(
        &self,
        _request: &CompletionRequest,
    ) -> Result<CompletionResponse, UpstreamError> {
        Err(UpstreamError::new(
            UpstreamCategory::Auth,
            "no API key configured (set OPENAI_API_KEY)",
        ))
    }
}

/// Build the completion client for these settings.
pub fn create_client(settings: &CompletionSettings) -> Result<BoxCompletionClient, UpstreamError> {
    let key = match settings.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key,
        _ => {
            warn!("OPENAI_API_KEY is not set; chat requests will fail until it is configured");
            return Ok(BoxCompletionClient::new(MissingKeyClient));
        }
    };

    let client = OpenAiClient::new(
        SecretString::from(key.to_string()),
        Duration::from_secs(settings.timeout_secs),
    )?
    .with_base_url(settings.base_url.clone());

    Ok(BoxCompletionClient::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::llm::PromptMessage;
    use parley_types::message::MessageRole;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![PromptMessage::new(MessageRole::User, "hi")],
            temperature: None,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn missing_key_yields_auth_failure() {
        let client = create_client(&CompletionSettings::default()).unwrap();
        assert_eq!(client.name(), "unconfigured");

        let err = client.complete(&request()).await.unwrap_err();
        assert_eq!(err.category, UpstreamCategory::Auth);
        assert_eq!(
            err.user_message(),
            "OpenAI API key is invalid. Please check your configuration."
        );
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let settings = CompletionSettings {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(create_client(&settings).unwrap().name(), "unconfigured");
    }

    #[test]
    fn configured_key_builds_openai_client() {
        let settings = CompletionSettings {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        assert_eq!(create_client(&settings).unwrap().name(), "openai");
    }
}
