//! Supabase conversation repository over the PostgREST HTTP API.
//!
//! Every call goes to `{url}/rest/v1/{table}` with the project key in both
//! the `apikey` and `Authorization` headers. Rows are filtered with
//! `conversation_id=eq.{id}`.

pub mod types;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};

use parley_core::persistence::repository::ConversationRepository;
use parley_types::conversation::ConversationRecord;
use parley_types::error::RepositoryError;
use parley_types::message::Message;

use self::types::{ConversationRow, MessagesPatch, NewConversationRow};

/// Supabase-backed implementation of `ConversationRepository`.
pub struct SupabaseConversationRepository {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    table: String,
}

impl SupabaseConversationRepository {
    /// `base_url` is the project URL, e.g. `https://xyz.supabase.co`.
    pub fn new(base_url: impl Into<String>, api_key: SecretString, table: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn request(&self, method: Method) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, self.table);
        let key = self.api_key.expose_secret();
        self.client
            .request(method, url)
            .header("apikey", key)
            .bearer_auth(key)
    }

    async fn send(builder: RequestBuilder) -> Result<Response, RepositoryError> {
        let response = builder
            .send()
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::CONFLICT => RepositoryError::Conflict(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                RepositoryError::Connection(format!("HTTP {status}: {body}"))
            }
            _ => RepositoryError::Query(format!("HTTP {status}: {body}")),
        })
    }

    async fn rows(response: Response) -> Result<Vec<ConversationRecord>, RepositoryError> {
        let rows: Vec<ConversationRow> = response
            .json()
            .await
            .map_err(|e| RepositoryError::Query(format!("invalid row payload: {e}")))?;
        Ok(rows.into_iter().map(ConversationRecord::from).collect())
    }
}

impl ConversationRepository for SupabaseConversationRepository {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn find(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationRecord>, RepositoryError> {
        let filter = format!("eq.{conversation_id}");
        let response = Self::send(
            self.request(Method::GET)
                .query(&[("conversation_id", filter.as_str()), ("select", "*")]),
        )
        .await?;

        Ok(Self::rows(response).await?.into_iter().next())
    }

    async fn insert(&self, record: &ConversationRecord) -> Result<(), RepositoryError> {
        let row = NewConversationRow {
            conversation_id: &record.conversation_id,
            messages: &record.messages,
        };
        Self::send(
            self.request(Method::POST)
                .header("Prefer", "return=minimal")
                .json(&row),
        )
        .await?;
        Ok(())
    }

    async fn update_messages(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<(), RepositoryError> {
        let filter = format!("eq.{conversation_id}");
        Self::send(
            self.request(Method::PATCH)
                .query(&[("conversation_id", filter.as_str())])
                .header("Prefer", "return=minimal")
                .json(&MessagesPatch { messages }),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        let filter = format!("eq.{conversation_id}");
        Self::send(
            self.request(Method::DELETE)
                .query(&[("conversation_id", filter.as_str())]),
        )
        .await?;
        Ok(())
    }

    async fn list(&self, limit: Option<i64>) -> Result<Vec<ConversationRecord>, RepositoryError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        let response = Self::send(self.request(Method::GET).query(&query)).await?;
        Self::rows(response).await
    }
}
