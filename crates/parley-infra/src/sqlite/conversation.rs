//! SQLite conversation repository.
//!
//! Implements `ConversationRepository` from `parley-core`. The message list is
//! stored as JSON text and deserialized on read.

use chrono::{DateTime, Utc};
use sqlx::Row;

use parley_core::persistence::repository::ConversationRepository;
use parley_types::conversation::ConversationRecord;
use parley_types::error::RepositoryError;
use parley_types::message::Message;

use super::pool::DatabasePool;

pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

struct ConversationRow {
    id: i64,
    conversation_id: String,
    messages: String,
    created_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            messages: row.try_get("messages")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_record(self) -> Result<ConversationRecord, RepositoryError> {
        let messages: Vec<Message> = serde_json::from_str(&self.messages)
            .map_err(|e| RepositoryError::Query(format!("invalid messages JSON: {e}")))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))?;

        Ok(ConversationRecord {
            id: Some(self.id),
            conversation_id: self.conversation_id,
            messages,
            created_at: Some(created_at),
        })
    }
}

fn encode_messages(messages: &[Message]) -> Result<String, RepositoryError> {
    serde_json::to_string(messages)
        .map_err(|e| RepositoryError::Query(format!("failed to serialize messages: {e}")))
}

fn map_write_error(e: sqlx::Error, conversation_id: &str) -> RepositoryError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(conversation_id.to_string())
        }
        _ => RepositoryError::Query(e.to_string()),
    }
}

impl ConversationRepository for SqliteConversationRepository {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn find(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, conversation_id, messages, created_at FROM conversations WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let row = ConversationRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(row.into_record()?))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, record: &ConversationRecord) -> Result<(), RepositoryError> {
        let now = record.created_at.unwrap_or_else(Utc::now).to_rfc3339();
        let messages = encode_messages(&record.messages)?;

        sqlx::query(
            r#"INSERT INTO conversations (conversation_id, messages, created_at, updated_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(&record.conversation_id)
        .bind(&messages)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| map_write_error(e, &record.conversation_id))?;

        Ok(())
    }

    async fn update_messages(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<(), RepositoryError> {
        let encoded = encode_messages(messages)?;
        let result = sqlx::query(
            "UPDATE conversations SET messages = ?, updated_at = ? WHERE conversation_id = ?",
        )
        .bind(&encoded)
        .bind(Utc::now().to_rfc3339())
        .bind(conversation_id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM conversations WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, limit: Option<i64>) -> Result<Vec<ConversationRecord>, RepositoryError> {
        // LIMIT -1 means no limit in SQLite.
        let rows = sqlx::query(
            r#"SELECT id, conversation_id, messages, created_at FROM conversations
               ORDER BY created_at DESC, id DESC LIMIT ?"#,
        )
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                ConversationRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_record()
            })
            .collect()
    }
}
