//! PostgREST row shapes for the `conversations` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_types::conversation::ConversationRecord;
use parley_types::message::Message;

/// A row as returned by `select=*`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationRow {
    pub id: Option<i64>,
    pub conversation_id: String,
    /// `jsonb` column; may be null on hand-edited rows.
    pub messages: Option<Vec<Message>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<ConversationRow> for ConversationRecord {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            messages: row.messages.unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewConversationRow<'a> {
    pub conversation_id: &'a str,
    pub messages: &'a [Message],
}

#[derive(Debug, Serialize)]
pub struct MessagesPatch<'a> {
    pub messages: &'a [Message],
}
